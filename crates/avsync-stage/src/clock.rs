// crates/avsync-stage/src/clock.rs
//
// SharedClock: one per job, held by the video worker and every audio
// worker. Cross-track slip counters and the total emitted video frame
// count live here, guarded by a single mutex (§4.1).
//
// The original (`hb_sync_common_t`) tracks a manual `ref` count bumped on
// worker construction and dropped on worker close, freeing the struct and
// its lock when the count reaches zero. `Arc<Mutex<ClockInner>>` gives
// that lifetime for free — the inner state drops when the last clone of
// the `Arc` is dropped, with no counter to get out of sync. Each worker
// holds one `SharedClock` clone; closing a worker is just dropping it.

use std::sync::{Arc, Mutex};

struct ClockInner {
    count_frames:        u64,
    audio_passthru_slip: i64,
    video_pts_slip:      i64,
}

#[derive(Clone)]
pub struct SharedClock(Arc<Mutex<ClockInner>>);

/// A snapshot of both slip counters, read under one lock acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slip {
    pub audio_passthru: i64,
    pub video_pts:      i64,
}

impl SharedClock {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(ClockInner {
            count_frames:        0,
            audio_passthru_slip: 0,
            video_pts_slip:      0,
        })))
    }

    pub fn count_frames(&self) -> u64 {
        self.0.lock().unwrap().count_frames
    }

    /// Bumps `count_frames` and returns the new value (`UpdateState`'s
    /// `pv->common->count_frames++`).
    pub fn increment_frame_count(&self) -> u64 {
        let mut inner = self.0.lock().unwrap();
        inner.count_frames += 1;
        inner.count_frames
    }

    pub fn slip(&self) -> Slip {
        let inner = self.0.lock().unwrap();
        Slip { audio_passthru: inner.audio_passthru_slip, video_pts: inner.video_pts_slip }
    }

    /// Invariant §3: any delta the audio worker adds to `audio_passthru_slip`
    /// it adds to `video_pts_slip` too, under the same lock acquisition, so
    /// the two counters never observably diverge (DCA gap-skip path, §4.4
    /// step 5).
    pub fn add_audio_video_slip(&self, delta: i64) {
        let mut inner = self.0.lock().unwrap();
        inner.audio_passthru_slip += delta;
        inner.video_pts_slip += delta;
    }

    /// Adjusts only `video_pts_slip` — used by the video worker's own
    /// backwards-time drop rule (§4.5 step 5) to credit time it dropped
    /// back onto the timeline. This is *not* the cross-track invariant
    /// above: it is the video worker correcting its own clock, not
    /// something the audio side needs to mirror.
    pub fn adjust_video_slip(&self, delta: i64) {
        self.0.lock().unwrap().video_pts_slip += delta;
    }
}

impl Default for SharedClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_video_slip_always_added_together() {
        let clock = SharedClock::new();
        clock.add_audio_video_slip(6_400);
        let slip = clock.slip();
        assert_eq!(slip.audio_passthru, 6_400);
        assert_eq!(slip.video_pts, 6_400);
    }

    #[test]
    fn video_only_adjustment_does_not_touch_audio_slip() {
        let clock = SharedClock::new();
        clock.adjust_video_slip(-1_500);
        let slip = clock.slip();
        assert_eq!(slip.video_pts, -1_500);
        assert_eq!(slip.audio_passthru, 0);
    }

    #[test]
    fn clone_shares_state() {
        let a = SharedClock::new();
        let b = a.clone();
        a.increment_frame_count();
        b.increment_frame_count();
        assert_eq!(a.count_frames(), 2);
    }
}
