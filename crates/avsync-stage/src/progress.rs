// crates/avsync-stage/src/progress.rs
//
// ProgressTracker: computes the periodic state update the video worker
// emits (§6 "Progress"), mirroring `UpdateState()` in
// examples/original_source/libhb/sync.c. Rendering the report is the
// caller's concern; this only computes it.

use std::time::{Duration, Instant};

/// One progress snapshot.
#[derive(Clone, Copy, Debug)]
pub struct ProgressReport {
    /// Fraction complete, clamped to 1.0.
    pub fraction:  f32,
    /// Instantaneous rate over the trailing ~1s window, frames/sec.
    pub rate_cur:  f32,
    /// Average rate excluding paused time, frames/sec. `None` until more
    /// than 4s have elapsed since the first frame.
    pub rate_avg:  Option<f32>,
    /// ETA in whole seconds, derived from `rate_avg`.
    pub eta_secs:  Option<i64>,
}

const WINDOW_SLOTS: usize = 4;
const AVG_RATE_GATE: Duration = Duration::from_secs(4);

pub struct ProgressTracker {
    count_frames_max: u64,
    first_frame_at:   Option<Instant>,
    /// Four-slot 1-second rolling window: (wall-clock instant, cumulative
    /// frame count) pairs, oldest first.
    slots:            [(Instant, u64); WINDOW_SLOTS],
    slots_filled:      usize,
    paused:           Duration,
}

impl ProgressTracker {
    pub fn new(count_frames_max: u64) -> Self {
        let now = Instant::now();
        Self {
            count_frames_max,
            first_frame_at: None,
            slots: [(now, 0); WINDOW_SLOTS],
            slots_filled: 0,
            paused: Duration::ZERO,
        }
    }

    /// Account for time the job spent paused — excluded from `rate_avg`.
    pub fn add_paused(&mut self, d: Duration) {
        self.paused += d;
    }

    /// Record that one more frame was emitted; returns the updated report.
    pub fn on_frame_emitted(&mut self, count_frames: u64) -> ProgressReport {
        let now = Instant::now();
        if self.first_frame_at.is_none() {
            self.first_frame_at = Some(now);
        }

        if now.duration_since(self.slots[WINDOW_SLOTS - 1].0) > Duration::from_secs(1) {
            self.slots.copy_within(1.., 0);
            self.slots[WINDOW_SLOTS - 1] = (now, count_frames);
            self.slots_filled = (self.slots_filled + 1).min(WINDOW_SLOTS);
        } else {
            self.slots[WINDOW_SLOTS - 1].1 = count_frames;
        }

        let oldest = self.slots[0];
        let newest = self.slots[WINDOW_SLOTS - 1];
        let dt = newest.0.duration_since(oldest.0).as_secs_f32();
        let rate_cur = if dt > 0.0 {
            (newest.1 - oldest.1) as f32 / dt
        } else {
            0.0
        };

        let first = self.first_frame_at.unwrap();
        let elapsed_since_first = now.duration_since(first);
        let (rate_avg, eta_secs) = if elapsed_since_first > AVG_RATE_GATE {
            let active = (elapsed_since_first - self.paused).as_secs_f32().max(f32::EPSILON);
            let avg = count_frames as f32 / active;
            let remaining = self.count_frames_max.saturating_sub(count_frames) as f32;
            let eta = if avg > 0.0 { Some((remaining / avg) as i64) } else { None };
            (Some(avg), eta)
        } else {
            (None, None)
        };

        let fraction = if self.count_frames_max > 0 {
            (count_frames as f32 / self.count_frames_max as f32).min(1.0)
        } else {
            0.0
        };

        ProgressReport { fraction, rate_cur, rate_avg, eta_secs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_clamps_to_one() {
        let mut t = ProgressTracker::new(10);
        let r = t.on_frame_emitted(15);
        assert_eq!(r.fraction, 1.0);
    }

    #[test]
    fn average_rate_unset_before_gate() {
        let mut t = ProgressTracker::new(1000);
        let r = t.on_frame_emitted(1);
        assert!(r.rate_avg.is_none());
        assert!(r.eta_secs.is_none());
    }
}
