// crates/avsync-stage/src/video_worker.rs
//
// VideoSyncWorker (§4.5): the singleton worker. One-frame look-ahead,
// backwards-time drop rule under the shared clock, chapter mark carry,
// subtitle alignment, and the inter-pass record write on close.

use avsync_core::Buffer;

use crate::clock::SharedClock;
use crate::codec::VideoJobConfig;
use crate::fifo::Fifo;
use crate::interjob::InterjobRecord;
use crate::progress::{ProgressReport, ProgressTracker};
use crate::subtitle::SubtitleTrack;

pub struct VideoSyncWorker {
    cfg:              VideoJobConfig,
    clock:            SharedClock,
    subtitles:        Vec<SubtitleTrack>,
    progress:         ProgressTracker,

    pts_offset_set: bool,
    pts_skip:       i64,
    next_start:     i64,
    /// Start of the held-over `cur`, on the input timeline. Mirrors the
    /// original struct's field of the same name; nothing in this worker
    /// reads it back, kept for parity with the Video Sync State shape.
    next_pts:       i64,
    first_drop:     i64,
    drop_count:     u32,
    drops:          u64,
    dups:           u64,
    video_sequence: u64,
    chap_mark:      u32,
    cur:            Option<Buffer>,
}

pub enum Emit {
    Frame(Buffer, ProgressReport),
    /// The last frame, immediately followed by EOF — both produced by a
    /// single EOF input arriving while `cur` was still held (§4.5 step 3).
    FinalFrame(Buffer, ProgressReport),
    Eof,
    /// Nothing produced this step (frame held in look-ahead, or dropped).
    None,
}

impl VideoSyncWorker {
    pub fn new(cfg: VideoJobConfig, clock: SharedClock, subtitles: Vec<SubtitleTrack>) -> Self {
        Self {
            progress: ProgressTracker::new(cfg.count_frames_max),
            cfg,
            clock,
            subtitles,
            pts_offset_set: false,
            pts_skip: 0,
            next_start: 0,
            next_pts: 0,
            first_drop: 0,
            drop_count: 0,
            drops: 0,
            dups: 0,
            video_sequence: 0,
            chap_mark: 0,
            cur: None,
        }
    }

    pub fn run(&mut self, fifo_in: &mut Fifo<Buffer>, fifo_sync: &Fifo<Buffer>) -> InterjobRecord {
        loop {
            let input = fifo_in.pop();
            match self.step(input) {
                Emit::Frame(buf, _report) => fifo_sync.push(buf),
                Emit::FinalFrame(buf, _report) => {
                    fifo_sync.push(buf);
                    fifo_sync.push(Buffer::eof());
                    for track in &mut self.subtitles {
                        track.flush_eof();
                    }
                    break;
                }
                Emit::Eof => {
                    fifo_sync.push(Buffer::eof());
                    for track in &mut self.subtitles {
                        track.flush_eof();
                    }
                    break;
                }
                Emit::None => {}
            }
        }
        self.interjob_record()
    }

    /// One iteration of the state machine (§4.5), exposed for tests.
    fn step(&mut self, input: Buffer) -> Emit {
        // 1. Cold start.
        if self.cur.is_none() {
            if input.is_eof() {
                return Emit::Eof;
            }
            self.cur = Some(input);
            return Emit::None;
        }

        // 2. Frame cap.
        if let Some(frame_to_stop) = self.cfg.frame_to_stop {
            if self.clock.count_frames() > frame_to_stop {
                self.cur = None;
                return Emit::Eof;
            }
        }

        // 3. EOF input with cur present: final frame gets nominal duration.
        if input.is_eof() {
            let mut cur = self.cur.take().expect("checked above");
            let duration = self.cfg.nominal_frame_duration();
            let report = self.emit_cur(&mut cur, duration);
            return Emit::FinalFrame(cur, report);
        }

        let mut cur = self.cur.take().expect("checked above");
        let next = input;

        // 4. First real frame.
        if !self.pts_offset_set {
            self.pts_offset_set = true;
            if cur.start != 0 {
                cur.start = 0;
            }
        }

        // 5. Backwards-time drop.
        let video_pts_slip = self.clock.slip().video_pts;
        let delta = next.start - video_pts_slip - cur.start;
        if delta <= 0 {
            if self.first_drop == 0 {
                self.first_drop = next.start;
            }
            self.drop_count += 1;

            let positive = next.start - cur.start;
            if positive > 0 {
                self.pts_skip += positive;
                self.clock.adjust_video_slip(-positive);
            }
            if next.new_chap != 0 {
                self.chap_mark = next.new_chap;
            }
            // keep cur, discard next
            self.cur = Some(cur);
            return Emit::None;
        }

        // 6. Coalesced log on exiting a drop run.
        if self.first_drop != 0 {
            eprintln!(
                "[sync] video: coalesced {} dropped frame(s), {} ms",
                self.drop_count,
                avsync_core::helpers::time::ticks_to_ms(cur.start - self.first_drop),
            );
            self.drops += self.drop_count as u64;
            self.first_drop = 0;
            self.drop_count = 0;
        }

        self.video_sequence = cur.sequence;

        // 7. Subtitle alignment.
        for track in &mut self.subtitles {
            track.align(&mut cur);
        }

        // 8. Emit. `next.start` is already known once we get here (that's
        // the point of the look-ahead), so `cur`'s duration is the gap
        // between its own (pre-rotation) start and `next`'s, not anything
        // derived from the emitted timeline.
        let duration = next.start - self.pts_skip - cur.start;
        self.next_pts = next.start;
        let report = self.emit_cur(&mut cur, duration);

        self.cur = Some(next);
        Emit::Frame(cur, report)
    }

    /// Stamp `cur` onto the emitted timeline, roll `next_pts`/progress, and
    /// return its progress report. `duration` may be `<= 0`; logged, not
    /// rejected (§7 "invalid duration").
    fn emit_cur(&mut self, cur: &mut Buffer, duration: i64) -> ProgressReport {
        if duration <= 0 {
            eprintln!("[sync] video: non-positive duration {} at emit, passing through", duration);
        }
        cur.start = self.next_start;
        cur.stop = self.next_start + duration;
        self.next_start += duration;
        self.pts_skip = 0;

        if self.chap_mark != 0 {
            cur.new_chap = self.chap_mark;
            self.chap_mark = 0;
        }

        let count = self.clock.increment_frame_count();
        self.progress.on_frame_emitted(count)
    }

    /// Written by the caller into the shared inter-job record on pass-1
    /// close (§6 "Inter-pass record").
    pub fn interjob_record(&self) -> InterjobRecord {
        InterjobRecord {
            frame_count: self.clock.count_frames(),
            last_job:    0,
            total_time:  self.next_start,
        }
    }
}

impl Drop for VideoSyncWorker {
    /// `syncVideoClose`'s one-line close summary (§11 of SPEC_FULL.md).
    fn drop(&mut self) {
        eprintln!(
            "[sync] video: got {} frames, {} expected",
            self.clock.count_frames(),
            self.cfg.count_frames_max,
        );
        eprintln!("[sync] video: {} frames dropped, {} duplicated", self.drops, self.dups);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> VideoJobConfig {
        VideoJobConfig {
            vrate: 30_000, vrate_base: 1_001,
            frame_to_stop: None, pts_to_stop: None, count_frames_max: 100,
        }
    }

    #[test]
    fn scenario_a_first_frame_rewritten_to_zero() {
        let mut w = VideoSyncWorker::new(cfg(), SharedClock::new(), Vec::new());
        let first = Buffer::new(vec![1u8; 4], 45_000, 48_000, 0);
        assert!(matches!(w.step(first), Emit::None));

        let second = Buffer::new(vec![1u8; 4], 48_000, 51_000, 1);
        match w.step(second) {
            Emit::Frame(out, _) => assert_eq!(out.start, 0),
            _ => panic!("expected frame"),
        }
    }

    #[test]
    fn scenario_b_backwards_jump_dropped_with_chapter_carry() {
        let mut w = VideoSyncWorker::new(cfg(), SharedClock::new(), Vec::new());
        assert!(matches!(w.step(Buffer::new(vec![1u8; 4], 0, 90_000, 0)), Emit::None));

        let second = Buffer::new(vec![1u8; 4], 90_000, 180_000, 1);
        match w.step(second) {
            Emit::Frame(_, _) => {}
            _ => panic!("expected frame for monotone second input"),
        }

        let mut third = Buffer::new(vec![1u8; 4], 60_000, 90_000, 2);
        third.new_chap = 3;
        assert!(matches!(w.step(third), Emit::None));
        assert_eq!(w.drop_count, 1);
        assert_eq!(w.chap_mark, 3);

        let fourth = Buffer::new(vec![1u8; 4], 270_000, 360_000, 3);
        match w.step(fourth) {
            Emit::Frame(out, _) => assert_eq!(out.new_chap, 3),
            _ => panic!("expected frame carrying the chapter mark"),
        }
    }

    #[test]
    fn frame_cap_terminates() {
        let clock = SharedClock::new();
        let mut cfg = cfg();
        cfg.frame_to_stop = Some(0);
        let mut w = VideoSyncWorker::new(cfg, clock.clone(), Vec::new());
        w.step(Buffer::new(vec![1u8; 4], 0, 90_000, 0));
        clock.increment_frame_count();
        assert!(matches!(w.step(Buffer::new(vec![1u8; 4], 90_000, 180_000, 1)), Emit::Eof));
    }
}
