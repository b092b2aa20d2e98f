// crates/avsync-stage/src/audio_worker.rs
//
// AudioSyncWorker (§4.4): one per audio track. Pulls from an upstream FIFO,
// reconciles the track's own timeline against the shared clock, and pushes
// onto fifo_out/fifo_sync via the Audio Frame Emitter and Silence Generator.
// Shaped after the worker-owns-its-thread-and-state pattern in
// crates/velocut-media/src/worker.rs, minus the scrub-request slot that
// crate doesn't need here.

use avsync_core::Buffer;

use crate::clock::SharedClock;
use crate::codec::AudioTrackConfig;
use crate::emitter::{output_audio_frame, AudioSyncState};
use crate::fifo::Fifo;
use crate::silence::{insert_silence, Ac3Silence};

/// 90 kHz-tick gap size above which a regression is treated as "already
/// dropping" rather than snapped forward (§4.4 step 3). Hard-coded to half
/// a 30fps frame per the spec's own open question — not derived from
/// `vrate`/`vrate_base`.
const REGRESSION_DROP_THRESHOLD: i64 = 90 * 15;

/// Minimum gap size treated as a gap rather than jitter (§4.4 step 5).
const GAP_THRESHOLD: i64 = 90 * 70;

/// Gaps larger than this are corrupt timestamps, not real silence (§4.4 step 5).
const GAP_CORRUPT_THRESHOLD: i64 = 90_000 * 60;

pub struct AudioSyncWorker {
    cfg:         AudioTrackConfig,
    clock:       SharedClock,
    state:       AudioSyncState,
    ac3_silence: Option<Ac3Silence>,
    drops:       u32,
}

impl AudioSyncWorker {
    pub fn new(
        cfg:         AudioTrackConfig,
        clock:       SharedClock,
        resampler:   Option<crate::emitter::Resampler>,
        ac3_silence: Option<Ac3Silence>,
    ) -> Self {
        Self {
            cfg,
            clock,
            state: AudioSyncState::new(resampler),
            ac3_silence,
            drops: 0,
        }
    }

    /// Run to completion, pulling from `fifo_in` and pushing onto `fifo_out`.
    pub fn run(&mut self, fifo_in: &mut Fifo<Buffer>, fifo_out: &Fifo<Buffer>) {
        loop {
            let buf = fifo_in.pop();
            match self.step(buf) {
                Step::Forward(out) => fifo_out.push(out),
                Step::Drop => {}
                Step::Gap(gap) => {
                    insert_silence(gap, &self.cfg, &mut self.state, &self.ac3_silence, fifo_out);
                }
                Step::Terminate(sentinel) => {
                    fifo_out.push(sentinel);
                    break;
                }
            }
        }
    }

    /// One iteration of the state machine (§4.4), exposed separately from
    /// `run` so tests can drive it without real threads/FIFOs.
    fn step(&mut self, buf: Buffer) -> Step {
        // 1. EOF.
        if buf.is_eof() {
            return Step::Terminate(Buffer::eof());
        }

        // 2. Frame-cap reached.
        if let Some(frame_to_stop) = self.cfg.frame_to_stop {
            if self.clock.count_frames() >= frame_to_stop {
                return Step::Terminate(Buffer::eof());
            }
        }

        let slip = self.clock.slip();
        let start = buf.start - slip.audio_passthru;

        // 3. Regression.
        if start < self.state.next_pts {
            let still_dropping = self.state.first_drop != 0;
            let output_ahead = self.state.next_start - start > REGRESSION_DROP_THRESHOLD;
            if still_dropping || output_ahead {
                if self.state.first_drop == 0 {
                    self.state.first_drop = start;
                }
                self.state.drop_count += 1;
                return Step::Drop;
            }
            // Small regression: snap the input clock forward to the output.
            self.state.next_pts = start;
        }

        // 4. End of drop run.
        if self.state.first_drop != 0 {
            eprintln!(
                "[sync] audio: coalesced {} dropped frame(s), {} ms",
                self.state.drop_count,
                avsync_core::helpers::time::ticks_to_ms(start - self.state.first_drop),
            );
            self.drops += self.state.drop_count;
            self.state.first_drop = 0;
            self.state.drop_count = 0;
        }

        let mut buf = buf;
        buf.start = start;
        buf.stop = start + buf.duration();

        // 5. Gap.
        let gap = start - self.state.next_pts;
        if gap >= GAP_THRESHOLD {
            if gap > GAP_CORRUPT_THRESHOLD {
                eprintln!("[sync] audio: gap of {} ticks exceeds 60s, discarding buffer", gap);
                return Step::Drop;
            }
            if matches!(self.cfg.codec, crate::codec::AudioCodec::Dca) {
                self.clock.add_audio_video_slip(gap);
            } else {
                // insert_silence needs a FIFO to push into; the caller-level
                // run() loop handles this via a dedicated path (see below).
                return Step::Gap(gap);
            }
        }

        // 6. Normal case.
        Step::Forward(output_audio_frame(buf, &mut self.state, &self.cfg))
    }
}

enum Step {
    Forward(Buffer),
    Drop,
    Gap(i64),
    Terminate(Buffer),
}

impl Drop for AudioSyncWorker {
    /// `syncAudioClose`'s one-line close summary (§11 of SPEC_FULL.md).
    fn drop(&mut self) {
        eprintln!("[sync] audio: closed, {} frame(s) dropped", self.drops);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::AudioCodec;

    fn pcm_cfg() -> AudioTrackConfig {
        AudioTrackConfig {
            in_rate: 48_000, out_rate: 48_000, channels: 2,
            codec: AudioCodec::Pcm, frame_to_stop: None,
        }
    }

    fn dca_cfg() -> AudioTrackConfig {
        AudioTrackConfig {
            in_rate: 48_000, out_rate: 48_000, channels: 2,
            codec: AudioCodec::Dca, frame_to_stop: None,
        }
    }

    #[test]
    fn eof_terminates() {
        let mut w = AudioSyncWorker::new(pcm_cfg(), SharedClock::new(), None, None);
        match w.step(Buffer::eof()) {
            Step::Terminate(b) => assert!(b.is_eof()),
            _ => panic!("expected terminate"),
        }
    }

    #[test]
    fn scenario_d_dca_gap_advances_slip_under_lock() {
        // §8 Scenario D: DCA can't synthesize silence, so the gap is
        // absorbed into the shared slip counters instead and the buffer
        // is forwarded (unmodified stamp-wise), not routed through the
        // silence-insertion path.
        let clock = SharedClock::new();
        let mut w = AudioSyncWorker::new(dca_cfg(), clock.clone(), None, None);
        w.state.next_pts = 90_000;
        w.state.next_start = 90_000;
        let buf = Buffer::new(vec![1u8; 8], 90_000 + 6_400, 90_000 + 6_400 + 2_000, 0);
        match w.step(buf) {
            Step::Forward(out) => assert_eq!(out.start, 90_000),
            _ => panic!("expected forward"),
        }
        let slip = clock.slip();
        assert_eq!(slip.audio_passthru, 6_400);
        assert_eq!(slip.video_pts, 6_400);
    }

    #[test]
    fn small_regression_snaps_clock_forward() {
        let mut w = AudioSyncWorker::new(pcm_cfg(), SharedClock::new(), None, None);
        w.state.next_pts = 90_000;
        let buf = Buffer::new(vec![1u8; 8], 90_000 - 100, 90_000 - 100 + 2_000, 0);
        match w.step(buf) {
            Step::Forward(_) => assert_eq!(w.state.next_pts, 90_000 - 100 + 2_000),
            _ => panic!("expected forward after snap"),
        }
    }

    #[test]
    fn large_regression_drops_and_coalesces() {
        let mut w = AudioSyncWorker::new(pcm_cfg(), SharedClock::new(), None, None);
        w.state.next_pts = 90_000;
        // "already ahead" is judged against the output clock (next_start),
        // not the input clock (next_pts) — §4.4 step 3.
        w.state.next_start = 90_000;
        let regressed = Buffer::new(vec![1u8; 8], 90_000 - 90 * 20, 90_000 - 90 * 20 + 2_000, 0);
        match w.step(regressed) {
            Step::Drop => {}
            _ => panic!("expected drop"),
        }
        assert_eq!(w.state.drop_count, 1);
        assert_ne!(w.state.first_drop, 0);
    }
}
