// crates/avsync-stage/src/subtitle.rs
//
// Subtitle alignment (§4.5.4), invoked once per emitted `cur` from the
// video worker. Two distinct drain strategies depending on the track's
// source, selected by a tagged enum rather than a trait object — same
// reasoning Design Notes §9 gives for AudioCodec.

use avsync_core::{Buffer, SubtitleOverlay};

use crate::fifo::Fifo;

const TWO_SECONDS: i64 = 2 * 90_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubtitleSource {
    /// Closed captions (CC608/CC708) and SRT: no overlap clipping, no
    /// look-ahead, no extension — just drain whatever is behind `cur`.
    TimedText,
    /// VOBSUB bitmap subtitles: two-ahead peek, overlap clipping, and the
    /// short-caption extension rule.
    Vobsub,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubtitleDestination {
    /// Composited onto `cur.sub` by this stage.
    Rendered,
    /// Forwarded verbatim to the track's own `sync`/`out` FIFO.
    PassThrough,
}

pub struct SubtitleTrack {
    pub source:      SubtitleSource,
    pub destination: SubtitleDestination,
    /// Raw input queue, ordered by the demuxer.
    pub raw:         Fifo<Buffer>,
    /// Destination for pass-through subtitles that ride alongside the
    /// rewritten video timeline.
    pub sync:        Fifo<Buffer>,
    /// Destination for pass-through subtitles forwarded untouched.
    pub out:         Fifo<Buffer>,
}

impl SubtitleTrack {
    /// Drain whatever of this track's raw queue belongs on `cur`, per the
    /// track's source/destination policy. Mutates `cur.sub` in place for
    /// rendered destinations.
    pub fn align(&mut self, cur: &mut Buffer) {
        match self.source {
            SubtitleSource::TimedText => self.align_timed_text(cur),
            SubtitleSource::Vobsub => self.align_vobsub(cur),
        }
    }

    fn align_timed_text(&mut self, cur: &Buffer) {
        loop {
            let Some(head) = self.raw.see() else { break };
            if head.is_eof() {
                let eof = self.raw.pop();
                self.forward(eof);
                break;
            }
            if head.start >= cur.start {
                break;
            }
            let head = self.raw.pop();
            self.forward(head);
        }
    }

    fn align_vobsub(&mut self, cur: &mut Buffer) {
        loop {
            let Some(head) = self.raw.see() else { break };
            if head.is_eof() {
                break; // EOF handled at end-of-stream, not mid-drain
            }

            // Overlap clip: mutated in place on the queued buffer (like the
            // original's `sub->stop = sub2->start` through its live fifo
            // pointer), so the clip is visible on every later peek of this
            // same item, not just this iteration's local copy.
            let s2_start = self.raw.see2().and_then(|s2| (!s2.is_eof()).then_some(s2.start));
            if let Some(s2_start) = s2_start {
                if let Some(head) = self.raw.see_mut() {
                    if head.stop > s2_start {
                        head.stop = s2_start;
                    }
                }
            }

            let (head_start, head_stop, head_sequence) = {
                let head = self.raw.see().expect("checked above");
                (head.start, head.stop, head.sequence)
            };

            if head_sequence > cur.sequence {
                break; // ahead of the reader's physical position; wait
            }

            if head_stop <= cur.start {
                self.raw.pop(); // stale
                continue;
            }

            let displays = if head_stop > head_start {
                head_start < cur.start && cur.start < head_stop
            } else {
                // wraparound from a PTS discontinuity
                cur.start < head_stop
            };

            if !displays {
                break; // defer
            }

            if head_stop > head_start && head_stop - head_start < TWO_SECONDS {
                // Extension is likewise written back onto the queued buffer
                // so it stays displayed over however many video frames its
                // (now 2s-or-more) span covers, not just this one (§4.5.4,
                // Scenario E) — a short caption that only ever lived in a
                // local variable would go stale on the very next frame.
                if let Some(head) = self.raw.see_mut() {
                    head.stop = head_start + TWO_SECONDS;
                }
                let s2_start = self.raw.see2().and_then(|s2| (!s2.is_eof()).then_some(s2.start));
                if let Some(s2_start) = s2_start {
                    if let Some(head) = self.raw.see_mut() {
                        if head.stop > s2_start {
                            head.stop = s2_start;
                        }
                    }
                }
            }

            match self.destination {
                SubtitleDestination::Rendered => {
                    // Stays in `raw` across however many video frames its
                    // start..stop span covers — it only leaves the queue
                    // once the stale branch above pops it. Only `cur.sub`
                    // gets written, and only once (never double-stamped).
                    if cur.sub.is_none() {
                        let head = self.raw.see().expect("checked above").clone();
                        cur.sub = Some(SubtitleOverlay {
                            data:   head.payload.clone(),
                            x:      0,
                            y:      0,
                            width:  0,
                            height: 0,
                        });
                    }
                }
                SubtitleDestination::PassThrough => {
                    let head = self.raw.pop();
                    self.sync.push(head);
                }
            }
            break;
        }
    }

    fn forward(&self, buf: Buffer) {
        match self.destination {
            SubtitleDestination::Rendered => {} // destroyed; nothing to forward
            SubtitleDestination::PassThrough => self.out.push(buf),
        }
    }

    pub fn flush_eof(&mut self) {
        match self.destination {
            SubtitleDestination::Rendered => {}
            SubtitleDestination::PassThrough => {
                self.sync.push(Buffer::eof());
                self.out.push(Buffer::eof());
            }
        }
    }
}
