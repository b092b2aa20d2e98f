// crates/avsync-core/src/buffer.rs
//
// Buffer: the universal unit of flow between sync workers and their
// upstream/downstream FIFOs. Plain data — no ffmpeg, no channels.

/// Tags the kind of payload a [`Buffer`] carries once it reaches a
/// downstream FIFO. Mirrors `frametype` on the original `hb_buffer_t`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameType {
    Video,
    Audio,
    Subtitle,
}

/// A rendered-subtitle overlay attached to a video [`Buffer`] (`cur->sub` in
/// the original). Only present for VOBSUB tracks routed to a rendering
/// destination; pass-through subtitle tracks never populate this — they
/// travel as their own `Buffer`s on a parallel FIFO instead.
#[derive(Clone, Debug)]
pub struct SubtitleOverlay {
    pub data:   Vec<u8>,
    pub x:      u32,
    pub y:      u32,
    pub width:  u32,
    pub height: u32,
}

/// The universal unit of flow. `start`/`stop` are presentation timestamps in
/// 90 kHz ticks for video/subtitles, or the audio track's native sample rate
/// for audio. A buffer with an empty `payload` is the end-of-stream sentinel
/// — see [`Buffer::is_eof`].
#[derive(Clone, Debug)]
pub struct Buffer {
    pub payload: Vec<u8>,
    pub start:   i64,
    pub stop:    i64,
    /// Monotonically assigned demuxer sequence number, used to order events
    /// across tracks independently of PTS (e.g. gating VOBSUB display on the
    /// video reader's physical position).
    pub sequence: u64,
    /// Nonzero chapter index; 0 means "no chapter mark on this buffer".
    pub new_chap: u32,
    pub sub:       Option<SubtitleOverlay>,
    pub frametype: Option<FrameType>,
}

impl Buffer {
    /// Construct a non-EOF buffer with the given payload and stamps.
    pub fn new(payload: Vec<u8>, start: i64, stop: i64, sequence: u64) -> Self {
        Self { payload, start, stop, sequence, new_chap: 0, sub: None, frametype: None }
    }

    /// The end-of-stream sentinel: zero-size payload, zero stamps.
    pub fn eof() -> Self {
        Self { payload: Vec::new(), start: 0, stop: 0, sequence: 0, new_chap: 0, sub: None, frametype: None }
    }

    /// A buffer with payload size 0 is the end-of-stream sentinel.
    pub fn is_eof(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn duration(&self) -> i64 {
        self.stop - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_has_empty_payload() {
        assert!(Buffer::eof().is_eof());
        assert!(!Buffer::new(vec![0u8], 0, 1, 0).is_eof());
    }

    #[test]
    fn duration_is_stop_minus_start() {
        let b = Buffer::new(vec![0u8], 1_000, 4_600, 0);
        assert_eq!(b.duration(), 3_600);
    }
}
