// crates/avsync-stage/src/silence.rs
//
// Silence Generator (§4.3): fills audio gaps with AC-3 or zero-PCM frames,
// quantized to AC-3 frame boundaries so pass-through and re-encoded audio
// stay mutually aligned. The AC-3 branch opens a throwaway AC-3 encoder at
// track init to produce one bit-exact silent frame, the same
// `codec::context::Context::new_with_codec` → `open_as_with` shape
// crates/velocut-media/src/encode.rs uses for its real AAC output encoder.

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::{self, Id as CodecId};
use ffmpeg::encoder;
use ffmpeg::format::sample::Type as SampleType;
use ffmpeg::format::Sample;
use ffmpeg::util::channel_layout::ChannelLayout;
use ffmpeg::util::frame::audio::Audio as AudioFrame;

use avsync_core::Buffer;

use crate::codec::{AudioCodec, AudioTrackConfig};
use crate::emitter::{output_audio_frame, AudioSyncState};
use crate::fifo::Fifo;

pub const AC3_SAMPLES_PER_FRAME: usize = 1536;

/// Pre-encoded bit-exact silent AC-3 frame, built once at track init.
/// `None` if the encoder failed to open — per §7, silence insertion for
/// that track becomes a no-op rather than aborting the job.
pub struct Ac3Silence {
    buf: Vec<u8>,
}

impl Ac3Silence {
    pub fn build(cfg: &AudioTrackConfig, bit_rate: usize) -> anyhow::Result<Self> {
        let ac3 = encoder::find(CodecId::AC3)
            .ok_or_else(|| anyhow::anyhow!("AC-3 encoder not found"))?;
        let ctx = codec::context::Context::new_with_codec(ac3);
        let mut enc = ctx.encoder().audio()?;
        enc.set_rate(cfg.in_rate as i32);
        enc.set_ch_layout(channel_layout(cfg.channels));
        enc.set_format(Sample::I16(SampleType::Packed));
        enc.set_bit_rate(bit_rate);
        let mut opened = enc.open_as_with(ac3, ffmpeg::Dictionary::new())?;

        let channels = cfg.channels.max(1) as usize;
        let mut zeros = AudioFrame::new(
            Sample::I16(SampleType::Packed), AC3_SAMPLES_PER_FRAME, channel_layout(cfg.channels),
        );
        zeros.set_rate(cfg.in_rate);
        unsafe {
            let plane = zeros.data_mut(0);
            plane[..AC3_SAMPLES_PER_FRAME * channels * 2].fill(0);
        }

        opened.send_frame(&zeros)?;
        let mut pkt = ffmpeg::Packet::empty();
        let mut buf = Vec::new();
        while opened.receive_packet(&mut pkt).is_ok() {
            if let Some(data) = pkt.data() {
                buf.extend_from_slice(data);
            }
        }
        if buf.is_empty() {
            return Err(anyhow::anyhow!("AC-3 silence encode produced no packet"));
        }
        Ok(Self { buf })
    }
}

fn channel_layout(channels: u16) -> ChannelLayout {
    if channels <= 1 { ChannelLayout::MONO } else { ChannelLayout::STEREO }
}

/// Insert `duration` ticks of silence, quantized to AC-3 frame boundaries
/// (§4.3). Each silence frame is pushed through [`output_audio_frame`] so
/// its stamps stay coherent with the rest of the track, then pushed to
/// `fifo_out`.
pub fn insert_silence(
    duration:   i64,
    cfg:        &AudioTrackConfig,
    state:      &mut AudioSyncState,
    ac3_silence: &Option<Ac3Silence>,
    fifo_out:   &Fifo<Buffer>,
) {
    let frame_dur = (90_000 * AC3_SAMPLES_PER_FRAME as i64) / cfg.in_rate as i64;
    let frame_count = (duration + frame_dur / 2) / frame_dur;

    for _ in 0..frame_count {
        let raw = match cfg.codec {
            AudioCodec::Ac3 => match ac3_silence {
                Some(silence) => Buffer::new(silence.buf.clone(), state.next_pts, state.next_pts + frame_dur, 0),
                // §7: AC-3 encoder init failed at track setup — silence
                // insertion for this track is a no-op, job continues.
                None => continue,
            },
            _ => {
                let channels = cfg.channels.max(1) as usize;
                let payload = vec![0u8; AC3_SAMPLES_PER_FRAME * channels * std::mem::size_of::<f32>()];
                Buffer::new(payload, state.next_pts, state.next_pts + frame_dur, 0)
            }
        };
        let out = output_audio_frame(raw, state, cfg);
        fifo_out.push(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_c_70ms_gap_48khz_pcm() {
        // §8 Scenario C: gap of 6400 ticks at 48kHz input.
        let cfg = AudioTrackConfig {
            in_rate: 48_000, out_rate: 48_000, channels: 2,
            codec: AudioCodec::Pcm, frame_to_stop: None,
        };
        let frame_dur = (90_000 * AC3_SAMPLES_PER_FRAME as i64) / cfg.in_rate as i64;
        assert_eq!(frame_dur, 2_880);
        let duration = 6_400;
        let frame_count = (duration + frame_dur / 2) / frame_dur;
        assert_eq!(frame_count, 2);

        let mut state = AudioSyncState::new(None);
        state.next_start = 90_000;
        state.next_pts = 90_000;
        let fifo: Fifo<Buffer> = Fifo::new(8);
        insert_silence(duration, &cfg, &mut state, &None, &fifo);

        let mut fifo = fifo;
        let first = fifo.pop();
        let second = fifo.pop();
        assert_eq!(first.start, 90_000);
        assert_eq!(first.stop, second.start); // contiguous
        assert_eq!(second.stop - second.start, frame_dur);
    }
}
