// crates/avsync-stage/src/emitter.rs
//
// OutputAudioFrame (§4.2): resample or pass through a single audio buffer
// and re-stamp it onto the emitted timeline. Resampling uses
// ffmpeg_the_third::software::resampling, the same backend
// crates/velocut-media/src/encode.rs already drives for its AAC output
// path — built once per track in AudioSyncWorker::new rather than lazily
// on first frame, since this stage already knows in/out rate and channel
// count up front from AudioTrackConfig.

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::sample::Type as SampleType;
use ffmpeg::format::Sample;
use ffmpeg::software::resampling;
use ffmpeg::util::channel_layout::{ChannelLayout, ChannelLayoutMask};
use ffmpeg::util::frame::audio::Audio as AudioFrame;

use avsync_core::Buffer;

use crate::codec::AudioTrackConfig;

/// Per-track resampler state. Only built for tracks that actually need
/// sample-rate conversion — pass-through codecs and rate-matched PCM never
/// touch this (§4.2 step 3).
pub struct Resampler {
    ctx: resampling::Context,
}

impl Resampler {
    pub fn new(cfg: &AudioTrackConfig) -> anyhow::Result<Self> {
        let layout = channel_layout(cfg.channels);
        let fmt = Sample::F32(SampleType::Planar);
        let ctx = resampling::Context::get2(
            fmt, layout, cfg.in_rate,
            fmt, layout, cfg.out_rate,
        )?;
        Ok(Self { ctx })
    }
}

fn channel_layout(channels: u16) -> ChannelLayout {
    if channels <= 1 { ChannelLayout::MONO } else { ChannelLayout::STEREO }
}

fn channel_layout_mask(channels: u16) -> ChannelLayoutMask {
    if channels <= 1 { ChannelLayoutMask::MONO } else { ChannelLayoutMask::STEREO }
}

/// Per-track mutable sync state the emitter reads and advances.
pub struct AudioSyncState {
    pub next_start: i64,
    pub next_pts:   i64,
    pub first_drop: i64,
    pub drop_count: u32,
    pub resampler:  Option<Resampler>,
}

impl AudioSyncState {
    pub fn new(resampler: Option<Resampler>) -> Self {
        Self { next_start: 0, next_pts: 0, first_drop: 0, drop_count: 0, resampler }
    }
}

/// Resample or pass through `buf`, re-stamping it onto the emitted timeline.
/// `buf.start`/`buf.stop` must already reflect the input timeline (slip
/// already subtracted by the caller).
pub fn output_audio_frame(
    mut buf: Buffer,
    state:   &mut AudioSyncState,
    cfg:     &AudioTrackConfig,
) -> Buffer {
    let start = state.next_start;
    let mut duration = buf.duration();

    state.next_pts += duration;

    let needs_resample = cfg.in_rate != cfg.out_rate && !cfg.codec.is_passthrough();

    if needs_resample {
        if let Some(resampler) = state.resampler.as_mut() {
            match resample_payload(&mut resampler.ctx, &buf.payload, cfg) {
                Some((resampled_payload, frames_generated)) => {
                    buf.payload = resampled_payload;
                    // Duration is derived from frames actually generated,
                    // not a requested count — this is what keeps long files
                    // from drifting when the resample ratio is irrational
                    // (§4.2 rationale), expressed through swresample's own
                    // contract instead of libsamplerate's caller-sized
                    // output buffer.
                    duration = (frames_generated as i64 * 90_000) / cfg.out_rate as i64;
                }
                None => {
                    eprintln!("[sync] resampler failed, forwarding decoded samples unresampled");
                }
            }
        }
    }

    buf.frametype = Some(avsync_core::FrameType::Audio);
    buf.start = start;
    buf.stop = start + duration;
    state.next_start = start + duration;
    buf
}

/// Run the resampler over one payload's worth of planar f32 samples.
/// Returns the resampled payload bytes and the number of frames actually
/// generated, or `None` on resampler failure (§7: log and continue with
/// whatever was produced — here, nothing, so the caller forwards the
/// original samples unresampled rather than aborting the track).
fn resample_payload(
    ctx:     &mut resampling::Context,
    payload: &[u8],
    cfg:     &AudioTrackConfig,
) -> Option<(Vec<u8>, usize)> {
    let channels = cfg.channels.max(1) as usize;
    let bytes_per_sample = std::mem::size_of::<f32>();
    let count_in = payload.len() / (channels * bytes_per_sample);
    if count_in == 0 {
        return None;
    }

    let fmt = Sample::F32(SampleType::Planar);
    let mut raw = AudioFrame::new(fmt, count_in, channel_layout_mask(cfg.channels));
    raw.set_rate(cfg.in_rate);
    unsafe {
        let plane_len = count_in * bytes_per_sample;
        for ch in 0..channels.min(raw.planes()) {
            let src_off = ch * plane_len;
            if src_off + plane_len > payload.len() {
                continue;
            }
            let dst = raw.data_mut(ch);
            let dst = std::slice::from_raw_parts_mut(dst.as_mut_ptr() as *mut f32, count_in);
            let src = &payload[src_off..src_off + plane_len];
            let src = std::slice::from_raw_parts(src.as_ptr() as *const f32, count_in);
            dst.copy_from_slice(src);
        }
    }

    let mut resampled = AudioFrame::empty();
    if ctx.run(&raw, &mut resampled).is_err() {
        return None;
    }

    let frames_generated = resampled.samples();
    if frames_generated == 0 {
        return None;
    }

    let out_plane_len = frames_generated * bytes_per_sample;
    let mut out = vec![0u8; out_plane_len * channels];
    unsafe {
        for ch in 0..channels.min(resampled.planes()) {
            let src = resampled.data(ch);
            let src = std::slice::from_raw_parts(src.as_ptr() as *const f32, frames_generated);
            let dst = &mut out[ch * out_plane_len..(ch + 1) * out_plane_len];
            let dst = std::slice::from_raw_parts_mut(dst.as_mut_ptr() as *mut f32, frames_generated);
            dst.copy_from_slice(src);
        }
    }
    Some((out, frames_generated))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm_cfg(in_rate: u32, out_rate: u32) -> AudioTrackConfig {
        AudioTrackConfig {
            in_rate, out_rate, channels: 2,
            codec: crate::codec::AudioCodec::Pcm,
            frame_to_stop: None,
        }
    }

    #[test]
    fn pass_through_just_restamps() {
        let cfg = pcm_cfg(48_000, 48_000);
        let mut state = AudioSyncState::new(None);
        state.next_start = 1_000;
        let buf = Buffer::new(vec![0u8; 64], 500, 2_420, 0); // duration 1920 ticks
        let out = output_audio_frame(buf, &mut state, &cfg);
        assert_eq!(out.start, 1_000);
        assert_eq!(out.stop, 1_000 + 1_920);
        assert_eq!(state.next_start, 1_000 + 1_920);
        assert_eq!(state.next_pts, 1_920);
    }

    /// §8 Scenario F: resampling 10s of 48kHz audio to 44.1kHz must produce
    /// between 440,000 and 441,000 output samples, and the cumulative
    /// emitted duration must land within one output frame of 900,000 ticks
    /// — the no-cumulative-drift property the `+1`-margin/read-back-
    /// frames-generated contract (§4.2 rationale) exists to guarantee.
    #[test]
    fn scenario_f_44_1khz_resample_no_drift() {
        let cfg = AudioTrackConfig {
            in_rate: 48_000, out_rate: 44_100, channels: 2,
            codec: crate::codec::AudioCodec::Pcm, frame_to_stop: None,
        };
        let mut resampler = Resampler::new(&cfg).expect("resampler context");

        const CHUNK_FRAMES: usize = 1024;
        let bytes_per_sample = std::mem::size_of::<f32>();
        let total_in_frames = cfg.in_rate as usize * 10; // 10 seconds of input

        let mut total_out_frames: usize = 0;
        let mut remaining = total_in_frames;
        while remaining > 0 {
            let this_chunk = remaining.min(CHUNK_FRAMES);
            let payload = vec![0u8; this_chunk * cfg.channels as usize * bytes_per_sample];
            if let Some((_, frames_generated)) = resample_payload(&mut resampler.ctx, &payload, &cfg) {
                total_out_frames += frames_generated;
            }
            remaining -= this_chunk;
        }

        assert!(
            (440_000..=441_000).contains(&total_out_frames),
            "expected 440,000..=441,000 output frames for 10s @48kHz -> 44.1kHz, got {total_out_frames}",
        );

        let total_duration_ticks = (total_out_frames as i64 * 90_000) / cfg.out_rate as i64;
        let one_output_frame_ticks = (CHUNK_FRAMES as i64 * 90_000) / cfg.out_rate as i64;
        assert!(
            (total_duration_ticks - 900_000).abs() <= one_output_frame_ticks,
            "cumulative duration {total_duration_ticks} drifted more than one output frame from 900,000",
        );
    }
}
