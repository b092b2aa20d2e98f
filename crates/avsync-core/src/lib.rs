// crates/avsync-core/src/lib.rs
//
// Types that flow across FIFOs between sync workers and their up/downstream
// collaborators. No ffmpeg, no crossbeam — just plain data.

pub mod buffer;
pub mod helpers;

pub use buffer::{Buffer, FrameType, SubtitleOverlay};
