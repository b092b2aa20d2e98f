// crates/avsync-core/src/helpers/mod.rs

pub mod time;
