// crates/avsync-stage/src/interjob.rs
//
// Inter-pass record: written by the video worker when pass 1 closes, read
// back by pass 2's VideoJobConfig construction (§6). The surrounding job
// runner owns where this actually lives (shared state across passes is its
// concern, per spec.md's Non-goal on job/configuration loading); this is
// just the record's shape, mirroring `hb_interjob_t` in
// examples/original_source/libhb/sync.c.
#[derive(Clone, Copy, Debug, Default)]
pub struct InterjobRecord {
    pub frame_count: u64,
    pub last_job:    u32,
    pub total_time:  i64,
}
