// crates/avsync-core/src/helpers/time.rs
//
// Tick/duration conversions shared by the sync workers and their diagnostic
// logging. All presentation timestamps in this crate are 90 kHz ticks unless
// otherwise noted (audio native-rate buffers aside).

/// Ticks per second of the canonical 90 kHz presentation clock.
pub const PTS_TICKS_PER_SEC: i64 = 90_000;

/// Convert a tick delta to whole milliseconds, for coalesced drop/gap logs.
///
/// ```
/// use avsync_core::helpers::time::ticks_to_ms;
/// assert_eq!(ticks_to_ms(90_000), 1_000);
/// assert_eq!(ticks_to_ms(6_400), 71);
/// ```
pub fn ticks_to_ms(ticks: i64) -> i64 {
    ticks / 90
}

/// Convert whole milliseconds to 90 kHz ticks.
pub fn ms_to_ticks(ms: i64) -> i64 {
    ms * 90
}

/// Format an elapsed-time estimate as `H:MM:SS`, used for progress ETA.
///
/// ```
/// use avsync_core::helpers::time::format_hms;
/// assert_eq!(format_hms(0),    "0:00:00");
/// assert_eq!(format_hms(65),   "0:01:05");
/// assert_eq!(format_hms(3725), "1:02:05");
/// ```
pub fn format_hms(total_secs: i64) -> String {
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    format!("{h}:{m:02}:{s:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_ms_ticks() {
        assert_eq!(ticks_to_ms(ms_to_ticks(71)), 71);
    }
}
