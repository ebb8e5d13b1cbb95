//! Human-readable durations.

/// `"1h 5m"` for an hour or more, otherwise `"3m 20s"`.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m {secs}s")
    }
}

/// Stopwatch display, `"HH:MM:SS"`.
pub fn format_timer(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0m 0s");
        assert_eq!(format_duration(200), "3m 20s");
        assert_eq!(format_duration(3900), "1h 5m");
    }

    #[test]
    fn test_format_timer() {
        assert_eq!(format_timer(0), "00:00:00");
        assert_eq!(format_timer(3661), "01:01:01");
        assert_eq!(format_timer(360_000), "100:00:00");
    }
}
