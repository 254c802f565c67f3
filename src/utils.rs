use std::time::Duration;

/// Compact human duration for the status screen, e.g. `4.5s`, `2m 05s`, `1h 03m`.
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    if total < 60 {
        return format!("{:.1}s", d.as_secs_f64());
    }
    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{}h {:02}m", hours, mins)
    } else {
        format!("{}m {:02}s", mins, secs)
    }
}

/// Seconds with one decimal place, as used for the check interval.
pub fn format_secs(secs: f64) -> String {
    format!("{:.1}s", secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0.0s");
        assert_eq!(format_duration(Duration::from_millis(4500)), "4.5s");
        assert_eq!(format_duration(Duration::from_millis(59_940)), "59.9s");
        assert_eq!(format_duration(Duration::from_secs(60)), "1m 00s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 05s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h 00m");
        assert_eq!(format_duration(Duration::from_secs(3780)), "1h 03m");
    }

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(1.0), "1.0s");
        assert_eq!(format_secs(0.3), "0.3s");
        assert_eq!(format_secs(12.04), "12.0s");
    }
}
