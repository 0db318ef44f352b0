//! Human-readable values for badge faces

use chrono::{DateTime, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 12 * MONTH;

/// Relative age such as "3 days ago" or "1 month ago"
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = now.signed_duration_since(then).num_seconds();
    let (secs, suffix) = if secs < 0 {
        (-secs, "from now")
    } else {
        (secs, "ago")
    };

    // Thresholds are exclusive upper bounds, checked in order.
    let text = if secs < 1 {
        return "now".to_string();
    } else if secs < 2 {
        "1 second".to_string()
    } else if secs < MINUTE {
        format!("{} seconds", secs)
    } else if secs < 2 * MINUTE {
        "1 minute".to_string()
    } else if secs < HOUR {
        format!("{} minutes", secs / MINUTE)
    } else if secs < 2 * HOUR {
        "1 hour".to_string()
    } else if secs < DAY {
        format!("{} hours", secs / HOUR)
    } else if secs < 2 * DAY {
        "1 day".to_string()
    } else if secs < WEEK {
        format!("{} days", secs / DAY)
    } else if secs < 2 * WEEK {
        "1 week".to_string()
    } else if secs < MONTH {
        format!("{} weeks", secs / WEEK)
    } else if secs < 2 * MONTH {
        "1 month".to_string()
    } else if secs < YEAR {
        format!("{} months", secs / MONTH)
    } else if secs < 18 * MONTH {
        "1 year".to_string()
    } else if secs < 2 * YEAR {
        "2 years".to_string()
    } else {
        format!("{} years", secs / YEAR)
    };

    format!("{} {}", text, suffix)
}

/// SI byte size such as "82 kB" or "1.2 MB"
pub fn bytes(size: u64) -> String {
    const UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];

    if size < 10 {
        return format!("{} B", size);
    }

    let exponent = ((size as f64).ln() / 1000f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let scaled = size as f64 / 1000f64.powi(exponent as i32);
    let rounded = (scaled * 10.0 + 0.5).floor() / 10.0;

    if rounded < 10.0 {
        format!("{:.1} {}", rounded, UNITS[exponent])
    } else {
        format!("{:.0} {}", rounded, UNITS[exponent])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_relative_time() {
        let now = Utc::now();
        let test_cases = vec![
            (Duration::zero(), "now"),
            (Duration::seconds(30), "30 seconds ago"),
            (Duration::minutes(90), "1 hour ago"),
            (Duration::days(1), "1 day ago"),
            (Duration::days(3), "3 days ago"),
            (Duration::days(20), "2 weeks ago"),
            (Duration::days(45), "1 month ago"),
            (Duration::days(200), "6 months ago"),
            (Duration::days(400), "1 year ago"),
            (Duration::days(1200), "3 years ago"),
        ];

        for (age, expected) in test_cases {
            assert_eq!(relative_time(now - age, now), expected);
        }
    }

    #[test]
    fn test_bytes() {
        assert_eq!(bytes(0), "0 B");
        assert_eq!(bytes(9), "9 B");
        assert_eq!(bytes(82_854), "83 kB");
        assert_eq!(bytes(1_200_000), "1.2 MB");
        assert_eq!(bytes(5 * 1024 * 1024), "5.2 MB");
        assert_eq!(bytes(150 * 1000 * 1000), "150 MB");
    }
}
