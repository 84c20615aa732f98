//! Presentation helpers for the recent-conversations list.

use chrono::{DateTime, Utc};

/// Compact age of `then` relative to `now`: `42s`, `5m`, `3h`, `2d`, `4mo`,
/// `1y`.  A unit is used only once more than one whole unit has elapsed, so
/// 90 seconds still reads `90s`.
pub fn time_ago(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0) as f64;

    const UNITS: [(f64, &str); 5] = [
        (31_536_000.0, "y"),
        (2_592_000.0, "mo"),
        (86_400.0, "d"),
        (3_600.0, "h"),
        (60.0, "m"),
    ];

    for (span, suffix) in UNITS {
        let interval = seconds / span;
        if interval > 1.0 {
            return format!("{}{suffix}", interval.floor() as u64);
        }
    }
    format!("{}s", seconds as u64)
}
