use std::time::Duration;

use chrono::{DateTime, Utc};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Relative label for a card's submit time, rounded to the largest single
/// unit the way the page renders it ("3h ago", "2days ago").
pub fn time_ago(now: DateTime<Utc>, submitted_at: Option<DateTime<Utc>>) -> String {
    let Some(submitted_at) = submitted_at else {
        return "unknown".to_string();
    };
    let elapsed = (now - submitted_at).num_seconds().max(0) as u64;
    if elapsed < MINUTE {
        return "just now".to_string();
    }

    if elapsed >= 30 * DAY {
        // Old enough that a relative label stops being useful.
        return absolute(Some(submitted_at));
    }

    let unit = if elapsed >= DAY {
        DAY
    } else if elapsed >= HOUR {
        HOUR
    } else {
        MINUTE
    };
    let rounded = (elapsed + unit / 2) / unit * unit;
    // Rounding up can promote to the next unit (e.g. 59.6m -> 1h); humantime
    // renders the promoted form correctly either way.
    format!(
        "{} ago",
        humantime::format_duration(Duration::from_secs(rounded))
    )
}

/// Absolute form shown in the card detail view, where the page used a
/// tooltip.
pub fn absolute(submitted_at: Option<DateTime<Utc>>) -> String {
    match submitted_at {
        Some(ts) => ts.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => "unknown".to_string(),
    }
}
