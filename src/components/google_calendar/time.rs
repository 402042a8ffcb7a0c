use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;

/// Render an event start time for a prompt in the given timezone.
///
/// Timed events look like `Mon, Jan 01 2024 09:00 UTC`, all-day events like
/// `Mon, Jan 01 2024 (all day)`. Anything unparseable is passed through.
pub fn render_event_time(time: &str, tz: Tz) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(time) {
        return dt
            .with_timezone(&tz)
            .format("%a, %b %d %Y %H:%M %Z")
            .to_string();
    }

    if let Ok(date) = NaiveDate::parse_from_str(time, "%Y-%m-%d") {
        return format!("{} (all day)", date.format("%a, %b %d %Y"));
    }

    time.to_string()
}
