use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Get the current time as a fixed-width RFC 3339 string.
///
/// Always UTC with microsecond precision and a `Z` suffix, so stored
/// timestamps sort lexically in chronological order.
pub fn now_rfc3339() -> String {
    format_timestamp(Utc::now())
}

/// Format a UTC instant the same way [`now_rfc3339`] does.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Normalize a caller-supplied timestamp into the stored format.
///
/// Accepts full RFC 3339 (any offset) or a bare `YYYY-MM-DD` date, which is
/// taken as midnight UTC. Returns `None` for anything else.
pub fn normalize_timestamp(input: &str) -> Option<String> {
    let input = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Some(format_timestamp(ts.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(format_timestamp(midnight.and_utc()))
}

/// Lowercase a name and strip all whitespace, for duplicate detection.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether two names are the same ignoring case and whitespace.
pub fn names_are_similar(a: &str, b: &str) -> bool {
    normalize_name(a) == normalize_name(b)
}
