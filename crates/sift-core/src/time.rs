use chrono::{
    DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
};
use thiserror::Error;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("timestamp cannot be empty")]
    Empty,
    #[error("invalid date")]
    InvalidDate,
    #[error("invalid datetime format: expected YYYY-MM-DD or YYYY-MM-DD HH:MM")]
    InvalidDateTime,
    #[error("ambiguous local time: {0}")]
    AmbiguousLocalTime(String),
}

pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

pub fn local_offset() -> FixedOffset {
    Local::now().offset().fix()
}

/// Parses the textual date forms that appear in task attributes: epoch
/// seconds, `YYYY-MM-DD`, or `YYYY-MM-DD[T ]HH:MM[:SS]` in `offset`.
pub fn parse_date_text(input: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        let secs: i64 = trimmed.parse().ok()?;
        return DateTime::<Utc>::from_timestamp(secs, 0);
    }
    parse_local_timestamp(trimmed, offset).ok()
}

pub fn parse_local_timestamp(
    input: &str,
    offset: FixedOffset,
) -> Result<DateTime<Utc>, TimeParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TimeParseError::Empty);
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let naive = date
            .and_hms_opt(0, 0, 0)
            .ok_or(TimeParseError::InvalidDate)?;
        return local_to_utc(naive, offset);
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return local_to_utc(dt, offset);
        }
    }

    Err(TimeParseError::InvalidDateTime)
}

pub fn format_timestamp_date(ts: DateTime<Utc>, offset: FixedOffset) -> String {
    ts.with_timezone(&offset).format("%Y-%m-%d").to_string()
}

pub(crate) fn local_to_utc(
    naive: NaiveDateTime,
    offset: FixedOffset,
) -> Result<DateTime<Utc>, TimeParseError> {
    let local = offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| TimeParseError::AmbiguousLocalTime(naive.to_string()))?;
    Ok(local.with_timezone(&Utc))
}
