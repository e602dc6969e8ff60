use crate::eval::error::EvalError;
use crate::time::parse_date_text;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

/// The currency of evaluation. Every operator below matches all four
/// variants, so adding one is a compile error until each operator handles it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).expect("zero offset is valid")
}

fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    parse_date_text(text, utc())
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) => "date",
        }
    }

    pub fn to_bool(&self) -> bool {
        match self {
            Value::Bool(value) => *value,
            Value::Number(value) => *value != 0.0,
            Value::String(value) => !value.is_empty(),
            Value::Date(value) => value.timestamp() != 0,
        }
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Value::Bool(value) => Cow::Borrowed(if *value { "true" } else { "false" }),
            Value::Number(value) => Cow::Owned(format_number(*value)),
            Value::String(value) => Cow::Borrowed(value),
            Value::Date(value) => Cow::Owned(value.timestamp().to_string()),
        }
    }

    /// `==`
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(left), right) => *left == right.to_bool(),
            (left, Value::Bool(right)) => left.to_bool() == *right,
            (Value::Number(left), Value::Number(right)) => left == right,
            (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
                parse_number(s).is_some_and(|parsed| parsed == *n)
            }
            (Value::Date(left), Value::Date(right)) => left == right,
            (Value::Date(d), Value::String(s)) | (Value::String(s), Value::Date(d)) => {
                parse_date(s).is_some_and(|parsed| parsed == *d)
            }
            (Value::Date(d), Value::Number(n)) | (Value::Number(n), Value::Date(d)) => {
                d.timestamp() as f64 == *n
            }
            (Value::String(left), Value::String(right)) => left == right,
        }
    }

    /// `=`: strings match on a left-anchored prefix, dates on the calendar
    /// day in `offset`; everything else falls back to `==`.
    pub fn partial_equals(&self, other: &Value, offset: FixedOffset) -> bool {
        match (self, other) {
            (Value::String(left), Value::String(right)) => {
                if right.is_empty() {
                    left.is_empty()
                } else {
                    left.starts_with(right.as_str())
                }
            }
            (Value::Date(left), Value::Date(right)) => same_day(*left, *right, offset),
            (Value::Date(d), Value::String(s)) | (Value::String(s), Value::Date(d)) => {
                parse_date(s).is_some_and(|parsed| same_day(parsed, *d, offset))
            }
            (Value::Bool(_), _)
            | (_, Value::Bool(_))
            | (Value::Number(_), _)
            | (_, Value::Number(_)) => self.equals(other),
        }
    }

    /// Ordering used by `< <= > >=`. `None` means the pair is unordered and
    /// every ordering operator yields false.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(left), right) => Some(left.cmp(&right.to_bool())),
            (left, Value::Bool(right)) => Some(left.to_bool().cmp(right)),
            (Value::Number(left), Value::Number(right)) => left.partial_cmp(right),
            (Value::Number(left), Value::String(right)) => {
                parse_number(right).and_then(|r| left.partial_cmp(&r))
            }
            (Value::String(left), Value::Number(right)) => {
                parse_number(left).and_then(|l| l.partial_cmp(right))
            }
            (Value::Date(left), Value::Date(right)) => Some(left.cmp(right)),
            (Value::Date(left), Value::String(right)) => parse_date(right).map(|r| left.cmp(&r)),
            (Value::String(left), Value::Date(right)) => parse_date(left).map(|l| l.cmp(right)),
            (Value::Date(left), Value::Number(right)) => {
                (left.timestamp() as f64).partial_cmp(right)
            }
            (Value::Number(left), Value::Date(right)) => {
                left.partial_cmp(&(right.timestamp() as f64))
            }
            (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        }
    }

    pub fn contains(&self, needle: &Value) -> bool {
        self.as_text().contains(needle.as_text().as_ref())
    }

    pub fn has_tag(&self, tag: &Value) -> bool {
        let wanted = tag.as_text();
        let wanted = wanted.trim();
        self.as_text()
            .split(',')
            .map(str::trim)
            .any(|existing| !existing.is_empty() && existing == wanted)
    }

    pub fn add(&self, other: &Value) -> Result<Value, EvalError> {
        match (self, other) {
            (Value::Date(d), Value::Number(n)) | (Value::Number(n), Value::Date(d)) => {
                Ok(Value::Date(shift(*d, *n)?))
            }
            (Value::String(left), Value::String(right)) => {
                match (parse_number(left), parse_number(right)) {
                    (Some(l), Some(r)) => Ok(Value::Number(l + r)),
                    _ => Ok(Value::String(format!("{left}{right}"))),
                }
            }
            (Value::Date(d), Value::String(s)) | (Value::String(s), Value::Date(d)) => {
                match parse_number(s) {
                    Some(n) => Ok(Value::Date(shift(*d, n)?)),
                    None => Err(mismatch("+", self, other)),
                }
            }
            (Value::Number(_), _)
            | (_, Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_))
            | (Value::Date(_), Value::Date(_)) => {
                let (l, r) = numeric_pair("+", self, other)?;
                Ok(Value::Number(l + r))
            }
        }
    }

    pub fn sub(&self, other: &Value) -> Result<Value, EvalError> {
        match (self, other) {
            (Value::Date(left), Value::Date(right)) => {
                Ok(Value::Number((*left - *right).num_seconds() as f64))
            }
            (Value::Date(d), Value::Number(n)) => Ok(Value::Date(shift(*d, -*n)?)),
            (Value::Date(d), Value::String(s)) => match (parse_number(s), parse_date(s)) {
                (Some(n), _) => Ok(Value::Date(shift(*d, -n)?)),
                (None, Some(other_date)) => {
                    Ok(Value::Number((*d - other_date).num_seconds() as f64))
                }
                (None, None) => Err(mismatch("-", self, other)),
            },
            (Value::String(s), Value::Date(d)) => match parse_date(s) {
                Some(left) => Ok(Value::Number((left - *d).num_seconds() as f64)),
                None => Err(mismatch("-", self, other)),
            },
            (Value::Number(_), Value::Date(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_))
            | (Value::Number(_), _)
            | (Value::String(_), _) => {
                let (l, r) = numeric_pair("-", self, other)?;
                Ok(Value::Number(l - r))
            }
        }
    }

    pub fn mul(&self, other: &Value) -> Result<Value, EvalError> {
        let (l, r) = numeric_pair("*", self, other)?;
        Ok(Value::Number(l * r))
    }

    pub fn div(&self, other: &Value) -> Result<Value, EvalError> {
        let (l, r) = numeric_pair("/", self, other)?;
        if r == 0.0 {
            return Err(EvalError::DivisionByZero);
        }
        Ok(Value::Number(l / r))
    }

    pub fn rem(&self, other: &Value) -> Result<Value, EvalError> {
        let (l, r) = numeric_pair("%", self, other)?;
        if r == 0.0 {
            return Err(EvalError::DivisionByZero);
        }
        Ok(Value::Number(l % r))
    }

    pub fn neg(&self) -> Result<Value, EvalError> {
        match self {
            Value::Number(n) => Ok(Value::Number(-n)),
            Value::String(s) => parse_number(s)
                .map(|n| Value::Number(-n))
                .ok_or_else(|| mismatch("-", self, self)),
            Value::Bool(_) | Value::Date(_) => Err(mismatch("-", self, self)),
        }
    }

    fn numeric(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(s) => parse_number(s),
            Value::Bool(_) | Value::Date(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Date(value) => write!(f, "{}", value.format("%Y-%m-%dT%H:%M:%SZ")),
            Value::String(value) => write!(f, "'{}'", value),
            Value::Bool(_) | Value::Number(_) => f.write_str(&self.as_text()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn same_day(left: DateTime<Utc>, right: DateTime<Utc>, offset: FixedOffset) -> bool {
    left.with_timezone(&offset).date_naive() == right.with_timezone(&offset).date_naive()
}

fn shift(date: DateTime<Utc>, seconds: f64) -> Result<DateTime<Utc>, EvalError> {
    Duration::try_seconds(seconds as i64)
        .and_then(|delta| date.checked_add_signed(delta))
        .ok_or(EvalError::DateOutOfRange)
}

fn numeric_pair(op: &'static str, left: &Value, right: &Value) -> Result<(f64, f64), EvalError> {
    match (left.numeric(), right.numeric()) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => Err(mismatch(op, left, right)),
    }
}

fn mismatch(op: &'static str, left: &Value, right: &Value) -> EvalError {
    EvalError::TypeMismatch {
        op,
        left: left.type_name(),
        right: right.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::Value;
    use crate::eval::error::EvalError;
    use chrono::{FixedOffset, TimeZone, Utc};
    use std::cmp::Ordering;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn truthiness_is_total() {
        assert!(Value::from("x").to_bool());
        assert!(!Value::from("").to_bool());
        assert!(Value::Number(-1.0).to_bool());
        assert!(!Value::Number(0.0).to_bool());
        assert!(!Value::Date(Utc.timestamp_opt(0, 0).unwrap()).to_bool());
        assert!(Value::Date(Utc::now()).to_bool());
        assert!(!Value::Bool(false).to_bool());
    }

    #[test]
    fn string_attribute_equals_number_literal() {
        assert!(Value::from("2").equals(&Value::Number(2.0)));
        assert!(!Value::from("0").equals(&Value::Number(2.0)));
        assert!(!Value::from("").equals(&Value::Number(0.0)));
    }

    #[test]
    fn partial_equality_is_prefix_for_strings() {
        let project = Value::from("Home.Garden");
        assert!(project.partial_equals(&Value::from("Home"), utc()));
        assert!(!project.partial_equals(&Value::from("Work"), utc()));
        assert!(!project.partial_equals(&Value::from(""), utc()));
        assert!(Value::from("").partial_equals(&Value::from(""), utc()));
    }

    #[test]
    fn partial_equality_is_same_day_for_dates() {
        let morning = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
        let midnight = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let stored = Value::from(morning.timestamp().to_string());
        assert!(stored.partial_equals(&Value::Date(midnight), utc()));
        assert!(!stored.equals(&Value::Date(midnight)));
    }

    #[test]
    fn epoch_strings_order_against_dates() {
        let due = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
        let eom = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();
        let stored = Value::from(due.timestamp().to_string());
        assert_eq!(stored.compare(&Value::Date(eom)), Some(Ordering::Less));
        assert_eq!(Value::from("").compare(&Value::Date(eom)), None);
    }

    #[test]
    fn date_arithmetic() {
        let base = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let later = Value::Date(base).add(&Value::Number(86_400.0)).unwrap();
        assert_eq!(later, Value::Date(Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap()));
        let diff = later.sub(&Value::Date(base)).unwrap();
        assert_eq!(diff, Value::Number(86_400.0));
    }

    #[test]
    fn date_arithmetic_out_of_range_is_an_error() {
        let base = Value::Date(Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap());
        assert_eq!(
            base.add(&Value::Number(1e14)).unwrap_err(),
            EvalError::DateOutOfRange
        );
        assert_eq!(
            base.sub(&Value::Number(1e14)).unwrap_err(),
            EvalError::DateOutOfRange
        );
        assert_eq!(
            base.add(&Value::from("100000000000000")).unwrap_err(),
            EvalError::DateOutOfRange
        );
        assert_eq!(
            base.add(&Value::Number(f64::MAX)).unwrap_err(),
            EvalError::DateOutOfRange
        );
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let err = Value::Number(1.0).div(&Value::Number(0.0)).unwrap_err();
        assert_eq!(err, EvalError::DivisionByZero);
    }

    #[test]
    fn has_tag_matches_whole_entries() {
        let tags = Value::from("home,errand");
        assert!(tags.has_tag(&Value::from("errand")));
        assert!(!tags.has_tag(&Value::from("err")));
        assert!(!Value::from("").has_tag(&Value::from("")));
    }
}
