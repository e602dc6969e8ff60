use crate::eval::resolve::{EvalContext, Resolver};
use crate::eval::value::Value;
use crate::time::local_to_utc;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc, Weekday};

pub const NAMED_DATES: [&str; 23] = [
    "now",
    "today",
    "sod",
    "eod",
    "yesterday",
    "tomorrow",
    "sow",
    "eow",
    "som",
    "eom",
    "soq",
    "eoq",
    "soy",
    "eoy",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
    "later",
    "someday",
];

pub fn is_named_date(name: &str) -> bool {
    NAMED_DATES.contains(&name)
}

/// Resolves date keywords relative to a fixed `now`, so one filter pass sees
/// one consistent clock.
#[derive(Debug, Clone)]
pub struct NamedDates {
    now: DateTime<Utc>,
    offset: FixedOffset,
    week_start: Weekday,
}

impl NamedDates {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            now,
            offset,
            week_start: Weekday::Sun,
        }
    }

    pub fn week_start(mut self, week_start: Weekday) -> Self {
        self.week_start = week_start;
        self
    }

    pub fn lookup(&self, name: &str) -> Option<DateTime<Utc>> {
        let today = self.now.with_timezone(&self.offset).date_naive();
        match name {
            "now" => Some(self.now),
            "today" | "sod" => self.start_of(today),
            "eod" => self.end_of(today),
            "yesterday" => self.start_of(today.pred_opt()?),
            "tomorrow" => self.start_of(today.succ_opt()?),
            "sow" => self.start_of(self.week_begin(today)),
            "eow" => self.end_of(self.week_begin(today) + Duration::days(6)),
            "som" => self.start_of(today.with_day(1)?),
            "eom" => self.end_of(month_end(today.year(), today.month())?),
            "soq" => self.start_of(NaiveDate::from_ymd_opt(
                today.year(),
                quarter_first_month(today.month()),
                1,
            )?),
            "eoq" => self.end_of(month_end(
                today.year(),
                quarter_first_month(today.month()) + 2,
            )?),
            "soy" => self.start_of(NaiveDate::from_ymd_opt(today.year(), 1, 1)?),
            "eoy" => self.end_of(NaiveDate::from_ymd_opt(today.year(), 12, 31)?),
            "later" | "someday" => self.start_of(NaiveDate::from_ymd_opt(9999, 12, 30)?),
            other => {
                let weekday = parse_weekday(other)?;
                self.start_of(next_weekday(today, weekday))
            }
        }
    }

    fn week_begin(&self, day: NaiveDate) -> NaiveDate {
        let back = days_between(self.week_start, day.weekday());
        day - Duration::days(i64::from(back))
    }

    fn start_of(&self, day: NaiveDate) -> Option<DateTime<Utc>> {
        local_to_utc(day.and_hms_opt(0, 0, 0)?, self.offset).ok()
    }

    fn end_of(&self, day: NaiveDate) -> Option<DateTime<Utc>> {
        local_to_utc(day.and_hms_opt(23, 59, 59)?, self.offset).ok()
    }
}

impl Resolver for NamedDates {
    fn name(&self) -> &str {
        "named-dates"
    }

    fn resolve(&self, identifier: &str, _ctx: &EvalContext<'_>) -> Option<Value> {
        self.lookup(identifier).map(Value::Date)
    }
}

fn quarter_first_month(month: u32) -> u32 {
    ((month - 1) / 3) * 3 + 1
}

fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

fn parse_weekday(name: &str) -> Option<Weekday> {
    let weekday = match name {
        "monday" => Weekday::Mon,
        "tuesday" => Weekday::Tue,
        "wednesday" => Weekday::Wed,
        "thursday" => Weekday::Thu,
        "friday" => Weekday::Fri,
        "saturday" => Weekday::Sat,
        "sunday" => Weekday::Sun,
        _ => return None,
    };
    Some(weekday)
}

/// Days from `from` forward to `to`, in `0..7`.
fn days_between(from: Weekday, to: Weekday) -> u32 {
    (7 + to.num_days_from_monday() - from.num_days_from_monday()) % 7
}

fn next_weekday(today: NaiveDate, target: Weekday) -> NaiveDate {
    let ahead = days_between(today.weekday(), target);
    let ahead = if ahead == 0 { 7 } else { ahead };
    today + Duration::days(i64::from(ahead))
}
