//! Collection date parsing and day arithmetic.

use chrono::{DateTime, Local, NaiveDate, ParseError as ChronoParseError, Utc};

/// Numeric portion of a published label, e.g. `27/1/2026`.
const LABEL_DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Reasons a collection label could not be turned into a date.
pub enum DateParseError {
    /// Label carries no date token at all.
    #[error("no date in label")]
    MissingDate,
    /// Date token does not match `D/M/YYYY`.
    #[error("invalid date: {0}")]
    Invalid(#[from] ChronoParseError),
}

/// Parse a label shaped like `<weekday> D/M/YYYY`.
///
/// The weekday is ignored; only the final whitespace-separated token is read.
///
/// # Errors
///
/// Returns [`DateParseError`] when the label has no date token or the token
/// is not a valid day/month/year triple.
pub fn parse_collection_label(label: &str) -> Result<NaiveDate, DateParseError> {
    let token = label
        .split_whitespace()
        .next_back()
        .ok_or(DateParseError::MissingDate)?;
    Ok(NaiveDate::parse_from_str(token, LABEL_DATE_FORMAT)?)
}

/// Whole days from `today` to `date`, both taken at midnight.
#[must_use]
pub fn days_between(today: NaiveDate, date: NaiveDate) -> i64 {
    (date - today).num_days()
}

/// Source of the current time, injectable so day counts can be tested.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar date in the local timezone.
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
/// Wall clock in the host's local timezone.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
/// Clock pinned to a single instant.
pub struct FixedClock {
    now: DateTime<Utc>,
    today: NaiveDate,
}

impl FixedClock {
    /// Pin the clock to `today`, reporting its UTC midnight as "now".
    #[must_use]
    pub fn on(today: NaiveDate) -> Self {
        Self {
            now: today.and_time(chrono::NaiveTime::MIN).and_utc(),
            today,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn today(&self) -> NaiveDate {
        self.today
    }
}
