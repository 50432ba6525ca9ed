//! `full-date` values (RFC 8943), carried as a text string under tag 1004.
use ciborium::Value;
use std::{fmt, str::FromStr};
use time::{format_description::FormatItem, macros::format_description, Date};

pub const FULL_DATE_TAG: u64 = 1004;
/// RFC 8949 standard date/time string, accepted when reading dates.
pub const DATE_TIME_TAG: u64 = 0;

const FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FullDate(Date);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("expected a full-date, tag 1004 over a text string")]
    NotAFullDate,
    #[error("unable to parse full-date: {0}")]
    Parse(#[from] time::error::Parse),
    #[error("unable to format full-date: {0}")]
    Format(#[from] time::error::Format),
}

impl FullDate {
    pub fn new(date: Date) -> Self {
        Self(date)
    }

    pub fn date(&self) -> Date {
        self.0
    }
}

impl From<FullDate> for Value {
    fn from(d: FullDate) -> Value {
        tag_full_date(d.to_string())
    }
}

impl TryFrom<Value> for FullDate {
    type Error = Error;

    fn try_from(v: Value) -> Result<Self, Error> {
        decode_full_date(&v).ok_or(Error::NotAFullDate)?.parse()
    }
}

impl fmt::Display for FullDate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = self.0.format(FORMAT).map_err(|_| fmt::Error)?;
        f.write_str(&s)
    }
}

impl FromStr for FullDate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Ok(FullDate(Date::parse(s, FORMAT)?))
    }
}

/// Tags an ISO 8601 `YYYY-MM-DD` string as a full-date.
pub fn tag_full_date(date: impl Into<String>) -> Value {
    Value::Tag(FULL_DATE_TAG, Box::new(Value::Text(date.into())))
}

/// The date string, if `value` is a full-date or a date/time string.
pub fn decode_full_date(value: &Value) -> Option<&str> {
    match value {
        Value::Tag(FULL_DATE_TAG | DATE_TIME_TAG, inner) => inner.as_text(),
        _ => None,
    }
}
