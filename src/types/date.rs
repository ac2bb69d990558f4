//! DATE and TIME field types
//!
//! `CtDate` is a proleptic Gregorian day number where 0001-01-01 is day 1.
//! Conversions use the days-from-civil algorithm, so no calendar tables
//! are needed.

use crate::error::{CtdbError, Result};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Day number of 1970-01-01
pub(super) const UNIX_EPOCH_DAY: i64 = 719_163;

pub(super) const SECONDS_PER_DAY: u32 = 86_400;

/// Two-digit years below this pivot are read as 20yy, the rest as 19yy
const TWO_DIGIT_YEAR_PIVOT: i32 = 50;

/// Text layouts for dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DateFormat {
    /// mm/dd/ccyy
    #[default]
    Mdcy,
    /// mm/dd/yy
    Mdy,
    /// dd/mm/ccyy
    Dmcy,
    /// dd/mm/yy
    Dmy,
    /// ccyymmdd
    Cymd,
    /// yymmdd
    Ymd,
}

impl DateFormat {
    pub fn pattern(&self) -> &'static str {
        match self {
            DateFormat::Mdcy => "mm/dd/ccyy",
            DateFormat::Mdy => "mm/dd/yy",
            DateFormat::Dmcy => "dd/mm/ccyy",
            DateFormat::Dmy => "dd/mm/yy",
            DateFormat::Cymd => "ccyymmdd",
            DateFormat::Ymd => "yymmdd",
        }
    }
}

/// Calendar date
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CtDate {
    days: i32,
}

impl CtDate {
    /// 0001-01-01
    pub const MIN: CtDate = CtDate { days: 1 };

    /// Pack a year/month/day triple
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self> {
        if !(1..=9999).contains(&year) || !(1..=12).contains(&month) {
            return Err(CtdbError::InvalidArgument(format!(
                "invalid date {:04}-{:02}-{:02}",
                year, month, day
            )));
        }
        if day == 0 || day > days_in_month(year, month) {
            return Err(CtdbError::InvalidArgument(format!(
                "invalid date {:04}-{:02}-{:02}",
                year, month, day
            )));
        }

        let days = days_from_civil(year as i64, month as i64, day as i64) + UNIX_EPOCH_DAY;
        Ok(Self { days: days as i32 })
    }

    /// Build from a raw day number (0001-01-01 = 1)
    pub fn from_days(days: i32) -> Self {
        Self { days }
    }

    pub fn days(&self) -> i32 {
        self.days
    }

    /// Current date (UTC)
    pub fn today() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self {
            days: (secs.div_euclid(SECONDS_PER_DAY as i64) + UNIX_EPOCH_DAY) as i32,
        }
    }

    /// (year, month, day)
    pub fn ymd(&self) -> (i32, u32, u32) {
        let (y, m, d) = civil_from_days(self.days as i64 - UNIX_EPOCH_DAY);
        (y as i32, m as u32, d as u32)
    }

    pub fn year(&self) -> i32 {
        self.ymd().0
    }

    pub fn month(&self) -> u32 {
        self.ymd().1
    }

    pub fn day(&self) -> u32 {
        self.ymd().2
    }

    /// 0 = Sunday .. 6 = Saturday
    pub fn day_of_week(&self) -> u32 {
        // day 1 (0001-01-01) was a Monday
        self.days.rem_euclid(7) as u32
    }

    pub fn is_leap_year(&self) -> bool {
        is_leap_year(self.year())
    }

    pub fn format(&self, format: DateFormat) -> String {
        let (y, m, d) = self.ymd();
        let yy = y.rem_euclid(100);
        match format {
            DateFormat::Mdcy => format!("{:02}/{:02}/{:04}", m, d, y),
            DateFormat::Mdy => format!("{:02}/{:02}/{:02}", m, d, yy),
            DateFormat::Dmcy => format!("{:02}/{:02}/{:04}", d, m, y),
            DateFormat::Dmy => format!("{:02}/{:02}/{:02}", d, m, yy),
            DateFormat::Cymd => format!("{:04}{:02}{:02}", y, m, d),
            DateFormat::Ymd => format!("{:02}{:02}{:02}", yy, m, d),
        }
    }

    pub fn parse(text: &str, format: DateFormat) -> Result<Self> {
        let bad = || {
            CtdbError::InvalidArgument(format!(
                "'{}' does not match date format {}",
                text,
                format.pattern()
            ))
        };

        let text = text.trim();
        let expected_len = format.pattern().len();
        if text.len() != expected_len || !text.is_ascii() {
            return Err(bad());
        }

        let num = |range: std::ops::Range<usize>| -> Result<i32> {
            let part = &text[range];
            if !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(bad());
            }
            part.parse::<i32>().map_err(|_| bad())
        };
        let slash = |at: usize| -> Result<()> {
            if text.as_bytes()[at] == b'/' {
                Ok(())
            } else {
                Err(bad())
            }
        };

        let (y, m, d) = match format {
            DateFormat::Mdcy => {
                slash(2)?;
                slash(5)?;
                (num(6..10)?, num(0..2)?, num(3..5)?)
            }
            DateFormat::Mdy => {
                slash(2)?;
                slash(5)?;
                (expand_year(num(6..8)?), num(0..2)?, num(3..5)?)
            }
            DateFormat::Dmcy => {
                slash(2)?;
                slash(5)?;
                (num(6..10)?, num(3..5)?, num(0..2)?)
            }
            DateFormat::Dmy => {
                slash(2)?;
                slash(5)?;
                (expand_year(num(6..8)?), num(3..5)?, num(0..2)?)
            }
            DateFormat::Cymd => (num(0..4)?, num(4..6)?, num(6..8)?),
            DateFormat::Ymd => (expand_year(num(0..2)?), num(2..4)?, num(4..6)?),
        };

        Self::new(y, m as u32, d as u32)
    }
}

/// Time of day with one-second resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CtTime {
    secs: u32,
}

impl CtTime {
    pub const MIDNIGHT: CtTime = CtTime { secs: 0 };

    pub fn new(hour: u32, minute: u32, second: u32) -> Result<Self> {
        if hour > 23 || minute > 59 || second > 59 {
            return Err(CtdbError::InvalidArgument(format!(
                "invalid time {:02}:{:02}:{:02}",
                hour, minute, second
            )));
        }
        Ok(Self {
            secs: hour * 3600 + minute * 60 + second,
        })
    }

    /// Seconds since midnight, wrapped to one day
    pub fn from_seconds(secs: u32) -> Self {
        Self {
            secs: secs % SECONDS_PER_DAY,
        }
    }

    pub fn seconds(&self) -> u32 {
        self.secs
    }

    pub fn hour(&self) -> u32 {
        self.secs / 3600
    }

    pub fn minute(&self) -> u32 {
        self.secs % 3600 / 60
    }

    pub fn second(&self) -> u32 {
        self.secs % 60
    }

    /// hh:mm:ss
    pub fn format(&self) -> String {
        format!("{:02}:{:02}:{:02}", self.hour(), self.minute(), self.second())
    }
}

pub(crate) fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

fn expand_year(yy: i32) -> i32 {
    if yy < TWO_DIGIT_YEAR_PIVOT {
        2000 + yy
    } else {
        1900 + yy
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian date
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(z: i64) -> (i64, i64, i64) {
    let z = z + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    (if m <= 2 { y + 1 } else { y }, m, d)
}
