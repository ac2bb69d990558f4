//! TIMESTAMP field type (date plus time of day)

use super::date::{SECONDS_PER_DAY, UNIX_EPOCH_DAY};
use super::{CtDate, CtTime};
use crate::error::{CtdbError, Result};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

const DAY: i64 = SECONDS_PER_DAY as i64;

/// Timestamp with one-second resolution
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CtTimestamp {
    date: CtDate,
    time: CtTime,
}

impl CtTimestamp {
    /// 0001-01-01 00:00:00
    pub const MIN: CtTimestamp = CtTimestamp {
        date: CtDate::MIN,
        time: CtTime::MIDNIGHT,
    };

    pub fn new(date: CtDate, time: CtTime) -> Self {
        Self { date, time }
    }

    /// Create a timestamp from seconds since the Unix epoch
    ///
    /// Fails with `InvalidArgument` when the day falls outside the `CtDate` range.
    pub fn from_unix_secs(secs: i64) -> Result<Self> {
        let days = secs.div_euclid(DAY) + UNIX_EPOCH_DAY;
        let days = i32::try_from(days).map_err(|_| {
            CtdbError::InvalidArgument(format!("{} seconds is outside the timestamp range", secs))
        })?;
        Ok(Self {
            date: CtDate::from_days(days),
            time: CtTime::from_seconds(secs.rem_euclid(DAY) as u32),
        })
    }

    /// Get current timestamp (UTC)
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self::from_unix_secs(secs).unwrap_or(Self::MIN)
    }

    /// Seconds since the Unix epoch
    pub fn as_unix_secs(&self) -> i64 {
        (self.date.days() as i64 - UNIX_EPOCH_DAY) * DAY + self.time.seconds() as i64
    }

    pub fn date(&self) -> CtDate {
        self.date
    }

    pub fn time(&self) -> CtTime {
        self.time
    }
}
