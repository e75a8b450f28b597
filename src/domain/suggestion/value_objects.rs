use chrono::{NaiveDate, NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::SuggestionError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// Time a job is expected to take, written like a time of day (`HH:MM`)
/// but meaning elapsed hours and minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkDuration {
    minutes: u32,
}

impl WorkDuration {
    /// Same range as an `HH:MM` clock reading: below 24 hours.
    pub fn new(hours: u32, minutes: u32) -> Result<Self, SuggestionError> {
        if hours > 23 || minutes > 59 {
            return Err(SuggestionError::InvalidDuration(format!("{hours:02}:{minutes:02}")));
        }
        Ok(Self { minutes: hours * 60 + minutes })
    }

    pub fn from_minutes(minutes: u32) -> Result<Self, SuggestionError> {
        Self::new(minutes / 60, minutes % 60)
    }

    pub fn total_minutes(&self) -> u32 {
        self.minutes
    }

    pub fn as_time_delta(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.minutes))
    }
}

impl FromStr for WorkDuration {
    type Err = SuggestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let clock = NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)
            .map_err(|_| SuggestionError::InvalidDuration(s.to_string()))?;
        Ok(Self { minutes: clock.num_seconds_from_midnight() / 60 })
    }
}

impl fmt::Display for WorkDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes / 60, self.minutes % 60)
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate, SuggestionError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| SuggestionError::InvalidDate(s.to_string()))
}

pub fn parse_time(s: &str) -> Result<NaiveTime, SuggestionError> {
    NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)
        .map_err(|_| SuggestionError::InvalidTime(s.to_string()))
}
