//! Common types used across the platform

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Inclusive date range for report queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting one whose start is after its end
    pub fn new(start: NaiveDate, end: NaiveDate) -> DomainResult<Self> {
        if start > end {
            return Err(DomainError::validation(
                "date_range",
                format!("start {} is after end {}", start, end),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Converts instants to the dealership's local business date.
///
/// Dealership days roll over at local midnight, so daily reports must not bucket by UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessClock {
    offset_minutes: i32,
}

impl BusinessClock {
    /// India Standard Time, UTC+05:30
    pub const IST_OFFSET_MINUTES: i32 = 330;

    pub fn from_offset_minutes(minutes: i32) -> DomainResult<Self> {
        if minutes.abs() >= 24 * 60 {
            return Err(DomainError::validation(
                "utc_offset_minutes",
                "offset must be within one day",
            ));
        }
        Ok(Self {
            offset_minutes: minutes,
        })
    }

    pub fn business_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        (instant + Duration::minutes(i64::from(self.offset_minutes))).date_naive()
    }
}

impl Default for BusinessClock {
    fn default() -> Self {
        Self {
            offset_minutes: Self::IST_OFFSET_MINUTES,
        }
    }
}
