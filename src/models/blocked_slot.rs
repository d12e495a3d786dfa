use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::models::settings::weekday_number;

/// An explicit unavailability override: a single date (whole day or a time
/// window) or a weekly recurring window. Blocked slots never hold customer
/// data; they only subtract from availability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedSlot {
    pub id: String,
    pub business_id: String,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub is_recurring: bool,
    /// Weekday numbers (0 = Sunday) the block repeats on, when recurring.
    pub recurring_days: Vec<u8>,
    pub created_at: NaiveDateTime,
}

impl BlockedSlot {
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        if self.is_recurring {
            self.recurring_days
                .contains(&weekday_number(date.weekday()))
        } else {
            self.date == Some(date)
        }
    }

    /// A block without a complete time window removes the whole day.
    pub fn blocks_whole_day(&self) -> bool {
        self.interval().is_none()
    }

    pub fn interval(&self) -> Option<(NaiveTime, NaiveTime)> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.is_recurring {
            if self.recurring_days.is_empty() {
                anyhow::bail!("recurring block needs at least one weekday");
            }
            if let Some(day) = self.recurring_days.iter().find(|d| **d > 6) {
                anyhow::bail!("invalid weekday number: {day}");
            }
        } else if self.date.is_none() {
            anyhow::bail!("non-recurring block needs a date");
        }
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) if start >= end => {
                anyhow::bail!("block start_time must be before end_time");
            }
            (Some(_), None) | (None, Some(_)) => {
                anyhow::bail!("block needs both start_time and end_time, or neither");
            }
            _ => Ok(()),
        }
    }
}
