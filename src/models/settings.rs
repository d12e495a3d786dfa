use std::str::FromStr;

use chrono::Weekday;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Weekday number as stored in settings and blocked slots: 0 = Sunday .. 6 = Saturday.
pub fn weekday_number(weekday: Weekday) -> u8 {
    weekday.num_days_from_sunday() as u8
}

/// Per-business booking rules. One row per tenant, edited from the admin
/// dashboard; all slot math derives from this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentSettings {
    pub business_id: String,
    /// IANA zone name, e.g. "America/Chicago". All day/slot boundaries are
    /// computed in this zone, not in UTC.
    pub timezone: String,
    /// Weekdays that accept bookings, 0 = Sunday .. 6 = Saturday.
    pub available_days: Vec<u8>,
    pub start_hour: u32,
    pub end_hour: u32,
    /// Minutes per appointment.
    pub default_duration: i64,
    /// Mandatory gap in minutes enforced around every confirmed appointment.
    pub buffer_time: i64,
    /// Minimum lead time in hours before a slot may be booked.
    pub min_advance_hours: i64,
    /// Furthest-future date bookable, in days from today.
    pub max_advance_days: i64,
}

impl AppointmentSettings {
    /// Starting point shown in the admin dashboard before the owner has
    /// saved anything: weekdays, nine to five, half-hour visits.
    pub fn defaults(business_id: &str) -> Self {
        Self {
            business_id: business_id.to_string(),
            timezone: "UTC".to_string(),
            available_days: vec![1, 2, 3, 4, 5],
            start_hour: 9,
            end_hour: 17,
            default_duration: 30,
            buffer_time: 0,
            min_advance_hours: 2,
            max_advance_days: 14,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.start_hour >= self.end_hour {
            anyhow::bail!("start_hour must be before end_hour");
        }
        if self.end_hour > 24 {
            anyhow::bail!("end_hour out of range: {}", self.end_hour);
        }
        if self.default_duration <= 0 {
            anyhow::bail!("default_duration must be positive");
        }
        if self.buffer_time < 0 {
            anyhow::bail!("buffer_time must not be negative");
        }
        if self.min_advance_hours < 0 {
            anyhow::bail!("min_advance_hours must not be negative");
        }
        if self.max_advance_days <= 0 {
            anyhow::bail!("max_advance_days must be positive");
        }
        if self.available_days.is_empty() {
            anyhow::bail!("at least one available weekday is required");
        }
        if let Some(day) = self.available_days.iter().find(|d| **d > 6) {
            anyhow::bail!("invalid weekday number: {day}");
        }
        if Tz::from_str(&self.timezone).is_err() {
            anyhow::bail!("unrecognized timezone: {}", self.timezone);
        }
        Ok(())
    }

    pub fn tz(&self) -> Tz {
        Tz::from_str(&self.timezone).unwrap_or(Tz::UTC)
    }

    pub fn accepts_weekday(&self, weekday: Weekday) -> bool {
        self.available_days.contains(&weekday_number(weekday))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AppointmentSettings {
        AppointmentSettings {
            business_id: "default".to_string(),
            timezone: "America/Chicago".to_string(),
            available_days: vec![1, 2, 3, 4, 5],
            start_hour: 9,
            end_hour: 17,
            default_duration: 30,
            buffer_time: 0,
            min_advance_hours: 2,
            max_advance_days: 14,
        }
    }

    #[test]
    fn test_valid_settings() {
        assert!(settings().validate().is_ok());
    }

    #[test]
    fn test_hours_must_be_ordered() {
        let mut s = settings();
        s.start_hour = 17;
        s.end_hour = 9;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_timezone() {
        let mut s = settings();
        s.timezone = "Mars/Olympus_Mons".to_string();
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_rejects_weekday_out_of_range() {
        let mut s = settings();
        s.available_days = vec![1, 9];
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_weekday_numbers_are_sunday_based() {
        assert_eq!(weekday_number(Weekday::Sun), 0);
        assert_eq!(weekday_number(Weekday::Mon), 1);
        assert_eq!(weekday_number(Weekday::Sat), 6);
    }

    #[test]
    fn test_accepts_weekday() {
        let s = settings();
        assert!(s.accepts_weekday(Weekday::Mon));
        assert!(!s.accepts_weekday(Weekday::Sun));
    }
}
