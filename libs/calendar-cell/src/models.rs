// libs/calendar-cell/src/models.rs
use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use std::fmt;

// ==============================================================================
// WEEKDAY NORMALIZATION
// ==============================================================================

/// Day of week as stored by the calendar: ordinal 0 = Monday .. 6 = Sunday.
/// All components use this single representation at the store boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum WeekDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl WeekDay {
    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for WeekDay {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(WeekDay::Monday),
            1 => Ok(WeekDay::Tuesday),
            2 => Ok(WeekDay::Wednesday),
            3 => Ok(WeekDay::Thursday),
            4 => Ok(WeekDay::Friday),
            5 => Ok(WeekDay::Saturday),
            6 => Ok(WeekDay::Sunday),
            other => Err(format!("day of week must be 0 (Monday) to 6 (Sunday), got {}", other)),
        }
    }
}

impl From<WeekDay> for u8 {
    fn from(day: WeekDay) -> Self {
        day as u8
    }
}

impl From<Weekday> for WeekDay {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => WeekDay::Monday,
            Weekday::Tue => WeekDay::Tuesday,
            Weekday::Wed => WeekDay::Wednesday,
            Weekday::Thu => WeekDay::Thursday,
            Weekday::Fri => WeekDay::Friday,
            Weekday::Sat => WeekDay::Saturday,
            Weekday::Sun => WeekDay::Sunday,
        }
    }
}

impl fmt::Display for WeekDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WeekDay::Monday => "monday",
            WeekDay::Tuesday => "tuesday",
            WeekDay::Wednesday => "wednesday",
            WeekDay::Thursday => "thursday",
            WeekDay::Friday => "friday",
            WeekDay::Saturday => "saturday",
            WeekDay::Sunday => "sunday",
        };
        write!(f, "{}", name)
    }
}

// ==============================================================================
// CALENDAR MODELS
// ==============================================================================

/// A recurring weekly interval during which a doctor accepts appointments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingHourWindow {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: WeekDay,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub created_at: DateTime<Utc>,
}

/// Ad-hoc interval overriding normal availability to unavailable
/// (vacation, conference, sick leave).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeBlock {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Minimal appointment view used for slot computation. The calendar only
/// needs the occupied intervals, not the full appointment record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedInterval {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWindowRequest {
    pub day_of_week: WeekDay,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTimeBlockRequest {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub reason: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum CalendarError {
    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Working-hour window overlaps an existing window on the same day")]
    WindowOverlap,

    #[error("Calendar entry not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),
}
