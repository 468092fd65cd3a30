// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Canceled,
    NoShow,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Canceled => "canceled",
            AppointmentStatus::NoShow => "no_show",
        };
        write!(f, "{}", name)
    }
}

/// A consultation. Fixed 30-minute duration: end is always start + 30 minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Free-text note attached to one appointment, authored by its doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub doctor_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub new_start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateObservationRequest {
    pub body: String,
}

// ==============================================================================
// BUSINESS RULES
// ==============================================================================

#[derive(Debug, Clone, Copy)]
pub struct SchedulingRules {
    /// Maximum number of future scheduled appointments per patient.
    pub max_future_appointments: usize,
    /// Minimum notice before the start instant for cancel/reschedule.
    pub notice_hours: i64,
    /// Fixed consultation length.
    pub consultation_minutes: i64,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            max_future_appointments: 2,
            notice_hours: 24,
            consultation_minutes: 30,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("Patient is blocked from booking due to repeated absences")]
    PatientBlocked,

    #[error("Patient already has the maximum number of future appointments")]
    FutureAppointmentQuotaExceeded,

    #[error("Requested start time is in the past")]
    PastDateRequested,

    #[error("Requested time is outside the doctor's working hours")]
    OutsideWorkingHours,

    #[error("Requested time conflicts with an existing appointment")]
    SchedulingConflict,

    #[error("At least 24 hours notice is required")]
    InsufficientNotice,

    #[error("Operation not allowed for an appointment with status {0}")]
    InvalidStatus(AppointmentStatus),

    #[error("Appointment not found")]
    NotFound,

    #[error("Not authorized to perform this operation")]
    Forbidden,

    #[error("Scheduling is temporarily busy, please retry")]
    Transient,

    #[error("Database error: {0}")]
    Database(String),
}
