// libs/standing-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A patient's attendance record. One row per patient; a missing row means a
/// clean record (zero absences, not blocked).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientStanding {
    pub patient_id: Uuid,
    pub absence_count: i32,
    pub is_blocked: bool,
    pub updated_at: DateTime<Utc>,
}

impl PatientStanding {
    /// Clean default for a patient with no recorded absences.
    pub fn clean(patient_id: Uuid) -> Self {
        Self {
            patient_id,
            absence_count: 0,
            is_blocked: false,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StandingRules {
    /// Absences at which booking gets blocked.
    pub block_threshold: i32,
    /// Whether an administrative unblock also resets the absence counter.
    pub reset_counter_on_unblock: bool,
}

impl Default for StandingRules {
    fn default() -> Self {
        Self {
            block_threshold: 3,
            reset_counter_on_unblock: false,
        }
    }
}

/// True when the counter has reached the blocking threshold.
pub fn should_block(absence_count: i32, rules: &StandingRules) -> bool {
    absence_count >= rules.block_threshold
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StandingError {
    #[error("Patient is not blocked")]
    NotBlocked,

    #[error("Database error: {0}")]
    Database(String),
}
