// libs/standing-cell/src/services/standing.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{should_block, PatientStanding, StandingError, StandingRules};

pub struct StandingService {
    supabase: SupabaseClient,
    rules: StandingRules,
}

impl StandingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            rules: StandingRules::default(),
        }
    }

    pub fn with_rules(config: &AppConfig, rules: StandingRules) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            rules,
        }
    }

    /// Fetch a patient's standing. Patients without a row get a clean record.
    pub async fn get_standing(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<PatientStanding, StandingError> {
        let path = format!("/rest/v1/patient_standing?patient_id=eq.{}", patient_id);

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StandingError::Database(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map_err(|e| StandingError::Database(format!("failed to parse standing: {}", e))),
            None => Ok(PatientStanding::clean(patient_id)),
        }
    }

    /// Increment the absence counter; blocks the patient when the counter
    /// reaches the threshold. Returns the updated standing.
    pub async fn record_absence(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<PatientStanding, StandingError> {
        let current = self.get_standing(patient_id, auth_token).await?;

        let new_count = current.absence_count + 1;
        let blocked = current.is_blocked || should_block(new_count, &self.rules);

        if blocked && !current.is_blocked {
            warn!(
                "Patient {} reached {} absences, blocking further bookings",
                patient_id, new_count
            );
        }

        let updated = PatientStanding {
            patient_id,
            absence_count: new_count,
            is_blocked: blocked,
            updated_at: Utc::now(),
        };

        self.upsert_standing(&updated, auth_token).await?;

        info!(
            "Recorded absence for patient {}: count={} blocked={}",
            patient_id, new_count, blocked
        );
        Ok(updated)
    }

    /// Administrative unblock. The absence counter is kept unless the rules
    /// say otherwise, so repeat offenders re-block on their next no-show.
    pub async fn unblock(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<PatientStanding, StandingError> {
        let current = self.get_standing(patient_id, auth_token).await?;

        if !current.is_blocked {
            return Err(StandingError::NotBlocked);
        }

        let updated = PatientStanding {
            patient_id,
            absence_count: if self.rules.reset_counter_on_unblock {
                0
            } else {
                current.absence_count
            },
            is_blocked: false,
            updated_at: Utc::now(),
        };

        self.upsert_standing(&updated, auth_token).await?;

        info!("Patient {} unblocked by administrator", patient_id);
        Ok(updated)
    }

    async fn upsert_standing(
        &self,
        standing: &PatientStanding,
        auth_token: &str,
    ) -> Result<(), StandingError> {
        debug!("Upserting standing for patient {}", standing.patient_id);

        let standing_data = json!({
            "patient_id": standing.patient_id,
            "absence_count": standing.absence_count,
            "is_blocked": standing.is_blocked,
            "updated_at": standing.updated_at.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static(
                "resolution=merge-duplicates,return=representation",
            ),
        );

        let _: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/patient_standing?on_conflict=patient_id",
                Some(auth_token),
                Some(standing_data),
                Some(headers),
            )
            .await
            .map_err(|e| StandingError::Database(e.to_string()))?;

        Ok(())
    }
}
