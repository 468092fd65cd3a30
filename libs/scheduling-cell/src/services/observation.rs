// libs/scheduling-cell/src/services/observation.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::models::{Appointment, Observation, SchedulingError};

pub struct ObservationService {
    supabase: SupabaseClient,
}

impl ObservationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Attach a note to an appointment. Only the appointment's doctor may
    /// write observations.
    pub async fn add_observation(
        &self,
        appointment_id: Uuid,
        user: &User,
        body: String,
        auth_token: &str,
    ) -> Result<Observation, SchedulingError> {
        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;

        if user.id != appointment.doctor_id.to_string() {
            return Err(SchedulingError::Forbidden);
        }

        let observation = Observation {
            id: Uuid::new_v4(),
            appointment_id,
            doctor_id: appointment.doctor_id,
            body,
            created_at: Utc::now(),
        };

        let observation_data = json!({
            "id": observation.id,
            "appointment_id": observation.appointment_id,
            "doctor_id": observation.doctor_id,
            "body": observation.body,
            "created_at": observation.created_at.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/observations",
                Some(auth_token),
                Some(observation_data),
                Some(headers),
            )
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(SchedulingError::Database(
                "observation insert returned no rows".to_string(),
            ));
        }

        info!(
            "Observation {} added to appointment {}",
            observation.id, appointment_id
        );
        Ok(observation)
    }

    /// Observations are visible to the appointment's doctor and patient, and
    /// to admins.
    pub async fn list_observations(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Vec<Observation>, SchedulingError> {
        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;

        let allowed = user.is_admin()
            || user.id == appointment.doctor_id.to_string()
            || user.id == appointment.patient_id.to_string();
        if !allowed {
            return Err(SchedulingError::Forbidden);
        }

        let path = format!(
            "/rest/v1/observations?appointment_id=eq.{}&order=created_at.asc",
            appointment_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Observation>, _>>()
            .map_err(|e| SchedulingError::Database(format!("failed to parse observations: {}", e)))
    }

    async fn fetch_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let row = result.into_iter().next().ok_or(SchedulingError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| SchedulingError::Database(format!("failed to parse appointment: {}", e)))
    }
}
