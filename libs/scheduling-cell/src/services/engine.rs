// libs/scheduling-cell/src/services/engine.rs
//
// The scheduling engine. Every mutation runs its read-then-write checks under
// the scheduling locks so two concurrent requests cannot both observe a free
// slot (or a quota with room) and both commit. Lock order is always patient
// before doctor. Lock contention surfaces as Transient after one retry.

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use calendar_cell::services::calendar::CalendarService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use standing_cell::services::standing::StandingService;

use crate::models::{
    Appointment, AppointmentStatus, BookAppointmentRequest, SchedulingError, SchedulingRules,
};
use crate::services::conflict::{conflicts_with, count_future_scheduled, meets_notice};
use crate::services::locks::LockService;

const RETRY_BACKOFF_MS: u64 = 100;

pub struct SchedulingEngine {
    supabase: SupabaseClient,
    calendar: CalendarService,
    standing: StandingService,
    locks: LockService,
    rules: SchedulingRules,
}

impl SchedulingEngine {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            calendar: CalendarService::new(config),
            standing: StandingService::new(config),
            locks: LockService::new(config),
            rules: SchedulingRules::default(),
        }
    }

    // ==============================================================================
    // BOOKING
    // ==============================================================================

    pub async fn book(
        &self,
        request: &BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        for attempt in 1..=2 {
            match self.try_book(request, auth_token).await {
                Err(SchedulingError::Transient) if attempt == 1 => {
                    warn!(
                        "Booking contention for doctor {}, retrying",
                        request.doctor_id
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(RETRY_BACKOFF_MS)).await;
                }
                other => return other,
            }
        }

        Err(SchedulingError::Transient)
    }

    async fn try_book(
        &self,
        request: &BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let patient_lock = LockService::patient_key(request.patient_id);
        let doctor_lock = LockService::doctor_key(request.doctor_id);

        if !self.locks.acquire(&patient_lock).await? {
            return Err(SchedulingError::Transient);
        }
        if !self.locks.acquire(&doctor_lock).await? {
            self.release_quietly(&patient_lock).await;
            return Err(SchedulingError::Transient);
        }

        let result = self.validate_and_create(request, auth_token).await;

        self.release_quietly(&doctor_lock).await;
        self.release_quietly(&patient_lock).await;

        result
    }

    /// A failed release must not fail the operation it guarded; the 30s
    /// lease bounds how long a stuck lock can linger.
    async fn release_quietly(&self, lock_key: &str) {
        if let Err(e) = self.locks.release(lock_key).await {
            warn!("Failed to release scheduling lock {}: {}", lock_key, e);
        }
    }

    /// Booking preconditions, first failure wins. Runs under both locks.
    async fn validate_and_create(
        &self,
        request: &BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let now = Utc::now();

        self.ensure_patient_bookable(request.patient_id, auth_token)
            .await?;

        let patient_appointments = self
            .patient_scheduled(request.patient_id, auth_token)
            .await?;
        if count_future_scheduled(&patient_appointments, now) >= self.rules.max_future_appointments
        {
            return Err(SchedulingError::FutureAppointmentQuotaExceeded);
        }

        if request.start_time <= now {
            return Err(SchedulingError::PastDateRequested);
        }

        let end_time = request.start_time + Duration::minutes(self.rules.consultation_minutes);

        let within = self
            .calendar
            .interval_within_working_hours(
                request.doctor_id,
                request.start_time,
                end_time,
                auth_token,
            )
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;
        if !within {
            return Err(SchedulingError::OutsideWorkingHours);
        }

        let neighbors = self
            .doctor_scheduled_between(
                request.doctor_id,
                request.start_time,
                end_time,
                None,
                auth_token,
            )
            .await?;
        if conflicts_with(&neighbors, request.start_time, end_time) {
            return Err(SchedulingError::SchedulingConflict);
        }

        self.insert_appointment(request, end_time, auth_token).await
    }

    // ==============================================================================
    // CANCELLATION
    // ==============================================================================

    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        for attempt in 1..=2 {
            match self.try_cancel(appointment_id, user, auth_token).await {
                Err(SchedulingError::Transient) if attempt == 1 => {
                    warn!("Cancellation contention for appointment {}, retrying", appointment_id);
                    tokio::time::sleep(std::time::Duration::from_millis(RETRY_BACKOFF_MS)).await;
                }
                other => return other,
            }
        }

        Err(SchedulingError::Transient)
    }

    async fn try_cancel(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        // Pre-lock read only determines whose calendar to lock.
        let snapshot = self.get_appointment(appointment_id, auth_token).await?;
        ensure_patient_owner(&snapshot, user)?;

        let doctor_lock = LockService::doctor_key(snapshot.doctor_id);
        if !self.locks.acquire(&doctor_lock).await? {
            return Err(SchedulingError::Transient);
        }

        let result = self.validate_cancel(appointment_id, user, auth_token).await;

        self.release_quietly(&doctor_lock).await;
        result
    }

    // Standing state is deliberately not consulted: a blocked patient may
    // still cancel an existing booking.
    async fn validate_cancel(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        // Re-read under the lock; a concurrent reschedule may have moved the
        // slot since the pre-lock snapshot.
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        ensure_patient_owner(&appointment, user)?;

        if appointment.status != AppointmentStatus::Scheduled {
            return Err(SchedulingError::InvalidStatus(appointment.status));
        }
        if !meets_notice(appointment.start_time, Utc::now(), self.rules.notice_hours) {
            return Err(SchedulingError::InsufficientNotice);
        }

        let updated = self
            .patch_appointment(
                appointment.id,
                json!({
                    "status": "canceled",
                    "updated_at": Utc::now().to_rfc3339()
                }),
                auth_token,
            )
            .await?;

        info!("Appointment {} canceled", appointment.id);
        Ok(updated)
    }

    // ==============================================================================
    // RESCHEDULE
    // ==============================================================================

    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        new_start: DateTime<Utc>,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        for attempt in 1..=2 {
            match self
                .try_reschedule(appointment_id, new_start, user, auth_token)
                .await
            {
                Err(SchedulingError::Transient) if attempt == 1 => {
                    warn!("Reschedule contention for appointment {}, retrying", appointment_id);
                    tokio::time::sleep(std::time::Duration::from_millis(RETRY_BACKOFF_MS)).await;
                }
                other => return other,
            }
        }

        Err(SchedulingError::Transient)
    }

    async fn try_reschedule(
        &self,
        appointment_id: Uuid,
        new_start: DateTime<Utc>,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        // Pre-lock read only determines whose calendar to lock.
        let snapshot = self.get_appointment(appointment_id, auth_token).await?;
        ensure_patient_owner(&snapshot, user)?;

        let doctor_lock = LockService::doctor_key(snapshot.doctor_id);
        if !self.locks.acquire(&doctor_lock).await? {
            return Err(SchedulingError::Transient);
        }

        let result = self
            .validate_reschedule(appointment_id, new_start, user, auth_token)
            .await;

        self.release_quietly(&doctor_lock).await;
        result
    }

    async fn validate_reschedule(
        &self,
        appointment_id: Uuid,
        new_start: DateTime<Utc>,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let now = Utc::now();

        // Re-read under the lock; a concurrent cancel or reschedule may have
        // changed the row since the pre-lock snapshot.
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        ensure_patient_owner(&appointment, user)?;

        if appointment.status != AppointmentStatus::Scheduled {
            return Err(SchedulingError::InvalidStatus(appointment.status));
        }
        // Notice is measured against the slot being given up, not the new one.
        if !meets_notice(appointment.start_time, now, self.rules.notice_hours) {
            return Err(SchedulingError::InsufficientNotice);
        }

        if new_start <= now {
            return Err(SchedulingError::PastDateRequested);
        }

        let new_end = new_start + Duration::minutes(self.rules.consultation_minutes);

        let within = self
            .calendar
            .interval_within_working_hours(appointment.doctor_id, new_start, new_end, auth_token)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;
        if !within {
            return Err(SchedulingError::OutsideWorkingHours);
        }

        let neighbors = self
            .doctor_scheduled_between(
                appointment.doctor_id,
                new_start,
                new_end,
                Some(appointment.id),
                auth_token,
            )
            .await?;
        if conflicts_with(&neighbors, new_start, new_end) {
            return Err(SchedulingError::SchedulingConflict);
        }

        let updated = self
            .patch_appointment(
                appointment.id,
                json!({
                    "start_time": new_start.to_rfc3339(),
                    "end_time": new_end.to_rfc3339(),
                    "updated_at": Utc::now().to_rfc3339()
                }),
                auth_token,
            )
            .await?;

        info!("Appointment {} rescheduled to {}", appointment.id, new_start);
        Ok(updated)
    }

    // ==============================================================================
    // NO-SHOW
    // ==============================================================================

    /// Mark a scheduled appointment as a no-show and feed the patient's
    /// absence counter. Restricted to the appointment's doctor or an admin.
    pub async fn record_no_show(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        if !user.is_admin() && user.id != appointment.doctor_id.to_string() {
            return Err(SchedulingError::Forbidden);
        }
        if appointment.status != AppointmentStatus::Scheduled {
            return Err(SchedulingError::InvalidStatus(appointment.status));
        }

        // Counter first: an absence without the status flip converges by
        // retrying the patch, while the reverse loses the absence for good.
        self.standing
            .record_absence(appointment.patient_id, auth_token)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let updated = self
            .patch_appointment(
                appointment.id,
                json!({
                    "status": "no_show",
                    "updated_at": Utc::now().to_rfc3339()
                }),
                auth_token,
            )
            .await?;

        info!(
            "Appointment {} marked no-show for patient {}",
            appointment.id, appointment.patient_id
        );
        Ok(updated)
    }

    // ==============================================================================
    // QUERIES
    // ==============================================================================

    pub async fn get_appointment(
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

    pub async fn list_for_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&order=start_time.asc",
            patient_id
        );
        self.fetch_appointments(&path, auth_token).await
    }

    pub async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&order=start_time.asc",
            doctor_id
        );
        self.fetch_appointments(&path, auth_token).await
    }

    // ==============================================================================
    // PRIVATE HELPERS
    // ==============================================================================

    async fn ensure_patient_bookable(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<(), SchedulingError> {
        let path = format!("/rest/v1/patients?id=eq.{}&select=id", patient_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        if rows.is_empty() {
            return Err(SchedulingError::NotFound);
        }

        let standing = self
            .standing
            .get_standing(patient_id, auth_token)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        if standing.is_blocked {
            debug!("Booking rejected, patient {} is blocked", patient_id);
            return Err(SchedulingError::PatientBlocked);
        }

        Ok(())
    }

    async fn patient_scheduled(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&status=eq.scheduled",
            patient_id
        );
        self.fetch_appointments(&path, auth_token).await
    }

    /// The doctor's scheduled appointments intersecting [start, end),
    /// optionally excluding one appointment (the one being moved).
    async fn doctor_scheduled_between(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=eq.scheduled&start_time=lt.{}&end_time=gt.{}",
            doctor_id,
            urlencoding::encode(&end.to_rfc3339()),
            urlencoding::encode(&start.to_rfc3339())
        );
        if let Some(excluded_id) = exclude {
            path.push_str(&format!("&id=neq.{}", excluded_id));
        }
        self.fetch_appointments(&path, auth_token).await
    }

    async fn fetch_appointments(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| SchedulingError::Database(format!("failed to parse appointments: {}", e)))
    }

    async fn insert_appointment(
        &self,
        request: &BookAppointmentRequest,
        end_time: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            start_time: request.start_time,
            end_time,
            status: AppointmentStatus::Scheduled,
            created_at: now,
            updated_at: now,
        };

        let appointment_data = json!({
            "id": appointment.id,
            "patient_id": appointment.patient_id,
            "doctor_id": appointment.doctor_id,
            "start_time": appointment.start_time.to_rfc3339(),
            "end_time": appointment.end_time.to_rfc3339(),
            "status": "scheduled",
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
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
                "/rest/v1/appointments",
                Some(auth_token),
                Some(appointment_data),
                Some(headers),
            )
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(SchedulingError::Database(
                "appointment insert returned no rows".to_string(),
            ));
        }

        info!(
            "Appointment {} booked for patient {} with doctor {} at {}",
            appointment.id, appointment.patient_id, appointment.doctor_id, appointment.start_time
        );
        Ok(appointment)
    }

    async fn patch_appointment(
        &self,
        appointment_id: Uuid,
        patch: Value,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(patch), Some(headers))
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let row = result.into_iter().next().ok_or(SchedulingError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| SchedulingError::Database(format!("failed to parse appointment: {}", e)))
    }
}

fn ensure_patient_owner(appointment: &Appointment, user: &User) -> Result<(), SchedulingError> {
    if user.is_admin() || user.id == appointment.patient_id.to_string() {
        Ok(())
    } else {
        Err(SchedulingError::Forbidden)
    }
}
