// libs/scheduling-cell/src/services/locks.rs
//
// Distributed mutual exclusion over a scheduling_locks table. A lock is held
// by inserting a row keyed on lock_key (unique constraint) and released by
// deleting it. Stale rows past expires_at are cleaned up on contention.

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::SchedulingError;

const LOCK_TIMEOUT_SECONDS: i64 = 30;

fn representation_headers() -> reqwest::header::HeaderMap {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        "Prefer",
        reqwest::header::HeaderValue::from_static("return=representation"),
    );
    headers
}

pub struct LockService {
    supabase: SupabaseClient,
}

impl LockService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Lock key serializing all bookings against one doctor's calendar.
    pub fn doctor_key(doctor_id: Uuid) -> String {
        format!("doctor_{}", doctor_id)
    }

    /// Lock key serializing one patient's quota-sensitive mutations.
    pub fn patient_key(patient_id: Uuid) -> String {
        format!("patient_{}", patient_id)
    }

    /// Try to take the lock. Returns false when another holder owns a
    /// still-valid lock; expired locks are removed and retaken.
    pub async fn acquire(&self, lock_key: &str) -> Result<bool, SchedulingError> {
        if self.try_insert(lock_key).await {
            debug!("Scheduling lock acquired: {}", lock_key);
            return Ok(true);
        }

        // Holder may have died; retake only if its lease expired.
        if self.cleanup_if_expired(lock_key).await? {
            let acquired = self.try_insert(lock_key).await;
            if acquired {
                debug!("Scheduling lock acquired after cleanup: {}", lock_key);
            }
            return Ok(acquired);
        }

        Ok(false)
    }

    pub async fn release(&self, lock_key: &str) -> Result<(), SchedulingError> {
        let _: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &format!("/rest/v1/scheduling_locks?lock_key=eq.{}", lock_key),
                None,
                None,
                Some(representation_headers()),
            )
            .await
            .map_err(|e| SchedulingError::Database(format!("Lock release failed: {}", e)))?;

        debug!("Scheduling lock released: {}", lock_key);
        Ok(())
    }

    async fn try_insert(&self, lock_key: &str) -> bool {
        let lock_data = json!({
            "lock_key": lock_key,
            "acquired_at": Utc::now().to_rfc3339(),
            "expires_at": (Utc::now() + Duration::seconds(LOCK_TIMEOUT_SECONDS)).to_rfc3339(),
            "process_id": format!("scheduler_{}", Uuid::new_v4())
        });

        self.supabase
            .request_with_headers::<Vec<Value>>(
                Method::POST,
                "/rest/v1/scheduling_locks",
                None,
                Some(lock_data),
                Some(representation_headers()),
            )
            .await
            .is_ok()
    }

    async fn cleanup_if_expired(&self, lock_key: &str) -> Result<bool, SchedulingError> {
        let response: Value = self
            .supabase
            .request(
                Method::GET,
                &format!("/rest/v1/scheduling_locks?lock_key=eq.{}&select=*", lock_key),
                None,
                None,
            )
            .await
            .map_err(|e| SchedulingError::Database(format!("Lock check failed: {}", e)))?;

        let expired = response
            .as_array()
            .and_then(|locks| locks.first())
            .and_then(|lock| lock.get("expires_at"))
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|expires_at| expires_at.with_timezone(&Utc) < Utc::now())
            .unwrap_or(false);

        if expired {
            self.release(lock_key).await?;
            info!("Cleaned up expired scheduling lock: {}", lock_key);
        }

        Ok(expired)
    }
}
