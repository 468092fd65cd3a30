// libs/calendar-cell/src/services/calendar.rs
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::interval::{blocked, overlaps, slots_for_window, window_contains};
use crate::models::{
    AvailableSlot, BookedInterval, CalendarError, CreateTimeBlockRequest, CreateWindowRequest,
    TimeBlock, WeekDay, WorkingHourWindow,
};

/// Fixed consultation slot length in minutes.
pub const SLOT_MINUTES: i64 = 30;

pub struct CalendarService {
    supabase: SupabaseClient,
}

impl CalendarService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    // ==============================================================================
    // WORKING-HOUR WINDOWS
    // ==============================================================================

    /// Create a recurring weekly working-hour window for a doctor.
    /// Windows on the same weekday must not overlap.
    pub async fn create_window(
        &self,
        doctor_id: Uuid,
        request: CreateWindowRequest,
        auth_token: &str,
    ) -> Result<WorkingHourWindow, CalendarError> {
        debug!("Creating working-hour window for doctor {}", doctor_id);

        if request.start_time >= request.end_time {
            return Err(CalendarError::InvalidTimeRange(
                "start time must be before end time".to_string(),
            ));
        }

        let same_day = self
            .windows_for_day(doctor_id, request.day_of_week, auth_token)
            .await?;

        for existing in &same_day {
            if overlaps(
                request.start_time,
                request.end_time,
                existing.start_time,
                existing.end_time,
            ) {
                warn!(
                    "Window overlap for doctor {} on {}: requested {}-{}",
                    doctor_id, request.day_of_week, request.start_time, request.end_time
                );
                return Err(CalendarError::WindowOverlap);
            }
        }

        let window_data = json!({
            "doctor_id": doctor_id,
            "day_of_week": request.day_of_week.ordinal(),
            "start_time": request.start_time.format("%H:%M:%S").to_string(),
            "end_time": request.end_time.format("%H:%M:%S").to_string(),
            "created_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/working_hour_windows",
                Some(auth_token),
                Some(window_data),
                Some(headers),
            )
            .await
            .map_err(|e| CalendarError::Database(e.to_string()))?;

        let created = result
            .into_iter()
            .next()
            .ok_or_else(|| CalendarError::Database("failed to create window".to_string()))?;

        serde_json::from_value(created)
            .map_err(|e| CalendarError::Database(format!("failed to parse window: {}", e)))
    }

    pub async fn list_windows(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<WorkingHourWindow>, CalendarError> {
        let path = format!(
            "/rest/v1/working_hour_windows?doctor_id=eq.{}&order=day_of_week.asc,start_time.asc",
            doctor_id
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| CalendarError::Database(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<WorkingHourWindow>, _>>()
            .map_err(|e| CalendarError::Database(format!("failed to parse windows: {}", e)))
    }

    pub async fn delete_window(
        &self,
        window_id: Uuid,
        auth_token: &str,
    ) -> Result<(), CalendarError> {
        debug!("Deleting working-hour window {}", window_id);

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let path = format!("/rest/v1/working_hour_windows?id=eq.{}", window_id);
        let _: Vec<Value> = self
            .supabase
            .request_with_headers(Method::DELETE, &path, Some(auth_token), None, Some(headers))
            .await
            .map_err(|e| CalendarError::Database(e.to_string()))?;

        Ok(())
    }

    pub async fn get_window(
        &self,
        window_id: Uuid,
        auth_token: &str,
    ) -> Result<WorkingHourWindow, CalendarError> {
        let path = format!("/rest/v1/working_hour_windows?id=eq.{}", window_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| CalendarError::Database(e.to_string()))?;

        let row = result.into_iter().next().ok_or(CalendarError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| CalendarError::Database(format!("failed to parse window: {}", e)))
    }

    // ==============================================================================
    // TIME BLOCKS
    // ==============================================================================

    pub async fn create_time_block(
        &self,
        doctor_id: Uuid,
        request: CreateTimeBlockRequest,
        auth_token: &str,
    ) -> Result<TimeBlock, CalendarError> {
        debug!("Creating time block for doctor {}", doctor_id);

        if request.start_time >= request.end_time {
            return Err(CalendarError::InvalidTimeRange(
                "start time must be before end time".to_string(),
            ));
        }

        let block_data = json!({
            "doctor_id": doctor_id,
            "start_time": request.start_time.to_rfc3339(),
            "end_time": request.end_time.to_rfc3339(),
            "reason": request.reason,
            "created_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/time_blocks",
                Some(auth_token),
                Some(block_data),
                Some(headers),
            )
            .await
            .map_err(|e| CalendarError::Database(e.to_string()))?;

        let created = result
            .into_iter()
            .next()
            .ok_or_else(|| CalendarError::Database("failed to create time block".to_string()))?;

        serde_json::from_value(created)
            .map_err(|e| CalendarError::Database(format!("failed to parse time block: {}", e)))
    }

    pub async fn list_time_blocks(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<TimeBlock>, CalendarError> {
        let path = format!(
            "/rest/v1/time_blocks?doctor_id=eq.{}&order=start_time.asc",
            doctor_id
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| CalendarError::Database(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<TimeBlock>, _>>()
            .map_err(|e| CalendarError::Database(format!("failed to parse time blocks: {}", e)))
    }

    pub async fn get_time_block(
        &self,
        block_id: Uuid,
        auth_token: &str,
    ) -> Result<TimeBlock, CalendarError> {
        let path = format!("/rest/v1/time_blocks?id=eq.{}", block_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| CalendarError::Database(e.to_string()))?;

        let row = result.into_iter().next().ok_or(CalendarError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| CalendarError::Database(format!("failed to parse time block: {}", e)))
    }

    pub async fn delete_time_block(
        &self,
        block_id: Uuid,
        auth_token: &str,
    ) -> Result<(), CalendarError> {
        debug!("Deleting time block {}", block_id);

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let path = format!("/rest/v1/time_blocks?id=eq.{}", block_id);
        let _: Vec<Value> = self
            .supabase
            .request_with_headers(Method::DELETE, &path, Some(auth_token), None, Some(headers))
            .await
            .map_err(|e| CalendarError::Database(e.to_string()))?;

        Ok(())
    }

    // ==============================================================================
    // AVAILABILITY QUERIES
    // ==============================================================================

    /// True when [start, end) lies within one of the doctor's working-hour
    /// windows for that weekday and intersects no time block.
    pub async fn interval_within_working_hours(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<bool, CalendarError> {
        let day = WeekDay::from(start.weekday());
        let windows = self.windows_for_day(doctor_id, day, auth_token).await?;

        if !windows.iter().any(|w| window_contains(w, start, end)) {
            return Ok(false);
        }

        let blocks = self
            .time_blocks_intersecting(doctor_id, start, end, auth_token)
            .await?;

        Ok(!blocked(&blocks, start, end))
    }

    /// Ordered 30-minute slot starts for a doctor on a given date, excluding
    /// slots intersecting a time block or a scheduled appointment.
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<AvailableSlot>, CalendarError> {
        debug!("Calculating available slots for doctor {} on {}", doctor_id, date);

        let day = WeekDay::from(date.weekday());
        let windows = self.windows_for_day(doctor_id, day, auth_token).await?;
        if windows.is_empty() {
            return Ok(vec![]);
        }

        let day_start = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
        let day_end = day_start + chrono::Duration::days(1);

        let booked = self
            .booked_intervals(doctor_id, day_start, day_end, auth_token)
            .await?;
        let blocks = self
            .time_blocks_intersecting(doctor_id, day_start, day_end, auth_token)
            .await?;

        let mut slots = Vec::new();
        for window in &windows {
            slots.extend(slots_for_window(window, date, SLOT_MINUTES, &booked, &blocks));
        }

        slots.sort_by(|a, b| a.start_time.cmp(&b.start_time));

        debug!("Found {} available slots", slots.len());
        Ok(slots)
    }

    // ==============================================================================
    // PRIVATE HELPERS
    // ==============================================================================

    async fn windows_for_day(
        &self,
        doctor_id: Uuid,
        day: WeekDay,
        auth_token: &str,
    ) -> Result<Vec<WorkingHourWindow>, CalendarError> {
        let path = format!(
            "/rest/v1/working_hour_windows?doctor_id=eq.{}&day_of_week=eq.{}&order=start_time.asc",
            doctor_id,
            day.ordinal()
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| CalendarError::Database(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<WorkingHourWindow>, _>>()
            .map_err(|e| CalendarError::Database(format!("failed to parse windows: {}", e)))
    }

    async fn time_blocks_intersecting(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<TimeBlock>, CalendarError> {
        let path = format!(
            "/rest/v1/time_blocks?doctor_id=eq.{}&start_time=lt.{}&end_time=gt.{}",
            doctor_id,
            urlencoding::encode(&end.to_rfc3339()),
            urlencoding::encode(&start.to_rfc3339())
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| CalendarError::Database(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<TimeBlock>, _>>()
            .map_err(|e| CalendarError::Database(format!("failed to parse time blocks: {}", e)))
    }

    async fn booked_intervals(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<BookedInterval>, CalendarError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=eq.scheduled&start_time=gte.{}&start_time=lt.{}&select=start_time,end_time",
            doctor_id,
            urlencoding::encode(&start.to_rfc3339()),
            urlencoding::encode(&end.to_rfc3339())
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| CalendarError::Database(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<BookedInterval>, _>>()
            .map_err(|e| CalendarError::Database(format!("failed to parse appointments: {}", e)))
    }
}
