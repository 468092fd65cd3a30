// libs/scheduling-cell/src/services/conflict.rs
//
// Pure scheduling rules. Everything here takes snapshots the engine fetched
// under its locks; nothing here touches the store.

use chrono::{DateTime, Utc};

use calendar_cell::interval::overlaps;

use crate::models::{Appointment, AppointmentStatus};

/// Count of scheduled appointments starting strictly after `now`.
pub fn count_future_scheduled(appointments: &[Appointment], now: DateTime<Utc>) -> usize {
    appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Scheduled && a.start_time > now)
        .count()
}

/// True when [start, end) overlaps any scheduled appointment in the snapshot.
pub fn conflicts_with(
    appointments: &[Appointment],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> bool {
    appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Scheduled)
        .any(|a| overlaps(start, end, a.start_time, a.end_time))
}

/// Notice rule for cancel/reschedule: the gap from `now` to `start` must be
/// at least `notice_hours`. Exactly the notice boundary is accepted.
pub fn meets_notice(start: DateTime<Utc>, now: DateTime<Utc>, notice_hours: i64) -> bool {
    start - now >= chrono::Duration::hours(notice_hours)
}
