// libs/calendar-cell/src/interval.rs
//
// Shared half-open interval arithmetic. Appointments, time blocks and slot
// candidates are all treated as [start, end) intervals.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::models::{AvailableSlot, BookedInterval, TimeBlock, WorkingHourWindow};

/// Two half-open intervals [a, b) and [c, d) overlap iff a < d and c < b.
pub fn overlaps<T: PartialOrd>(a: T, b: T, c: T, d: T) -> bool {
    a < d && c < b
}

/// True when [start, end) lies entirely inside the window's daily hours.
/// Both instants must fall on the same calendar date for the containment to
/// make sense; the caller matches the weekday before calling this.
pub fn window_contains(window: &WorkingHourWindow, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    if start.date_naive() != end.date_naive() && end.time() != NaiveTime::MIN {
        return false;
    }

    let starts_inside = start.time() >= window.start_time;
    // A slot ending exactly at the window's end is still inside it. A slot
    // running to midnight only fits a window that also ends at midnight,
    // which NaiveTime cannot express, so it is rejected.
    let ends_inside = end.time() <= window.end_time && end.time() != NaiveTime::MIN;

    starts_inside && ends_inside
}

/// True when [start, end) intersects any of the doctor's time blocks.
pub fn blocked(blocks: &[TimeBlock], start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    blocks
        .iter()
        .any(|block| overlaps(start, end, block.start_time, block.end_time))
}

/// Enumerate fixed-duration slot starts inside one working-hour window on a
/// given date, skipping slots that intersect a booked interval or time block.
pub fn slots_for_window(
    window: &WorkingHourWindow,
    date: NaiveDate,
    slot_minutes: i64,
    booked: &[BookedInterval],
    blocks: &[TimeBlock],
) -> Vec<AvailableSlot> {
    let step = Duration::minutes(slot_minutes);
    let window_start = date.and_time(window.start_time).and_utc();
    let window_end = date.and_time(window.end_time).and_utc();

    let mut slots = Vec::new();
    let mut current = window_start;

    while current + step <= window_end {
        let slot_end = current + step;

        let occupied = booked
            .iter()
            .any(|b| overlaps(current, slot_end, b.start_time, b.end_time));

        if !occupied && !blocked(blocks, current, slot_end) {
            slots.push(AvailableSlot {
                start_time: current,
                end_time: slot_end,
            });
        }

        current += step;
    }

    slots
}
