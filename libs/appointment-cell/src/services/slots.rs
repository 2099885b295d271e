// libs/appointment-cell/src/services/slots.rs
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use shared_models::TimeWindow;

use crate::context::SchedulingContext;
use crate::models::{AppointmentError, AppointmentStatus, AvailableSlot};

// ==============================================================================
// SLOT CURSOR
// ==============================================================================

/// Free slots of one working day, in order.
///
/// The cursor only moves forward: a candidate that hits the break jumps to
/// the break's end, one that hits a booking jumps to that booking's end, and
/// an emitted slot advances by one duration. Enumeration stops once a full
/// slot no longer fits before the end of the working window. Clone the
/// cursor to restart it.
#[derive(Debug, Clone)]
pub struct SlotCursor {
    cursor: DateTime<Utc>,
    working_end: DateTime<Utc>,
    duration: Duration,
    lunch: Option<TimeWindow>,
    busy: Vec<TimeWindow>,
}

impl SlotCursor {
    pub fn new(
        working: TimeWindow,
        lunch: Option<TimeWindow>,
        mut busy: Vec<TimeWindow>,
        duration: Duration,
    ) -> Self {
        busy.sort_by_key(|w| w.start);
        Self {
            cursor: working.start,
            working_end: working.end,
            duration,
            lunch,
            busy,
        }
    }

    /// Cursor that yields nothing, for closed days and inactive doctors.
    pub fn empty() -> Self {
        let epoch = DateTime::<Utc>::MIN_UTC;
        Self {
            cursor: epoch,
            working_end: epoch,
            duration: Duration::zero(),
            lunch: None,
            busy: Vec::new(),
        }
    }
}

impl Iterator for SlotCursor {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<TimeWindow> {
        if self.duration <= Duration::zero() {
            return None;
        }

        loop {
            let end = self.cursor + self.duration;
            if end > self.working_end {
                return None;
            }
            let candidate = TimeWindow { start: self.cursor, end };

            if let Some(lunch) = self.lunch.filter(|b| b.overlaps(&candidate)) {
                self.cursor = lunch.end;
                continue;
            }

            if let Some(booked) = self.busy.iter().find(|b| b.overlaps(&candidate)) {
                self.cursor = booked.end;
                continue;
            }

            self.cursor = end;
            return Some(candidate);
        }
    }
}

// ==============================================================================
// SLOT ENUMERATOR
// ==============================================================================

/// Read-only slot listing. Never takes the doctor lock; a booking made from
/// a stale listing is re-validated under the lock anyway.
pub struct SlotEnumerator {
    context: Arc<SchedulingContext>,
}

impl SlotEnumerator {
    pub fn new(context: Arc<SchedulingContext>) -> Self {
        Self { context }
    }

    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        duration_minutes: Option<i64>,
    ) -> Result<Vec<AvailableSlot>, AppointmentError> {
        let slots = self
            .slot_cursor(doctor_id, date, duration_minutes)
            .await?
            .map(|w| AvailableSlot {
                start_time: w.start,
                end_time: w.end,
            })
            .collect::<Vec<_>>();

        debug!("Doctor {} has {} free slots on {}", doctor_id, slots.len(), date);
        Ok(slots)
    }

    /// Builds the cursor for `date`. An explicit duration must lie within the
    /// configured bounds; without one the doctor's default is used.
    pub async fn slot_cursor(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        duration_minutes: Option<i64>,
    ) -> Result<SlotCursor, AppointmentError> {
        let settings = self.context.settings();

        if let Some(minutes) = duration_minutes {
            if minutes < settings.slot_min_minutes || minutes > settings.slot_max_minutes {
                return Err(AppointmentError::Validation(format!(
                    "Duration must be between {} and {} minutes",
                    settings.slot_min_minutes, settings.slot_max_minutes
                )));
            }
        }

        let doctor = self.context
            .directory()
            .get_doctor(doctor_id)
            .await
            .map_err(|e| AppointmentError::Persistence(e.to_string()))?
            .ok_or(AppointmentError::DoctorNotFound)?;

        if !doctor.is_active {
            debug!("Doctor {} is inactive, no slots", doctor_id);
            return Ok(SlotCursor::empty());
        }

        let offset = settings.clinic_offset;
        let Some(day) = doctor.schedule.for_weekday(date.weekday()) else {
            return Ok(SlotCursor::empty());
        };
        let Some(working) = day.window_on(date, offset) else {
            return Ok(SlotCursor::empty());
        };

        let duration = duration_minutes
            .map(Duration::minutes)
            .unwrap_or(doctor.default_duration);

        let busy = self.context
            .store()
            .find_overlapping(doctor_id, working, &AppointmentStatus::ACTIVE)
            .await
            .map_err(|e| AppointmentError::Persistence(e.to_string()))?
            .iter()
            .map(|a| a.window())
            .collect();

        Ok(SlotCursor::new(working, day.break_on(date, offset), busy, duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 3, 4, h, m, 0).unwrap()
    }

    fn window(sh: u32, sm: u32, eh: u32, em: u32) -> TimeWindow {
        TimeWindow::new(at(sh, sm), at(eh, em)).unwrap()
    }

    fn starts(cursor: SlotCursor) -> Vec<(u32, u32)> {
        use chrono::Timelike;
        cursor.map(|w| (w.start.hour(), w.start.minute())).collect()
    }

    #[test]
    fn skips_booking_and_break() {
        let cursor = SlotCursor::new(
            window(9, 0, 18, 0),
            Some(window(13, 0, 14, 0)),
            vec![window(10, 0, 10, 30)],
            Duration::minutes(30),
        );

        let mut expected = vec![(9, 0), (9, 30), (10, 30), (11, 0), (11, 30), (12, 0), (12, 30)];
        for h in 14..18 {
            expected.push((h, 0));
            expected.push((h, 30));
        }
        assert_eq!(starts(cursor), expected);
    }

    #[test]
    fn trailing_partial_slot_is_dropped() {
        let cursor = SlotCursor::new(window(9, 0, 10, 0), None, vec![], Duration::minutes(45));
        assert_eq!(starts(cursor), vec![(9, 0)]);
    }

    #[test]
    fn abutting_and_overlapping_bookings_still_terminate() {
        let cursor = SlotCursor::new(
            window(9, 0, 11, 0),
            None,
            vec![window(9, 0, 9, 40), window(9, 30, 10, 10), window(10, 10, 10, 20)],
            Duration::minutes(30),
        );
        assert_eq!(starts(cursor), vec![(10, 20)]);
    }

    #[test]
    fn break_consuming_whole_candidate_is_skipped() {
        let cursor = SlotCursor::new(
            window(12, 0, 15, 0),
            Some(window(12, 30, 14, 0)),
            vec![],
            Duration::minutes(60),
        );
        assert_eq!(starts(cursor), vec![(14, 0)]);
    }

    #[test]
    fn bookings_outside_window_are_ignored() {
        let cursor = SlotCursor::new(
            window(9, 0, 10, 0),
            None,
            vec![window(7, 0, 8, 0), window(10, 0, 11, 0)],
            Duration::minutes(30),
        );
        assert_eq!(starts(cursor), vec![(9, 0), (9, 30)]);
    }

    #[test]
    fn cloned_cursor_restarts_identically() {
        let cursor = SlotCursor::new(
            window(9, 0, 12, 0),
            None,
            vec![window(10, 0, 10, 15)],
            Duration::minutes(20),
        );
        let replay = cursor.clone();
        assert_eq!(cursor.collect::<Vec<_>>(), replay.collect::<Vec<_>>());
    }

    #[test]
    fn empty_cursor_yields_nothing() {
        assert_eq!(SlotCursor::empty().count(), 0);
    }
}
