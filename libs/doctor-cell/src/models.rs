use std::collections::HashMap;

use chrono::{Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use shared_models::TimeWindow;

pub const DEFAULT_APPOINTMENT_MINUTES: i64 = 30;
/// Longest default duration accepted from the directory: one day.
pub const MAX_APPOINTMENT_MINUTES: i64 = 24 * 60;

// ==============================================================================
// RAW DIRECTORY RECORDS
// ==============================================================================

/// One weekday entry as stored in the `doctors.work_schedule` JSON column,
/// e.g. `{"start": "09:00", "end": "18:00", "break": "13:00-14:00"}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDaySchedule {
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(rename = "break")]
    pub break_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorRecord {
    pub id: Uuid,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub work_schedule: HashMap<String, Option<RawDaySchedule>>,
    pub appointment_duration_minutes: Option<i64>,
}

fn default_active() -> bool {
    true
}

// ==============================================================================
// NORMALISED SCHEDULE
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("Invalid time of day: {0}")]
    InvalidTime(String),

    #[error("Working hours must end after they start")]
    EmptyWindow,

    #[error("Malformed break interval: {0}")]
    MalformedBreak(String),

    #[error("Break must lie within working hours")]
    BreakOutsideWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakTime {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// A validated working day: `start < end`, and the optional break lies
/// within `[start, end]` with `break.start < break.end`. A break may touch
/// either edge of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingDay {
    start: NaiveTime,
    end: NaiveTime,
    break_time: Option<BreakTime>,
}

impl WorkingDay {
    pub fn new(
        start: NaiveTime,
        end: NaiveTime,
        break_time: Option<BreakTime>,
    ) -> Result<Self, ScheduleError> {
        if start >= end {
            return Err(ScheduleError::EmptyWindow);
        }

        if let Some(b) = break_time {
            if b.start >= b.end {
                return Err(ScheduleError::MalformedBreak(format!("{}-{}", b.start, b.end)));
            }
            if b.start < start || b.end > end {
                return Err(ScheduleError::BreakOutsideWindow);
            }
        }

        Ok(Self { start, end, break_time })
    }

    pub fn from_raw(raw: &RawDaySchedule) -> Result<Option<Self>, ScheduleError> {
        let (start, end) = match (raw.start.as_deref(), raw.end.as_deref()) {
            (Some(start), Some(end)) if !start.trim().is_empty() && !end.trim().is_empty() => {
                (parse_time_of_day(start)?, parse_time_of_day(end)?)
            }
            // Missing start or end means the doctor does not work that day
            _ => return Ok(None),
        };

        let break_time = match raw.break_time.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(range) => {
                let (b_start, b_end) = range
                    .split_once('-')
                    .ok_or_else(|| ScheduleError::MalformedBreak(range.to_string()))?;
                Some(BreakTime {
                    start: parse_time_of_day(b_start)?,
                    end: parse_time_of_day(b_end)?,
                })
            }
        };

        Self::new(start, end, break_time).map(Some)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn break_time(&self) -> Option<BreakTime> {
        self.break_time
    }

    /// Working hours on `date`, with local times interpreted at `offset`.
    pub fn window_on(&self, date: NaiveDate, offset: FixedOffset) -> Option<TimeWindow> {
        TimeWindow::new(
            local_to_utc(date, self.start, offset)?,
            local_to_utc(date, self.end, offset)?,
        )
    }

    pub fn break_on(&self, date: NaiveDate, offset: FixedOffset) -> Option<TimeWindow> {
        let b = self.break_time?;
        TimeWindow::new(
            local_to_utc(date, b.start, offset)?,
            local_to_utc(date, b.end, offset)?,
        )
    }
}

fn local_to_utc(
    date: NaiveDate,
    time: NaiveTime,
    offset: FixedOffset,
) -> Option<chrono::DateTime<Utc>> {
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, ScheduleError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| ScheduleError::InvalidTime(value.to_string()))
}

/// Strict per-weekday schedule. Index 0 is Monday.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    days: [Option<WorkingDay>; 7],
}

impl WeeklySchedule {
    pub fn closed() -> Self {
        Self::default()
    }

    /// The clinic's stock schedule: weekdays 09:00-18:00 with a lunch break,
    /// short Saturday, closed on Sunday.
    pub fn clinic_default() -> Self {
        let t = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap_or(NaiveTime::MIN);
        let weekday = WorkingDay {
            start: t(9),
            end: t(18),
            break_time: Some(BreakTime { start: t(13), end: t(14) }),
        };
        let saturday = WorkingDay { start: t(10), end: t(16), break_time: None };

        Self::closed()
            .with_day(Weekday::Mon, weekday)
            .with_day(Weekday::Tue, weekday)
            .with_day(Weekday::Wed, weekday)
            .with_day(Weekday::Thu, weekday)
            .with_day(Weekday::Fri, weekday)
            .with_day(Weekday::Sat, saturday)
    }

    pub fn with_day(mut self, weekday: Weekday, day: WorkingDay) -> Self {
        self.days[weekday.num_days_from_monday() as usize] = Some(day);
        self
    }

    pub fn for_weekday(&self, weekday: Weekday) -> Option<&WorkingDay> {
        self.days[weekday.num_days_from_monday() as usize].as_ref()
    }

    /// Normalises the loosely-typed JSON column. Malformed days are logged and
    /// treated as closed, so downstream code only ever sees valid windows.
    pub fn from_raw(raw: &HashMap<String, Option<RawDaySchedule>>) -> Self {
        let mut schedule = Self::closed();

        for (key, entry) in raw {
            let weekday = match key.parse::<Weekday>() {
                Ok(weekday) => weekday,
                Err(_) => {
                    warn!("Ignoring unknown weekday key in work schedule: {}", key);
                    continue;
                }
            };

            let Some(entry) = entry else { continue };

            match WorkingDay::from_raw(entry) {
                Ok(Some(day)) => schedule = schedule.with_day(weekday, day),
                Ok(None) => {}
                Err(e) => warn!("Treating {} as closed, invalid schedule: {}", key, e),
            }
        }

        schedule
    }
}

// ==============================================================================
// DIRECTORY VIEW
// ==============================================================================

/// Read-only view of a doctor consumed by the booking engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorScheduleView {
    pub doctor_id: Uuid,
    pub is_active: bool,
    pub schedule: WeeklySchedule,
    pub default_duration: Duration,
}

impl DoctorScheduleView {
    pub fn new(doctor_id: Uuid, schedule: WeeklySchedule, default_duration: Duration) -> Self {
        Self {
            doctor_id,
            is_active: true,
            schedule,
            default_duration,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

impl From<DoctorRecord> for DoctorScheduleView {
    fn from(record: DoctorRecord) -> Self {
        let configured = match record.appointment_duration_minutes {
            Some(m) if (1..=MAX_APPOINTMENT_MINUTES).contains(&m) => Duration::try_minutes(m),
            Some(m) => {
                warn!(
                    "Doctor {} has default duration {} outside 1..={} minutes, using {}",
                    record.id, m, MAX_APPOINTMENT_MINUTES, DEFAULT_APPOINTMENT_MINUTES
                );
                None
            }
            None => None,
        };
        let default_duration = configured
            .unwrap_or_else(|| Duration::minutes(DEFAULT_APPOINTMENT_MINUTES));

        Self {
            doctor_id: record.id,
            is_active: record.is_active,
            schedule: WeeklySchedule::from_raw(&record.work_schedule),
            default_duration,
        }
    }
}
