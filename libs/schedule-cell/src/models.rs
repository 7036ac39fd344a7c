use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use shared_database::StorageError;
use shared_models::error::AppError;

pub const MIN_SLOT_DURATION: u32 = 5;
pub const MAX_SLOT_DURATION: u32 = 120;
pub const DEFAULT_SLOT_DURATION: u32 = 30;
pub const MAX_OCCUPANCY_PER_SLOT: u32 = 10;

// 24h clock, one or two digit hour, no 24:00.
static TIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-1]?[0-9]|2[0-3]):([0-5][0-9])$").expect("time pattern is a valid regex")
});

// ==============================================================================
// WEEKDAYS AND WALL-CLOCK TIMES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayOfWeek {
    #[serde(alias = "monday")]
    Monday,
    #[serde(alias = "tuesday")]
    Tuesday,
    #[serde(alias = "wednesday")]
    Wednesday,
    #[serde(alias = "thursday")]
    Thursday,
    #[serde(alias = "friday")]
    Friday,
    #[serde(alias = "saturday")]
    Saturday,
    #[serde(alias = "sunday")]
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    /// Position in a Monday-first week.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
        }
    }

    /// Case-insensitive lookup of a canonical weekday name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|day| day.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn of(date: NaiveDate) -> Self {
        date.weekday().into()
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A time of day with minute precision, written as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WallTime(NaiveTime);

impl WallTime {
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(WallTime)
    }

    /// Inverse of [`WallTime::minutes`]; `None` past 23:59.
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        Self::from_hm(minutes / 60, minutes % 60)
    }

    /// Minutes since midnight.
    pub fn minutes(&self) -> u32 {
        self.0.num_seconds_from_midnight() / 60
    }
}

impl FromStr for WallTime {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScheduleError::Validation(format!("'{}' is not a valid HH:MM time", s));
        let captures = TIME_PATTERN.captures(s).ok_or_else(invalid)?;
        let hour = captures[1].parse().map_err(|_| invalid())?;
        let minute = captures[2].parse().map_err(|_| invalid())?;
        WallTime::from_hm(hour, minute).ok_or_else(invalid)
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl Serialize for WallTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WallTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ==============================================================================
// TEMPLATE MODEL
// ==============================================================================

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start_time: WallTime,
    pub end_time: WallTime,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

impl TimeSlot {
    pub fn new(start_time: WallTime, end_time: WallTime) -> Self {
        Self { start_time, end_time, is_available: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub day: DayOfWeek,
    pub is_working_day: bool,
    #[serde(default)]
    pub time_slots: Vec<TimeSlot>,
}

impl DaySchedule {
    pub fn day_off(day: DayOfWeek) -> Self {
        Self { day, is_working_day: false, time_slots: Vec::new() }
    }

    pub fn working(day: DayOfWeek, time_slots: Vec<TimeSlot>) -> Self {
        Self { day, is_working_day: true, time_slots }
    }

    /// Sorts intervals by start time.
    pub fn normalize(&mut self) {
        self.time_slots.sort_by_key(|slot| slot.start_time);
    }

    /// Checks interval bounds, overlap and duration compatibility.
    /// Expects [`DaySchedule::normalize`] to have run.
    pub fn validate(&self, slot_duration: u32) -> Result<(), ScheduleError> {
        validate_slot_duration(slot_duration)?;
        let mut previous_end: Option<WallTime> = None;

        for slot in &self.time_slots {
            if slot.start_time >= slot.end_time {
                return Err(ScheduleError::Validation(format!(
                    "{}: slot {}-{} must start before it ends",
                    self.day, slot.start_time, slot.end_time
                )));
            }

            let span = slot.end_time.minutes() - slot.start_time.minutes();
            if span % slot_duration != 0 {
                return Err(ScheduleError::Validation(format!(
                    "{}: slot {}-{} is not a multiple of the {} minute slot duration",
                    self.day, slot.start_time, slot.end_time, slot_duration
                )));
            }

            if let Some(end) = previous_end {
                if slot.start_time < end {
                    return Err(ScheduleError::Validation(format!(
                        "{}: slot starting {} overlaps the previous slot",
                        self.day, slot.start_time
                    )));
                }
            }
            previous_end = Some(slot.end_time);
        }

        Ok(())
    }
}

/// Exactly one [`DaySchedule`] per weekday, stored Monday first.
///
/// Serialized as a plain list; deserializing rejects missing or repeated days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<DaySchedule>", into = "Vec<DaySchedule>")]
pub struct WeeklySchedule([DaySchedule; 7]);

impl WeeklySchedule {
    pub fn all_days_off() -> Self {
        WeeklySchedule(DayOfWeek::ALL.map(DaySchedule::day_off))
    }

    pub fn day(&self, day: DayOfWeek) -> &DaySchedule {
        &self.0[day.index()]
    }

    /// Replaces one weekday wholesale. The entry's `day` decides which.
    pub fn replace(&mut self, schedule: DaySchedule) {
        let index = schedule.day.index();
        self.0[index] = schedule;
    }

    pub fn iter(&self) -> impl Iterator<Item = &DaySchedule> {
        self.0.iter()
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut DaySchedule> {
        self.0.iter_mut()
    }
}

impl TryFrom<Vec<DaySchedule>> for WeeklySchedule {
    type Error = ScheduleError;

    fn try_from(days: Vec<DaySchedule>) -> Result<Self, Self::Error> {
        let mut by_day: [Option<DaySchedule>; 7] = Default::default();

        for schedule in days {
            let index = schedule.day.index();
            if by_day[index].is_some() {
                return Err(ScheduleError::Validation(format!(
                    "{} appears more than once in weekly schedule",
                    schedule.day
                )));
            }
            by_day[index] = Some(schedule);
        }

        if let Some(missing) = DayOfWeek::ALL.into_iter().find(|day| by_day[day.index()].is_none()) {
            return Err(ScheduleError::Validation(format!(
                "{} is missing from weekly schedule",
                missing
            )));
        }

        let days: Vec<DaySchedule> = by_day.into_iter().flatten().collect();
        let days: [DaySchedule; 7] = days
            .try_into()
            .map_err(|_| ScheduleError::Validation("weekly schedule must have 7 days".to_string()))?;
        Ok(WeeklySchedule(days))
    }
}

impl From<WeeklySchedule> for Vec<DaySchedule> {
    fn from(schedule: WeeklySchedule) -> Self {
        schedule.0.into()
    }
}

/// Clinician-wide pause removed from every day's slots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakTime {
    pub start: WallTime,
    pub end: WallTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyTemplate {
    pub clinician_id: Uuid,
    pub weekly_schedule: WeeklySchedule,
    pub default_slot_duration: u32,
    pub break_time: Option<BreakTime>,
    pub max_occupancy_per_slot: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WeeklyTemplate {
    /// The template handed to clinicians who never configured one: every day
    /// off, 30 minute slots, a 13:00-14:00 break, one patient per slot.
    pub fn default_for(clinician_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            clinician_id,
            weekly_schedule: WeeklySchedule::all_days_off(),
            default_slot_duration: DEFAULT_SLOT_DURATION,
            break_time: WallTime::from_hm(13, 0)
                .zip(WallTime::from_hm(14, 0))
                .map(|(start, end)| BreakTime { start, end }),
            max_occupancy_per_slot: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn day(&self, day: DayOfWeek) -> &DaySchedule {
        self.weekly_schedule.day(day)
    }

    pub fn normalize(&mut self) {
        self.weekly_schedule.iter_mut().for_each(DaySchedule::normalize);
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        validate_slot_duration(self.default_slot_duration)?;

        if !(1..=MAX_OCCUPANCY_PER_SLOT).contains(&self.max_occupancy_per_slot) {
            return Err(ScheduleError::Validation(format!(
                "max_occupancy_per_slot must be between 1 and {}",
                MAX_OCCUPANCY_PER_SLOT
            )));
        }

        if let Some(break_time) = &self.break_time {
            if break_time.start >= break_time.end {
                return Err(ScheduleError::Validation(
                    "break_time start must be before its end".to_string(),
                ));
            }
        }

        self.weekly_schedule
            .iter()
            .try_for_each(|day| day.validate(self.default_slot_duration))
    }
}

pub fn validate_slot_duration(minutes: u32) -> Result<(), ScheduleError> {
    if (MIN_SLOT_DURATION..=MAX_SLOT_DURATION).contains(&minutes) {
        Ok(())
    } else {
        Err(ScheduleError::Validation(format!(
            "slot duration must be between {} and {} minutes",
            MIN_SLOT_DURATION, MAX_SLOT_DURATION
        )))
    }
}

/// A concrete bookable interval on some date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start_time: WallTime,
    pub end_time: WallTime,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTemplateRequest {
    pub weekly_schedule: WeeklySchedule,
    pub default_slot_duration: u32,
    pub break_time: Option<BreakTime>,
    pub max_occupancy_per_slot: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchDayRequest {
    pub is_working_day: bool,
    #[serde(default)]
    pub time_slots: Vec<TimeSlot>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ScheduleError> for AppError {
    fn from(e: ScheduleError) -> Self {
        match e {
            ScheduleError::Validation(msg) => AppError::ValidationError(msg),
            ScheduleError::Unauthorized(msg) => AppError::Forbidden(msg),
            ScheduleError::NotFound(msg) => AppError::NotFound(msg),
            ScheduleError::Storage(StorageError::NotFound(msg)) => AppError::NotFound(msg),
            ScheduleError::Storage(e @ StorageError::Malformed(_)) => AppError::Internal(e.to_string()),
            ScheduleError::Storage(e) => AppError::Database(e.to_string()),
        }
    }
}
