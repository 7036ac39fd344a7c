#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use uuid::Uuid;

use appointment_cell::{AppointmentState, AppointmentStore, BookAppointmentRequest, InMemoryAppointmentStore};
use schedule_cell::{
    BreakTime, DayOfWeek, DaySchedule, InMemoryTemplateStore, TemplateService, TimeSlot, UpdateTemplateRequest,
    WallTime, WeeklySchedule,
};
use shared_utils::test_utils::TestConfig;

pub fn t(s: &str) -> WallTime {
    s.parse().unwrap()
}

/// 2024-06-03 is a Monday.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

pub fn next_monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
}

pub struct Clinic {
    pub config: TestConfig,
    pub templates: Arc<TemplateService>,
    pub state: Arc<AppointmentState>,
}

impl Clinic {
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryAppointmentStore::new()))
    }

    pub fn with_store(store: Arc<dyn AppointmentStore>) -> Self {
        let config = TestConfig::default();
        let templates = Arc::new(TemplateService::new(
            Arc::new(InMemoryTemplateStore::new()),
            Duration::from_millis(1),
        ));
        let state = Arc::new(AppointmentState::new(config.to_arc(), templates.clone(), store));
        Self { config, templates, state }
    }

    /// Monday 09:00-12:00 in 30 minute slots, break 10:00-10:30.
    pub async fn open_mondays(&self, clinician_id: Uuid, capacity: u32) {
        let mut week = WeeklySchedule::all_days_off();
        week.replace(DaySchedule::working(
            DayOfWeek::Monday,
            vec![TimeSlot::new(t("09:00"), t("12:00"))],
        ));

        self.templates
            .put(
                clinician_id,
                UpdateTemplateRequest {
                    weekly_schedule: week,
                    default_slot_duration: 30,
                    break_time: Some(BreakTime { start: t("10:00"), end: t("10:30") }),
                    max_occupancy_per_slot: Some(capacity),
                },
            )
            .await
            .unwrap();
    }
}

pub fn booking(clinician_id: Uuid, patient_id: Uuid, date: NaiveDate, time: &str) -> BookAppointmentRequest {
    BookAppointmentRequest {
        clinician_id,
        patient_id,
        date,
        time: t(time),
        duration_minutes: None,
    }
}
