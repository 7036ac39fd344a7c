use std::sync::Arc;
use std::time::Duration;

use schedule_cell::TemplateService;
use shared_config::AppConfig;

use crate::services::{AppointmentScheduler, AppointmentStore, AvailabilityService, BookingLedger};

/// Router state for the appointment endpoints. Shares the template service
/// with the schedule routes.
#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub availability: Arc<AvailabilityService>,
    pub scheduler: Arc<AppointmentScheduler>,
}

impl AppointmentState {
    pub fn new(
        config: Arc<AppConfig>,
        templates: Arc<TemplateService>,
        store: Arc<dyn AppointmentStore>,
    ) -> Self {
        let ledger = BookingLedger::new(store, Duration::from_millis(config.storage_read_retry_backoff_ms));
        let availability = Arc::new(AvailabilityService::new(templates, ledger.clone()));
        let scheduler = Arc::new(AppointmentScheduler::new(availability.clone(), ledger));

        Self {
            config,
            availability,
            scheduler,
        }
    }
}
