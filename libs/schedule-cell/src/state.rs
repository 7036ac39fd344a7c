use std::sync::Arc;
use std::time::Duration;

use shared_config::AppConfig;

use crate::services::{TemplateService, TemplateStore};

/// Router state for the template endpoints.
#[derive(Clone)]
pub struct ScheduleState {
    pub config: Arc<AppConfig>,
    pub templates: Arc<TemplateService>,
}

impl ScheduleState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn TemplateStore>) -> Self {
        let backoff = Duration::from_millis(config.storage_read_retry_backoff_ms);
        Self {
            templates: Arc::new(TemplateService::new(store, backoff)),
            config,
        }
    }
}
