use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{with_read_retry, StorageError};
use shared_utils::KeyedLocks;

use crate::models::{
    DayOfWeek, DaySchedule, PatchDayRequest, ScheduleError, UpdateTemplateRequest, WeeklyTemplate,
};

/// Persistence for weekly templates, one row per clinician.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn find(&self, clinician_id: Uuid) -> Result<Option<WeeklyTemplate>, StorageError>;

    /// Stores `template` unless the clinician already has one. Returns the
    /// row that ends up stored, whichever writer won.
    async fn insert_if_absent(&self, template: WeeklyTemplate) -> Result<WeeklyTemplate, StorageError>;

    /// Replaces the clinician's template wholesale.
    async fn save(&self, template: WeeklyTemplate) -> Result<WeeklyTemplate, StorageError>;
}

#[derive(Default)]
pub struct InMemoryTemplateStore {
    templates: RwLock<HashMap<Uuid, WeeklyTemplate>>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn find(&self, clinician_id: Uuid) -> Result<Option<WeeklyTemplate>, StorageError> {
        Ok(self.templates.read().await.get(&clinician_id).cloned())
    }

    async fn insert_if_absent(&self, template: WeeklyTemplate) -> Result<WeeklyTemplate, StorageError> {
        let mut templates = self.templates.write().await;
        Ok(templates
            .entry(template.clinician_id)
            .or_insert(template)
            .clone())
    }

    async fn save(&self, template: WeeklyTemplate) -> Result<WeeklyTemplate, StorageError> {
        self.templates
            .write()
            .await
            .insert(template.clinician_id, template.clone());
        Ok(template)
    }
}

/// Template reads and writes. Every write for a clinician runs under that
/// clinician's lock so concurrent patches never merge partially.
pub struct TemplateService {
    store: Arc<dyn TemplateStore>,
    write_locks: KeyedLocks<Uuid>,
    read_backoff: Duration,
}

impl TemplateService {
    pub fn new(store: Arc<dyn TemplateStore>, read_backoff: Duration) -> Self {
        Self {
            store,
            write_locks: KeyedLocks::new(),
            read_backoff,
        }
    }

    /// Looks up a template without creating one.
    pub async fn find(&self, clinician_id: Uuid) -> Result<Option<WeeklyTemplate>, ScheduleError> {
        let store = &self.store;
        let template = with_read_retry("template fetch", self.read_backoff, || store.find(clinician_id)).await?;
        Ok(template)
    }

    /// Returns the clinician's template, persisting the all-days-off default
    /// the first time one is asked for.
    pub async fn get_or_create(&self, clinician_id: Uuid) -> Result<WeeklyTemplate, ScheduleError> {
        if let Some(template) = self.find(clinician_id).await? {
            debug!("Template found for clinician {}", clinician_id);
            return Ok(template);
        }

        let _guard = self.write_locks.acquire(clinician_id).await;
        self.get_or_create_locked(clinician_id).await
    }

    async fn get_or_create_locked(&self, clinician_id: Uuid) -> Result<WeeklyTemplate, ScheduleError> {
        if let Some(template) = self.find(clinician_id).await? {
            return Ok(template);
        }

        info!("Creating default template for clinician {}", clinician_id);
        let template = self
            .store
            .insert_if_absent(WeeklyTemplate::default_for(clinician_id))
            .await?;
        Ok(template)
    }

    pub async fn put(
        &self,
        clinician_id: Uuid,
        request: UpdateTemplateRequest,
    ) -> Result<WeeklyTemplate, ScheduleError> {
        let now = Utc::now();
        let mut template = WeeklyTemplate {
            clinician_id,
            weekly_schedule: request.weekly_schedule,
            default_slot_duration: request.default_slot_duration,
            break_time: request.break_time,
            max_occupancy_per_slot: request.max_occupancy_per_slot.unwrap_or(1),
            created_at: now,
            updated_at: now,
        };
        template.normalize();
        template.validate()?;

        let _guard = self.write_locks.acquire(clinician_id).await;
        if let Some(existing) = self.find(clinician_id).await? {
            template.created_at = existing.created_at;
        }

        let saved = self.store.save(template).await?;
        info!("Template replaced for clinician {}", clinician_id);
        Ok(saved)
    }

    /// Replaces one weekday. `day` is matched case-insensitively against the
    /// seven canonical names.
    pub async fn patch_day(
        &self,
        clinician_id: Uuid,
        day: &str,
        request: PatchDayRequest,
    ) -> Result<WeeklyTemplate, ScheduleError> {
        let day = DayOfWeek::from_name(day)
            .ok_or_else(|| ScheduleError::NotFound("Day not found in schedule".to_string()))?;

        let mut schedule = DaySchedule {
            day,
            is_working_day: request.is_working_day,
            time_slots: request.time_slots,
        };
        schedule.normalize();

        let _guard = self.write_locks.acquire(clinician_id).await;
        let mut template = self.get_or_create_locked(clinician_id).await?;

        schedule.validate(template.default_slot_duration)?;
        template.weekly_schedule.replace(schedule);
        template.updated_at = Utc::now();

        let saved = self.store.save(template).await?;
        info!("{} updated for clinician {}", day, clinician_id);
        Ok(saved)
    }
}
