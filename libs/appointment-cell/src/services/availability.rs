use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use schedule_cell::{Slot, SlotProjector, TemplateService, WallTime, WeeklyTemplate};

use crate::models::AppointmentError;
use crate::services::ledger::{BookingLedger, SlotClaim};

/// Free slots: the template's projection minus slots already at capacity.
pub struct AvailabilityService {
    templates: Arc<TemplateService>,
    ledger: BookingLedger,
}

impl AvailabilityService {
    pub fn new(templates: Arc<TemplateService>, ledger: BookingLedger) -> Self {
        Self { templates, ledger }
    }

    /// The clinician's template. Unlike the schedule endpoints this never
    /// creates a default.
    pub async fn template(&self, clinician_id: Uuid) -> Result<WeeklyTemplate, AppointmentError> {
        self.templates
            .find(clinician_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(format!("No schedule for clinician {}", clinician_id)))
    }

    pub async fn available_slots(&self, clinician_id: Uuid, date: NaiveDate) -> Result<Vec<Slot>, AppointmentError> {
        let template = self.template(clinician_id).await?;
        let candidates = SlotProjector::project(&template, date);
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let active = self.ledger.active_on(clinician_id, date).await?;
        let free: Vec<Slot> = candidates
            .into_iter()
            .filter(|slot| {
                let claim = SlotClaim::new(clinician_id, date, slot, template.max_occupancy_per_slot);
                claim.occupancy(&active, None) < claim.capacity
            })
            .collect();

        debug!("{} free slots for clinician {} on {}", free.len(), clinician_id, date);
        Ok(free)
    }

    /// The projected slot starting exactly at `time`, if the template offers one.
    pub fn slot_at(template: &WeeklyTemplate, date: NaiveDate, time: WallTime) -> Option<Slot> {
        SlotProjector::project(template, date)
            .into_iter()
            .find(|slot| slot.start_time == time)
    }
}
