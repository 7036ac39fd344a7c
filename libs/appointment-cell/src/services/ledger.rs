use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use schedule_cell::{Slot, WallTime};
use shared_database::{with_read_retry, StorageError};

use crate::models::Appointment;

/// The slot a capacity-guarded write wants to occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotClaim {
    pub clinician_id: Uuid,
    pub date: NaiveDate,
    pub start: WallTime,
    pub end: WallTime,
    pub capacity: u32,
}

impl SlotClaim {
    pub fn new(clinician_id: Uuid, date: NaiveDate, slot: &Slot, capacity: u32) -> Self {
        Self {
            clinician_id,
            date,
            start: slot.start_time,
            end: slot.end_time,
            capacity,
        }
    }

    pub fn covers(&self, appointment: &Appointment) -> bool {
        appointment.clinician_id == self.clinician_id
            && appointment.date == self.date
            && appointment.status.is_active()
            && self.start <= appointment.time
            && appointment.time < self.end
    }

    /// Active appointments inside the claimed slot, not counting `exclude`.
    pub fn occupancy<'a>(
        &self,
        appointments: impl IntoIterator<Item = &'a Appointment>,
        exclude: Option<Uuid>,
    ) -> u32 {
        let count = appointments
            .into_iter()
            .filter(|appointment| Some(appointment.id) != exclude && self.covers(appointment))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// Appointment persistence.
///
/// The `_within_capacity` writes fail with [`StorageError::CapacityExceeded`]
/// when the claimed slot is already full, never counting the appointment
/// being written.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StorageError>;

    /// Every appointment for the clinician on `date`, whatever its status.
    async fn list_for_clinician_on(
        &self,
        clinician_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StorageError>;

    async fn list_for_clinician(
        &self,
        clinician_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Appointment>, StorageError>;

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StorageError>;

    async fn insert_within_capacity(
        &self,
        appointment: Appointment,
        claim: SlotClaim,
    ) -> Result<Appointment, StorageError>;

    async fn update_within_capacity(
        &self,
        appointment: Appointment,
        claim: SlotClaim,
    ) -> Result<Appointment, StorageError>;

    /// Unconditional update for changes that free or keep occupancy.
    async fn update(&self, appointment: Appointment) -> Result<Appointment, StorageError>;
}

fn sort_calendar(appointments: &mut [Appointment]) {
    appointments.sort_by_key(|appointment| (appointment.date, appointment.time));
}

/// Process-local store. Capacity checks and writes share one write lock.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StorageError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn list_for_clinician_on(
        &self,
        clinician_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StorageError> {
        let mut found: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.clinician_id == clinician_id && a.date == date)
            .cloned()
            .collect();
        sort_calendar(&mut found);
        Ok(found)
    }

    async fn list_for_clinician(
        &self,
        clinician_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Appointment>, StorageError> {
        let mut found: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.clinician_id == clinician_id)
            .filter(|a| from.map_or(true, |from| a.date >= from))
            .filter(|a| to.map_or(true, |to| a.date <= to))
            .cloned()
            .collect();
        sort_calendar(&mut found);
        Ok(found)
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StorageError> {
        let mut found: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        sort_calendar(&mut found);
        Ok(found)
    }

    async fn insert_within_capacity(
        &self,
        appointment: Appointment,
        claim: SlotClaim,
    ) -> Result<Appointment, StorageError> {
        let mut appointments = self.appointments.write().await;

        if appointments.contains_key(&appointment.id) {
            return Err(StorageError::Conflict(format!("Appointment {} already exists", appointment.id)));
        }
        if claim.occupancy(appointments.values(), None) >= claim.capacity {
            return Err(StorageError::CapacityExceeded { capacity: claim.capacity });
        }

        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update_within_capacity(
        &self,
        appointment: Appointment,
        claim: SlotClaim,
    ) -> Result<Appointment, StorageError> {
        let mut appointments = self.appointments.write().await;

        if !appointments.contains_key(&appointment.id) {
            return Err(StorageError::NotFound(format!("Appointment {}", appointment.id)));
        }
        if claim.occupancy(appointments.values(), Some(appointment.id)) >= claim.capacity {
            return Err(StorageError::CapacityExceeded { capacity: claim.capacity });
        }

        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update(&self, appointment: Appointment) -> Result<Appointment, StorageError> {
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(&appointment.id) {
            Some(stored) => {
                *stored = appointment.clone();
                Ok(appointment)
            }
            None => Err(StorageError::NotFound(format!("Appointment {}", appointment.id))),
        }
    }
}

/// Read side of the appointment store with one retry on transient faults.
/// Writes go to [`BookingLedger::store`] and are never retried.
#[derive(Clone)]
pub struct BookingLedger {
    store: Arc<dyn AppointmentStore>,
    read_backoff: Duration,
}

impl BookingLedger {
    pub fn new(store: Arc<dyn AppointmentStore>, read_backoff: Duration) -> Self {
        Self { store, read_backoff }
    }

    pub fn store(&self) -> &Arc<dyn AppointmentStore> {
        &self.store
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StorageError> {
        let store = &self.store;
        with_read_retry("appointment fetch", self.read_backoff, || store.get(id)).await
    }

    /// Active appointments of one clinician on one calendar day.
    pub async fn active_on(&self, clinician_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, StorageError> {
        let store = &self.store;
        let appointments = with_read_retry("day ledger fetch", self.read_backoff, || {
            store.list_for_clinician_on(clinician_id, date)
        })
        .await?;

        let active: Vec<Appointment> = appointments
            .into_iter()
            .filter(|appointment| appointment.status.is_active())
            .collect();
        debug!("{} active appointments for clinician {} on {}", active.len(), clinician_id, date);
        Ok(active)
    }

    pub async fn clinician_calendar(
        &self,
        clinician_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Appointment>, StorageError> {
        let store = &self.store;
        with_read_retry("clinician calendar fetch", self.read_backoff, || {
            store.list_for_clinician(clinician_id, from, to)
        })
        .await
    }

    pub async fn patient_history(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StorageError> {
        let store = &self.store;
        with_read_retry("patient appointments fetch", self.read_backoff, || {
            store.list_for_patient(patient_id)
        })
        .await
    }
}
