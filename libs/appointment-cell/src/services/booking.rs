use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use schedule_cell::{validate_slot_duration, WallTime, WeeklyTemplate};
use security_cell::{AppointmentAction, AuthorizationGuard};
use shared_database::StorageError;
use shared_models::identity::Caller;
use shared_utils::KeyedLocks;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, RescheduleAppointmentRequest,
};
use crate::services::availability::AvailabilityService;
use crate::services::ledger::{BookingLedger, SlotClaim};
use crate::services::lifecycle::AppointmentLifecycle;

type SlotKey = (Uuid, NaiveDate, WallTime);

/// Capacity failures on a write mean someone else took the slot first.
fn write_error(e: StorageError) -> AppointmentError {
    match e {
        StorageError::CapacityExceeded { .. } | StorageError::Conflict(_) => AppointmentError::SlotUnavailable,
        other => other.into(),
    }
}

/// Books, moves and finishes appointments.
///
/// Capacity checks run under a lock on `(clinician, date, slot start)` held
/// until the write returns, so concurrent bookings of one slot are
/// serialized. Mutations of an existing appointment also hold that
/// appointment's lock, which is always taken before any slot lock.
pub struct AppointmentScheduler {
    availability: Arc<AvailabilityService>,
    ledger: BookingLedger,
    slot_locks: KeyedLocks<SlotKey>,
    appointment_locks: KeyedLocks<Uuid>,
}

impl AppointmentScheduler {
    pub fn new(availability: Arc<AvailabilityService>, ledger: BookingLedger) -> Self {
        Self {
            availability,
            ledger,
            slot_locks: KeyedLocks::new(),
            appointment_locks: KeyedLocks::new(),
        }
    }

    #[instrument(skip_all, fields(clinician_id = %request.clinician_id, date = %request.date, time = %request.time))]
    pub async fn book(&self, caller: &Caller, request: BookAppointmentRequest) -> Result<Appointment, AppointmentError> {
        if !AuthorizationGuard::can_book(caller, request.clinician_id, request.patient_id) {
            return Err(AppointmentError::Unauthorized("Not allowed to book this appointment".to_string()));
        }

        let template = self.availability.template(request.clinician_id).await?;
        let duration = Self::duration(&template, request.duration_minutes)?;
        let claim = Self::claim_for(&template, request.date, request.time)?;

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            clinician_id: request.clinician_id,
            patient_id: request.patient_id,
            date: request.date,
            time: request.time,
            duration_minutes: duration,
            status: AppointmentStatus::Scheduled,
            notes: None,
            created_at: now,
            updated_at: now,
        };

        let _slot = self.slot_locks.acquire(Self::slot_key(&claim)).await;
        let booked = self
            .ledger
            .store()
            .insert_within_capacity(appointment, claim)
            .await
            .map_err(write_error)?;

        info!("Appointment {} booked for patient {}", booked.id, booked.patient_id);
        Ok(booked)
    }

    /// Clinician or admin move. Works from `Scheduled` and `Rescheduled`.
    #[instrument(skip_all, fields(appointment_id = %appointment_id))]
    pub async fn clinician_reschedule(
        &self,
        caller: &Caller,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        if caller.is_patient() {
            return Err(AppointmentError::Unauthorized("Patients must use the patient reschedule".to_string()));
        }
        self.reschedule(caller, appointment_id, request).await
    }

    /// Patient move of their own appointment.
    #[instrument(skip_all, fields(appointment_id = %appointment_id))]
    pub async fn patient_reschedule(
        &self,
        caller: &Caller,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        if !caller.is_patient() {
            return Err(AppointmentError::Unauthorized("Only patients may use the patient reschedule".to_string()));
        }
        self.reschedule(caller, appointment_id, request).await
    }

    async fn reschedule(
        &self,
        caller: &Caller,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let _appointment = self.appointment_locks.acquire(appointment_id).await;
        let mut appointment = self.authorized(caller, appointment_id, AppointmentAction::Reschedule).await?;

        AppointmentLifecycle::validate_transition(appointment.status, AppointmentStatus::Rescheduled)?;

        let template = self.availability.template(appointment.clinician_id).await?;
        let duration = match request.duration_minutes {
            Some(minutes) => Self::duration(&template, Some(minutes))?,
            None => appointment.duration_minutes,
        };
        let claim = Self::claim_for(&template, request.new_date, request.new_time)?;

        appointment.date = request.new_date;
        appointment.time = request.new_time;
        appointment.duration_minutes = duration;
        appointment.status = AppointmentStatus::Rescheduled;
        appointment.updated_at = Utc::now();

        let _slot = self.slot_locks.acquire(Self::slot_key(&claim)).await;
        let moved = self
            .ledger
            .store()
            .update_within_capacity(appointment, claim)
            .await
            .map_err(write_error)?;

        info!("Appointment {} moved to {} {}", moved.id, moved.date, moved.time);
        Ok(moved)
    }

    /// Cancelling an already cancelled appointment succeeds without a write.
    #[instrument(skip_all, fields(appointment_id = %appointment_id))]
    pub async fn cancel(&self, caller: &Caller, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let _appointment = self.appointment_locks.acquire(appointment_id).await;
        let appointment = self.authorized(caller, appointment_id, AppointmentAction::Cancel).await?;

        if appointment.status == AppointmentStatus::Cancelled {
            info!("Appointment {} already cancelled", appointment_id);
            return Ok(appointment);
        }

        self.transition(appointment, AppointmentStatus::Cancelled).await
    }

    /// Direct move to `Completed` or `Cancelled`. Any other target is an
    /// invalid transition from whatever the appointment currently is.
    #[instrument(skip_all, fields(appointment_id = %appointment_id, status = %status))]
    pub async fn set_status(
        &self,
        caller: &Caller,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let _appointment = self.appointment_locks.acquire(appointment_id).await;
        let appointment = self.authorized(caller, appointment_id, AppointmentAction::SetStatus).await?;

        if !matches!(status, AppointmentStatus::Completed | AppointmentStatus::Cancelled) {
            warn!("set_status to {} refused on appointment {}", status, appointment_id);
            return Err(AppointmentError::InvalidTransition { from: appointment.status, to: status });
        }
        self.transition(appointment, status).await
    }

    #[instrument(skip_all, fields(appointment_id = %appointment_id))]
    pub async fn start(&self, caller: &Caller, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let _appointment = self.appointment_locks.acquire(appointment_id).await;
        let appointment = self.authorized(caller, appointment_id, AppointmentAction::Start).await?;
        self.transition(appointment, AppointmentStatus::InProgress).await
    }

    /// Notes are free text and may change in any status.
    #[instrument(skip_all, fields(appointment_id = %appointment_id))]
    pub async fn update_notes(
        &self,
        caller: &Caller,
        appointment_id: Uuid,
        notes: String,
    ) -> Result<Appointment, AppointmentError> {
        let _appointment = self.appointment_locks.acquire(appointment_id).await;
        let mut appointment = self.authorized(caller, appointment_id, AppointmentAction::UpdateNotes).await?;

        appointment.notes = Some(notes);
        appointment.updated_at = Utc::now();

        let updated = self.ledger.store().update(appointment).await?;
        info!("Notes updated on appointment {}", updated.id);
        Ok(updated)
    }

    pub async fn get(&self, caller: &Caller, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.authorized(caller, appointment_id, AppointmentAction::View).await
    }

    pub async fn list_for_clinician(
        &self,
        caller: &Caller,
        clinician_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if !AuthorizationGuard::can_list_clinician_appointments(caller, clinician_id) {
            warn!("{} {} denied: list appointments of clinician {}", caller.role, caller.id, clinician_id);
            return Err(AppointmentError::Unauthorized("Not allowed to list these appointments".to_string()));
        }
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(AppointmentError::Validation("'from' must not be after 'to'".to_string()));
            }
        }

        Ok(self.ledger.clinician_calendar(clinician_id, from, to).await?)
    }

    pub async fn list_for_patient(&self, caller: &Caller, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        if !AuthorizationGuard::can_list_patient_appointments(caller, patient_id) {
            warn!("{} {} denied: list appointments of patient {}", caller.role, caller.id, patient_id);
            return Err(AppointmentError::Unauthorized("Not allowed to list these appointments".to_string()));
        }

        Ok(self.ledger.patient_history(patient_id).await?)
    }

    async fn authorized(
        &self,
        caller: &Caller,
        appointment_id: Uuid,
        action: AppointmentAction,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self
            .ledger
            .get(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound("Appointment not found".to_string()))?;

        if !AuthorizationGuard::can_mutate_appointment(caller, &appointment, action) {
            return Err(AppointmentError::Unauthorized(format!("Not allowed to {} this appointment", action)));
        }
        Ok(appointment)
    }

    async fn transition(
        &self,
        mut appointment: Appointment,
        next: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        AppointmentLifecycle::validate_transition(appointment.status, next)?;

        let previous = appointment.status;
        appointment.status = next;
        appointment.updated_at = Utc::now();

        let updated = self.ledger.store().update(appointment).await?;
        info!("Appointment {} {} -> {}", updated.id, previous, updated.status);
        Ok(updated)
    }

    fn duration(template: &WeeklyTemplate, requested: Option<u32>) -> Result<u32, AppointmentError> {
        let minutes = requested.unwrap_or(template.default_slot_duration);
        validate_slot_duration(minutes)?;
        Ok(minutes)
    }

    fn claim_for(template: &WeeklyTemplate, date: NaiveDate, time: WallTime) -> Result<SlotClaim, AppointmentError> {
        let slot = AvailabilityService::slot_at(template, date, time).ok_or_else(|| {
            warn!("No slot at {} {} for clinician {}", date, time, template.clinician_id);
            AppointmentError::SlotUnavailable
        })?;
        Ok(SlotClaim::new(template.clinician_id, date, &slot, template.max_occupancy_per_slot))
    }

    fn slot_key(claim: &SlotClaim) -> SlotKey {
        (claim.clinician_id, claim.date, claim.start)
    }
}
