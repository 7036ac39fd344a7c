mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use uuid::Uuid;

use appointment_cell::services::SlotClaim;
use appointment_cell::{Appointment, AppointmentError, AppointmentStore, InMemoryAppointmentStore, RescheduleAppointmentRequest};
use shared_database::StorageError;
use shared_models::identity::Caller;

use common::{booking, monday, t, Clinic};

/// Counts and writes in two separate steps with a pause in between, the way
/// a remote store without conditional inserts behaves.
struct CheckThenWriteStore {
    inner: InMemoryAppointmentStore,
}

impl CheckThenWriteStore {
    async fn check(&self, claim: &SlotClaim, exclude: Option<Uuid>) -> Result<(), StorageError> {
        let day = self.inner.list_for_clinician_on(claim.clinician_id, claim.date).await?;
        let occupancy = claim.occupancy(&day, exclude);
        tokio::time::sleep(Duration::from_millis(5)).await;
        if occupancy >= claim.capacity {
            return Err(StorageError::CapacityExceeded { capacity: claim.capacity });
        }
        Ok(())
    }

    fn unbounded(claim: SlotClaim) -> SlotClaim {
        SlotClaim { capacity: u32::MAX, ..claim }
    }
}

#[async_trait]
impl AppointmentStore for CheckThenWriteStore {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StorageError> {
        self.inner.get(id).await
    }

    async fn list_for_clinician_on(&self, clinician_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, StorageError> {
        self.inner.list_for_clinician_on(clinician_id, date).await
    }

    async fn list_for_clinician(
        &self,
        clinician_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Appointment>, StorageError> {
        self.inner.list_for_clinician(clinician_id, from, to).await
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StorageError> {
        self.inner.list_for_patient(patient_id).await
    }

    async fn insert_within_capacity(&self, appointment: Appointment, claim: SlotClaim) -> Result<Appointment, StorageError> {
        self.check(&claim, None).await?;
        self.inner.insert_within_capacity(appointment, Self::unbounded(claim)).await
    }

    async fn update_within_capacity(&self, appointment: Appointment, claim: SlotClaim) -> Result<Appointment, StorageError> {
        self.check(&claim, Some(appointment.id)).await?;
        self.inner.update_within_capacity(appointment, Self::unbounded(claim)).await
    }

    async fn update(&self, appointment: Appointment) -> Result<Appointment, StorageError> {
        self.inner.update(appointment).await
    }
}

async fn race_bookings(clinic: Arc<Clinic>, clinician: Uuid, callers: usize) -> (usize, usize) {
    let attempts = (0..callers).map(move |_| {
        let clinic = clinic.clone();
        tokio::spawn(async move {
            let patient = Caller::patient(Uuid::new_v4());
            clinic
                .state
                .scheduler
                .book(&patient, booking(clinician, patient.id, monday(), "09:00"))
                .await
        })
    });

    let mut booked = 0;
    let mut unavailable = 0;
    for result in join_all(attempts).await {
        match result.unwrap() {
            Ok(_) => booked += 1,
            Err(AppointmentError::SlotUnavailable) => unavailable += 1,
            Err(other) => panic!("unexpected booking error: {other}"),
        }
    }
    (booked, unavailable)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_never_exceed_capacity() {
    for capacity in [1, 3] {
        let clinic = Arc::new(Clinic::new());
        let clinician = Uuid::new_v4();
        clinic.open_mondays(clinician, capacity).await;

        let (booked, unavailable) = race_bookings(clinic, clinician, 24).await;
        assert_eq!(booked, capacity as usize);
        assert_eq!(unavailable, 24 - capacity as usize);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slot_lock_guards_stores_without_conditional_writes() {
    let store = Arc::new(CheckThenWriteStore { inner: InMemoryAppointmentStore::new() });
    let clinic = Arc::new(Clinic::with_store(store));
    let clinician = Uuid::new_v4();
    clinic.open_mondays(clinician, 2).await;

    let (booked, unavailable) = race_bookings(clinic.clone(), clinician, 16).await;
    assert_eq!(booked, 2);
    assert_eq!(unavailable, 14);

    let free = clinic.state.availability.available_slots(clinician, monday()).await.unwrap();
    assert!(free.iter().all(|slot| slot.start_time != t("09:00")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reschedules_into_one_slot_respect_capacity() {
    let clinic = Arc::new(Clinic::new());
    let clinician = Caller::clinician(Uuid::new_v4());
    clinic.open_mondays(clinician.id, 1).await;

    let mut ids = Vec::new();
    for time in ["09:00", "09:30", "10:30", "11:00"] {
        let appointment = clinic
            .state
            .scheduler
            .book(&clinician, booking(clinician.id, Uuid::new_v4(), monday(), time))
            .await
            .unwrap();
        ids.push(appointment.id);
    }
    // 11:30 is the only free slot left.
    let moves = ids.into_iter().map(move |id| {
        let clinic = clinic.clone();
        tokio::spawn(async move {
            clinic
                .state
                .scheduler
                .clinician_reschedule(
                    &clinician,
                    id,
                    RescheduleAppointmentRequest { new_date: monday(), new_time: t("11:30"), duration_minutes: None },
                )
                .await
        })
    });

    let succeeded = join_all(moves)
        .await
        .into_iter()
        .filter(|result| matches!(result, Ok(Ok(_))))
        .count();
    assert_eq!(succeeded, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_and_reschedule_of_one_appointment_do_not_interleave() {
    let clinic = Arc::new(Clinic::new());
    let clinician = Caller::clinician(Uuid::new_v4());
    clinic.open_mondays(clinician.id, 1).await;
    let appointment = clinic
        .state
        .scheduler
        .book(&clinician, booking(clinician.id, Uuid::new_v4(), monday(), "09:00"))
        .await
        .unwrap();

    let cancel = {
        let clinic = clinic.clone();
        tokio::spawn(async move { clinic.state.scheduler.cancel(&clinician, appointment.id).await })
    };
    let reschedule = {
        let clinic = clinic.clone();
        tokio::spawn(async move {
            clinic
                .state
                .scheduler
                .clinician_reschedule(
                    &clinician,
                    appointment.id,
                    RescheduleAppointmentRequest { new_date: monday(), new_time: t("11:00"), duration_minutes: None },
                )
                .await
        })
    };

    let cancelled = cancel.await.unwrap();
    let moved = reschedule.await.unwrap();
    assert!(cancelled.is_ok());

    let stored = clinic.state.scheduler.get(&clinician, appointment.id).await.unwrap();
    match moved {
        // Reschedule ran first, then cancel saw the moved appointment.
        Ok(_) => assert_eq!(stored.time, t("11:00")),
        // Cancel ran first; the reschedule found a final status.
        Err(e) => {
            assert!(matches!(e, AppointmentError::InvalidTransition { .. }));
            assert_eq!(stored.time, t("09:00"));
        }
    }
    assert_eq!(stored.status, appointment_cell::AppointmentStatus::Cancelled);
}
