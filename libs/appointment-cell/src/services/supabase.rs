use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};
use shared_database::StorageError;

use crate::models::Appointment;
use crate::services::ledger::{AppointmentStore, SlotClaim};

const TABLE: &str = "/rest/v1/appointments";

/// `appointments` table, indexed on `(clinician_id, date)`.
///
/// The capacity-guarded writes count then write in two requests. They are
/// only atomic while the caller holds the slot lock for the claim, which
/// `AppointmentScheduler` always does.
pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn select(&self, query: &str) -> Result<Vec<Appointment>, StorageError> {
        let path = format!("{}?{}", TABLE, query);
        self.supabase.request(Method::GET, &path, None, None).await
    }

    async fn check_capacity(&self, claim: &SlotClaim, exclude: Option<Uuid>) -> Result<(), StorageError> {
        let day = self.list_for_clinician_on(claim.clinician_id, claim.date).await?;
        let occupancy = claim.occupancy(&day, exclude);
        debug!(
            "Slot {} on {} for clinician {} holds {}/{}",
            claim.start, claim.date, claim.clinician_id, occupancy, claim.capacity
        );

        if occupancy >= claim.capacity {
            warn!("Slot {} on {} is full", claim.start, claim.date);
            return Err(StorageError::CapacityExceeded { capacity: claim.capacity });
        }
        Ok(())
    }

    async fn patch(&self, appointment: Appointment) -> Result<Appointment, StorageError> {
        let path = format!("{}?id=eq.{}", TABLE, appointment.id);
        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                None,
                Some(json!(appointment)),
                Some(return_representation()),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::NotFound(format!("Appointment {}", appointment.id)))
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StorageError> {
        let rows = self.select(&format!("id=eq.{}", id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_for_clinician_on(
        &self,
        clinician_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StorageError> {
        self.select(&format!("clinician_id=eq.{}&date=eq.{}&order=time.asc", clinician_id, date))
            .await
    }

    async fn list_for_clinician(
        &self,
        clinician_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Appointment>, StorageError> {
        let mut query = format!("clinician_id=eq.{}", clinician_id);
        if let Some(from) = from {
            query.push_str(&format!("&date=gte.{}", from));
        }
        if let Some(to) = to {
            query.push_str(&format!("&date=lte.{}", to));
        }
        query.push_str("&order=date.asc,time.asc");
        self.select(&query).await
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StorageError> {
        self.select(&format!("patient_id=eq.{}&order=date.asc,time.asc", patient_id))
            .await
    }

    async fn insert_within_capacity(
        &self,
        appointment: Appointment,
        claim: SlotClaim,
    ) -> Result<Appointment, StorageError> {
        self.check_capacity(&claim, None).await?;

        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                TABLE,
                None,
                Some(json!(appointment)),
                Some(return_representation()),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::Malformed("Insert returned no rows".to_string()))
    }

    async fn update_within_capacity(
        &self,
        appointment: Appointment,
        claim: SlotClaim,
    ) -> Result<Appointment, StorageError> {
        self.check_capacity(&claim, Some(appointment.id)).await?;
        self.patch(appointment).await
    }

    async fn update(&self, appointment: Appointment) -> Result<Appointment, StorageError> {
        self.patch(appointment).await
    }
}
