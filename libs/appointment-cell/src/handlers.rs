use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::identity::canonical_id;
use shared_utils::extractor::caller_from;

use crate::models::{
    BookAppointmentRequest, DateRangeQuery, RescheduleAppointmentRequest, SetStatusRequest, UpdateNotesRequest,
};
use crate::state::AppointmentState;

fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    canonical_id(raw).ok_or_else(|| AppError::BadRequest(format!("Invalid {} ID format", what)))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::ValidationError(rejection.body_text()))
}

fn ok(data: impl serde::Serialize) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": data
    }))
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path((clinician_id, date)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    caller_from(&user)?;
    let clinician_id = parse_id(&clinician_id, "clinician")?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| AppError::ValidationError("Date must be formatted YYYY-MM-DD".to_string()))?;

    let slots = state.availability.available_slots(clinician_id, date).await?;
    Ok(ok(slots))
}

// ==============================================================================
// BOOKING AND LIFECYCLE
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    payload: Result<Json<BookAppointmentRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;
    let request = body(payload)?;

    let appointment = state.scheduler.book(&caller, request).await?;
    Ok(ok(appointment))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;
    let appointment_id = parse_id(&appointment_id, "appointment")?;

    let appointment = state.scheduler.get(&caller, appointment_id).await?;
    Ok(ok(appointment))
}

/// Patients go through the patient reschedule, everyone else the clinician one.
#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    payload: Result<Json<RescheduleAppointmentRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;
    let appointment_id = parse_id(&appointment_id, "appointment")?;
    let request = body(payload)?;

    let appointment = if caller.is_patient() {
        state.scheduler.patient_reschedule(&caller, appointment_id, request).await?
    } else {
        state.scheduler.clinician_reschedule(&caller, appointment_id, request).await?
    };
    Ok(ok(appointment))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;
    let appointment_id = parse_id(&appointment_id, "appointment")?;

    let appointment = state.scheduler.cancel(&caller, appointment_id).await?;
    Ok(ok(appointment))
}

#[axum::debug_handler]
pub async fn set_appointment_status(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    payload: Result<Json<SetStatusRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;
    let appointment_id = parse_id(&appointment_id, "appointment")?;
    let request = body(payload)?;

    let appointment = state.scheduler.set_status(&caller, appointment_id, request.status).await?;
    Ok(ok(appointment))
}

#[axum::debug_handler]
pub async fn start_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;
    let appointment_id = parse_id(&appointment_id, "appointment")?;

    let appointment = state.scheduler.start(&caller, appointment_id).await?;
    Ok(ok(appointment))
}

#[axum::debug_handler]
pub async fn update_notes(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    payload: Result<Json<UpdateNotesRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;
    let appointment_id = parse_id(&appointment_id, "appointment")?;
    let request = body(payload)?;

    let appointment = state.scheduler.update_notes(&caller, appointment_id, request.notes).await?;
    Ok(ok(appointment))
}

// ==============================================================================
// LISTINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_clinician_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(clinician_id): Path<String>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;
    let clinician_id = parse_id(&clinician_id, "clinician")?;

    let appointments = state
        .scheduler
        .list_for_clinician(&caller, clinician_id, range.from, range.to)
        .await?;
    Ok(ok(appointments))
}

#[axum::debug_handler]
pub async fn list_patient_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;
    let patient_id = parse_id(&patient_id, "patient")?;

    let appointments = state.scheduler.list_for_patient(&caller, patient_id).await?;
    Ok(ok(appointments))
}
