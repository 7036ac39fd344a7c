use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use security_cell::AuthorizationGuard;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::identity::canonical_id;
use shared_utils::extractor::caller_from;

use crate::models::{PatchDayRequest, UpdateTemplateRequest};
use crate::state::ScheduleState;

fn parse_clinician_id(raw: &str) -> Result<Uuid, AppError> {
    canonical_id(raw).ok_or_else(|| AppError::BadRequest("Invalid clinician ID format".to_string()))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::ValidationError(rejection.body_text()))
}

#[axum::debug_handler]
pub async fn get_template(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Path(clinician_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;
    let clinician_id = parse_clinician_id(&clinician_id)?;

    if !AuthorizationGuard::can_read_template(&caller, clinician_id) {
        return Err(AppError::Forbidden("Not allowed to view this schedule".to_string()));
    }

    let template = state.templates.get_or_create(clinician_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": template
    })))
}

#[axum::debug_handler]
pub async fn put_template(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Path(clinician_id): Path<String>,
    payload: Result<Json<UpdateTemplateRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;
    let clinician_id = parse_clinician_id(&clinician_id)?;

    if !AuthorizationGuard::can_write_template(&caller, clinician_id) {
        return Err(AppError::Forbidden("Only the clinician or an admin can change this schedule".to_string()));
    }

    let request = body(payload)?;
    let template = state.templates.put(clinician_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": template
    })))
}

#[axum::debug_handler]
pub async fn patch_day(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Path((clinician_id, day)): Path<(String, String)>,
    payload: Result<Json<PatchDayRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from(&user)?;
    let clinician_id = parse_clinician_id(&clinician_id)?;

    if !AuthorizationGuard::can_write_template(&caller, clinician_id) {
        return Err(AppError::Forbidden("Only the clinician or an admin can change this schedule".to_string()));
    }

    let request = body(payload)?;
    let template = state.templates.patch_day(clinician_id, &day, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": template
    })))
}
