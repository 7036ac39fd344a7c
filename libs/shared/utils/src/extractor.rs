use std::sync::Arc;

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
};
use http::header::AUTHORIZATION;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::identity::Caller;
use shared_config::AppConfig;

use crate::jwt::validate_token;

/// Validates the bearer token and stores the decoded `User` in request extensions.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_value = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Typed identity for the authenticated user; fails closed on malformed ids or roles.
pub fn caller_from(user: &User) -> Result<Caller, AppError> {
    Caller::try_from(user)
}
