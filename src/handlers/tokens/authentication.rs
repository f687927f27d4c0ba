// handlers/tokens/authentication.rs - POST /v1/tokens/authentication handler

use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;

use crate::database::models::user::{validate_email, validate_password_plaintext};
use crate::database::models::TokenScope;
use crate::database::DatabaseError;
use crate::error::{ApiError, ApiResult};
use crate::handlers::StrictJson;
use crate::state::AppState;
use crate::validator::Validator;

pub const AUTHENTICATION_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/**
 * POST /v1/tokens/authentication - Exchange email and password for a bearer token
 *
 * Unknown email and wrong password both answer 401 with the same message.
 * The token is valid for 24 hours and goes in `Authorization: Bearer <token>`.
 */
pub async fn token_authentication(
    State(state): State<AppState>,
    StrictJson(input): StrictJson<CredentialsRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut v = Validator::new();
    validate_email(&mut v, &input.email);
    validate_password_plaintext(&mut v, &input.password);
    if !v.valid() {
        return Err(ApiError::failed_validation(v));
    }

    let user = match state.models.users.get_by_email(&input.email).await {
        Ok(user) => user,
        Err(DatabaseError::NotFound) => return Err(ApiError::InvalidCredentials),
        Err(err) => return Err(err.into()),
    };

    if !user.password.matches(&input.password).await? {
        return Err(ApiError::InvalidCredentials);
    }

    let token = state
        .models
        .tokens
        .new_token(user.id, AUTHENTICATION_TOKEN_TTL, TokenScope::Authentication)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "authentication_token": token })),
    ))
}
