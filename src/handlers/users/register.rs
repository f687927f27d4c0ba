// handlers/users/register.rs - POST /v1/users handler

use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::database::models::{Password, TokenScope, User, MOVIES_READ};
use crate::database::models::user::validate_user;
use crate::error::{ApiError, ApiResult};
use crate::handlers::StrictJson;
use crate::mail::{self, Template};
use crate::state::AppState;
use crate::validator::Validator;

pub const ACTIVATION_TOKEN_TTL: Duration = Duration::from_secs(3 * 24 * 60 * 60);

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterUserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/**
 * POST /v1/users - Register a new, not yet activated, account
 *
 * New accounts receive `movies:read` and an activation token. The welcome
 * mail carrying the token is sent in the background; the response (202)
 * does not wait for it.
 */
pub async fn user_register(
    State(state): State<AppState>,
    StrictJson(input): StrictJson<RegisterUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut password = Password::default();
    password.set(&input.password).await?;

    let mut user = User {
        id: 0,
        created_at: Utc::now(),
        name: input.name,
        email: input.email,
        password,
        activated: false,
        version: 0,
    };

    let mut v = Validator::new();
    validate_user(&mut v, &user);
    if !v.valid() {
        return Err(ApiError::failed_validation(v));
    }

    state.models.users.insert(&mut user).await?;
    state.models.permissions.add_for_user(user.id, &[MOVIES_READ]).await?;

    let token = state
        .models
        .tokens
        .new_token(user.id, ACTIVATION_TOKEN_TTL, TokenScope::Activation)
        .await?;

    let template = Template::UserWelcome {
        user_id: user.id,
        activation_token: token.plaintext,
    };
    state.tasks.spawn(
        "user_welcome_mail",
        mail::send_with_retry(state.mailer.clone(), user.email.clone(), template),
    );

    Ok((StatusCode::ACCEPTED, Json(json!({ "user": user }))))
}
