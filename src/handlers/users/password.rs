// handlers/users/password.rs - PUT /v1/users/password handler

use axum::{extract::State, response::Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::token::validate_token_plaintext;
use crate::database::models::user::validate_password_plaintext;
use crate::database::models::TokenScope;
use crate::database::{with_deadline, DatabaseError, QUERY_TIMEOUT};
use crate::error::{ApiError, ApiResult};
use crate::handlers::StrictJson;
use crate::state::AppState;
use crate::validator::Validator;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub token: String,
}

/// Sets a new password using a password-reset token, then revokes every reset token of the user.
pub async fn user_password_reset(
    State(state): State<AppState>,
    StrictJson(input): StrictJson<ResetPasswordRequest>,
) -> ApiResult<Json<Value>> {
    let mut v = Validator::new();
    validate_password_plaintext(&mut v, &input.password);
    validate_token_plaintext(&mut v, &input.token);
    if !v.valid() {
        return Err(ApiError::failed_validation(v));
    }

    let lookup = state.models.users.get_for_token(TokenScope::PasswordReset, &input.token);
    let mut user = match with_deadline(QUERY_TIMEOUT, lookup).await {
        Ok(user) => user,
        Err(DatabaseError::NotFound) => {
            v.add_error("token", "invalid or expired password reset token");
            return Err(ApiError::failed_validation(v));
        }
        Err(err) => return Err(err.into()),
    };

    user.password.set(&input.password).await?;
    state.models.guard.update(&state.models.users, &mut user).await?;

    state
        .models
        .tokens
        .delete_all_for_user(TokenScope::PasswordReset, user.id)
        .await?;

    Ok(Json(json!({ "message": "your password was successfully reset" })))
}
