// handlers/tokens/password_reset.rs - POST /v1/tokens/password-reset handler

use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::database::models::user::validate_email;
use crate::database::models::TokenScope;
use crate::database::DatabaseError;
use crate::error::{ApiError, ApiResult};
use crate::handlers::tokens::activation::EmailRequest;
use crate::handlers::StrictJson;
use crate::mail::{self, Template};
use crate::state::AppState;
use crate::validator::Validator;

pub const PASSWORD_RESET_TOKEN_TTL: Duration = Duration::from_secs(45 * 60);

pub async fn token_password_reset(
    State(state): State<AppState>,
    StrictJson(input): StrictJson<EmailRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut v = Validator::new();
    validate_email(&mut v, &input.email);
    if !v.valid() {
        return Err(ApiError::failed_validation(v));
    }

    let user = match state.models.users.get_by_email(&input.email).await {
        Ok(user) => user,
        Err(DatabaseError::NotFound) => {
            v.add_error("email", "no matching email address found");
            return Err(ApiError::failed_validation(v));
        }
        Err(err) => return Err(err.into()),
    };

    if !user.activated {
        v.add_error("email", "user account must be activated");
        return Err(ApiError::failed_validation(v));
    }

    let token = state
        .models
        .tokens
        .new_token(user.id, PASSWORD_RESET_TOKEN_TTL, TokenScope::PasswordReset)
        .await?;

    let template = Template::TokenPasswordReset {
        password_reset_token: token.plaintext,
    };
    state.tasks.spawn(
        "token_password_reset_mail",
        mail::send_with_retry(state.mailer.clone(), user.email, template),
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "an email will be sent to you containing password reset instructions" })),
    ))
}
