// handlers/tokens/activation.rs - POST /v1/tokens/activation handler

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;

use crate::database::models::user::validate_email;
use crate::database::models::TokenScope;
use crate::database::DatabaseError;
use crate::error::{ApiError, ApiResult};
use crate::handlers::users::register::ACTIVATION_TOKEN_TTL;
use crate::handlers::StrictJson;
use crate::mail::{self, Template};
use crate::state::AppState;
use crate::validator::Validator;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: String,
}

/// Re-sends an activation token to an account that is not yet activated.
pub async fn token_activation(
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

    if user.activated {
        v.add_error("email", "user has already been activated");
        return Err(ApiError::failed_validation(v));
    }

    let token = state
        .models
        .tokens
        .new_token(user.id, ACTIVATION_TOKEN_TTL, TokenScope::Activation)
        .await?;

    let template = Template::TokenActivation {
        activation_token: token.plaintext,
    };
    state.tasks.spawn(
        "token_activation_mail",
        mail::send_with_retry(state.mailer.clone(), user.email, template),
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "an email will be sent to you containing activation instructions" })),
    ))
}
