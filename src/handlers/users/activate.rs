// handlers/users/activate.rs - PUT /v1/users/activated handler

use axum::{extract::State, response::Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::token::validate_token_plaintext;
use crate::database::models::TokenScope;
use crate::database::{with_deadline, DatabaseError, QUERY_TIMEOUT};
use crate::error::{ApiError, ApiResult};
use crate::handlers::StrictJson;
use crate::state::AppState;
use crate::validator::Validator;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivateUserRequest {
    #[serde(default)]
    pub token: String,
}

pub async fn user_activate(
    State(state): State<AppState>,
    StrictJson(input): StrictJson<ActivateUserRequest>,
) -> ApiResult<Json<Value>> {
    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &input.token);
    if !v.valid() {
        return Err(ApiError::failed_validation(v));
    }

    let lookup = state.models.users.get_for_token(TokenScope::Activation, &input.token);
    let mut user = match with_deadline(QUERY_TIMEOUT, lookup).await {
        Ok(user) => user,
        Err(DatabaseError::NotFound) => {
            v.add_error("token", "invalid or expired activation token");
            return Err(ApiError::failed_validation(v));
        }
        Err(err) => return Err(err.into()),
    };

    user.activated = true;
    state.models.guard.update(&state.models.users, &mut user).await?;

    state
        .models
        .tokens
        .delete_all_for_user(TokenScope::Activation, user.id)
        .await?;

    Ok(Json(json!({ "user": user })))
}
