// HTTP API Error Types
use std::collections::BTreeMap;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::database::models::PasswordError;
use crate::database::DatabaseError;
use crate::middleware::auth::AuthError;
use crate::validator::Validator;

/// Every client facing failure. Rendered as `{"error": <message or field map>}`.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    InvalidCredentials,
    InvalidAuthenticationToken,
    AuthenticationRequired,

    // 403 Forbidden
    InactiveAccount,
    NotPermitted,

    // 404 Not Found
    NotFound,

    // 405 Method Not Allowed
    MethodNotAllowed(Method),

    // 409 Conflict
    EditConflict,

    // 422 Unprocessable Entity
    FailedValidation(BTreeMap<String, String>),

    // 429 Too Many Requests
    RateLimitExceeded,

    // 500 Internal Server Error
    ServerError(anyhow::Error),

    // 503 Service Unavailable
    ShuttingDown,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials
            | ApiError::InvalidAuthenticationToken
            | ApiError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ApiError::InactiveAccount | ApiError::NotPermitted => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::EditConflict => StatusCode::CONFLICT,
            ApiError::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Client safe message. Internal causes never leave the process.
    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::InvalidCredentials => "invalid authentication credentials".into(),
            ApiError::InvalidAuthenticationToken => "invalid or missing authentication token".into(),
            ApiError::AuthenticationRequired => {
                "you must be authenticated to access this resource".into()
            }
            ApiError::InactiveAccount => {
                "your user account must be activated to access this resource".into()
            }
            ApiError::NotPermitted => {
                "your user account doesn't have the necessary permissions to access this resource"
                    .into()
            }
            ApiError::NotFound => "the requested resource could not be found".into(),
            ApiError::MethodNotAllowed(method) => {
                format!("the {} method is not supported for this resource", method)
            }
            ApiError::EditConflict => {
                "unable to update the record due to an edit conflict, please try again".into()
            }
            ApiError::FailedValidation(_) => "failed validation".into(),
            ApiError::RateLimitExceeded => "rate limit exceeded".into(),
            ApiError::ServerError(_) => {
                "the server encountered a problem and could not process your request".into()
            }
            ApiError::ShuttingDown => "the server is shutting down".into(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ApiError::FailedValidation(errors) => json!({ "error": errors }),
            _ => json!({ "error": self.message() }),
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn failed_validation(v: Validator) -> Self {
        ApiError::FailedValidation(v.errors)
    }

    pub fn server_error(err: impl Into<anyhow::Error>) -> Self {
        ApiError::ServerError(err.into())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound => ApiError::NotFound,
            DatabaseError::EditConflict => ApiError::EditConflict,
            DatabaseError::DuplicateEmail => {
                let mut v = Validator::new();
                v.add_error("email", "a user with this email address already exists");
                ApiError::failed_validation(v)
            }
            other => ApiError::ServerError(other.into()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MalformedCredential | AuthError::InvalidOrExpiredCredential => {
                ApiError::InvalidAuthenticationToken
            }
            AuthError::AuthenticationRequired => ApiError::AuthenticationRequired,
            AuthError::AccountInactive => ApiError::InactiveAccount,
            AuthError::PermissionDenied => ApiError::NotPermitted,
            AuthError::LookupFailure(cause) => ApiError::ServerError(cause.into()),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::ServerError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // The request span carries method and url.
        if let ApiError::ServerError(cause) = &self {
            tracing::error!(error = %format!("{:#}", cause), "server error");
        }

        let status = self.status_code();
        let mut response = (status, Json(self.to_json())).into_response();

        if matches!(self, ApiError::InvalidAuthenticationToken) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        if matches!(self, ApiError::ShuttingDown) {
            response
                .headers_mut()
                .insert(header::CONNECTION, HeaderValue::from_static("close"));
        }

        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(ApiError::RateLimitExceeded.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::InvalidAuthenticationToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::AuthenticationRequired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InactiveAccount.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotPermitted.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::EditConflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(ApiError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::ShuttingDown.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn storage_errors_map_to_http() {
        assert!(matches!(ApiError::from(DatabaseError::NotFound), ApiError::NotFound));
        assert!(matches!(ApiError::from(DatabaseError::EditConflict), ApiError::EditConflict));
        assert!(matches!(
            ApiError::from(DatabaseError::Timeout(std::time::Duration::from_secs(3))),
            ApiError::ServerError(_)
        ));
        match ApiError::from(DatabaseError::DuplicateEmail) {
            ApiError::FailedValidation(errors) => {
                assert_eq!(errors["email"], "a user with this email address already exists")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn auth_errors_map_to_http() {
        assert!(matches!(
            ApiError::from(AuthError::MalformedCredential),
            ApiError::InvalidAuthenticationToken
        ));
        assert!(matches!(
            ApiError::from(AuthError::LookupFailure(DatabaseError::Timeout(
                std::time::Duration::from_secs(3)
            ))),
            ApiError::ServerError(_)
        ));
    }

    #[tokio::test]
    async fn invalid_token_sets_www_authenticate() {
        let response = ApiError::InvalidAuthenticationToken.into_response();
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid or missing authentication token");
    }

    #[tokio::test]
    async fn server_error_hides_cause() {
        let response = ApiError::server_error(anyhow::anyhow!("connection reset")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(
            body["error"],
            "the server encountered a problem and could not process your request"
        );
    }

    #[tokio::test]
    async fn validation_errors_render_as_field_map() {
        let mut v = Validator::new();
        v.add_error("title", "must be provided");
        let body = body_json(ApiError::failed_validation(v).into_response()).await;
        assert_eq!(body["error"]["title"], "must be provided");
    }
}
