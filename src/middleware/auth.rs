use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::database::models::{TokenScope, User};
use crate::database::models::token::validate_token_plaintext;
use crate::database::{with_deadline, DatabaseError, QUERY_TIMEOUT};
use crate::error::ApiError;
use crate::validator::Validator;

/// Governance failures raised while identifying or authorizing a caller.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("malformed credential")]
    MalformedCredential,

    #[error("invalid or expired credential")]
    InvalidOrExpiredCredential,

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("account not activated")]
    AccountInactive,

    #[error("permission denied")]
    PermissionDenied,

    #[error("lookup failed: {0}")]
    LookupFailure(#[source] DatabaseError),
}

/// Who is making the request. Attached to every request that passes [`authenticate`].
#[derive(Debug, Clone)]
pub enum Principal {
    Anonymous,
    Authenticated(User),
}

impl Principal {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Principal::Anonymous => None,
            Principal::Authenticated(user) => Some(user),
        }
    }
}

/// Finds the owner of an unexpired token in `scope`. Unknown or expired
/// tokens are reported as [`DatabaseError::NotFound`].
#[async_trait]
pub trait CredentialLookup: Send + Sync {
    async fn user_for_token(&self, scope: TokenScope, plaintext: &str) -> Result<User, DatabaseError>;
}

/// Turns an `Authorization` header into a [`Principal`].
#[derive(Clone)]
pub struct PrincipalResolver {
    lookup: Arc<dyn CredentialLookup>,
    deadline: Duration,
}

impl PrincipalResolver {
    pub fn new(lookup: Arc<dyn CredentialLookup>) -> Self {
        Self::with_deadline(lookup, QUERY_TIMEOUT)
    }

    pub fn with_deadline(lookup: Arc<dyn CredentialLookup>, deadline: Duration) -> Self {
        Self { lookup, deadline }
    }

    pub async fn resolve(&self, header: Option<&str>) -> Result<Principal, AuthError> {
        let header = match header {
            None | Some("") => return Ok(Principal::Anonymous),
            Some(value) => value,
        };

        let parts: Vec<&str> = header.split(' ').collect();
        let token = match parts.as_slice() {
            ["Bearer", token] => *token,
            _ => return Err(AuthError::MalformedCredential),
        };

        let mut v = Validator::new();
        validate_token_plaintext(&mut v, token);
        if !v.valid() {
            return Err(AuthError::MalformedCredential);
        }

        let lookup = self.lookup.user_for_token(TokenScope::Authentication, token);
        match with_deadline(self.deadline, lookup).await {
            Ok(user) => Ok(Principal::Authenticated(user)),
            Err(DatabaseError::NotFound) => Err(AuthError::InvalidOrExpiredCredential),
            Err(err) => Err(AuthError::LookupFailure(err)),
        }
    }
}

/// Resolves the caller and stores the [`Principal`] in request extensions.
pub async fn authenticate(
    State(resolver): State<PrincipalResolver>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|value| value.to_str().map_err(|_| AuthError::MalformedCredential));

    let resolved = match header.transpose() {
        Ok(header) => resolver.resolve(header).await,
        Err(err) => Err(err),
    };

    let mut response = match resolved {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => {
            if !matches!(err, AuthError::LookupFailure(_)) {
                tracing::debug!(error = %err, "rejected credential");
            }
            ApiError::from(err).into_response()
        }
    };

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}
