//! Route gates evaluated after [`super::auth::authenticate`].
//!
//! A [`Requirement`] expands into the ordered single-level requirements it
//! implies. They run one after another and the first failure ends the request, so the
//! permission lookup only ever happens for an activated user.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::auth::{AuthError, Principal};
use crate::database::models::Permissions;
use crate::database::{with_deadline, DatabaseError, QUERY_TIMEOUT};
use crate::error::ApiError;

#[async_trait]
pub trait PermissionLookup: Send + Sync {
    async fn permissions_for_user(&self, user_id: i64) -> Result<Permissions, DatabaseError>;
}

/// What a route demands of its caller. Each level implies the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Authenticated,
    Activated,
    Permission(&'static str),
}

impl Requirement {
    /// The single-level checks this requirement expands to, in evaluation order.
    pub fn stages(self) -> Vec<Requirement> {
        let levels = [Requirement::Authenticated, Requirement::Activated, self];
        let depth = match self {
            Requirement::Authenticated => 1,
            Requirement::Activated => 2,
            Requirement::Permission(_) => 3,
        };
        levels[..depth].to_vec()
    }
}

#[derive(Clone)]
pub struct AuthorizationChain {
    permissions: Arc<dyn PermissionLookup>,
    deadline: Duration,
}

impl AuthorizationChain {
    pub fn new(permissions: Arc<dyn PermissionLookup>) -> Self {
        Self {
            permissions,
            deadline: QUERY_TIMEOUT,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub async fn check(&self, principal: &Principal, requirement: Requirement) -> Result<(), AuthError> {
        for stage in requirement.stages() {
            self.run_stage(principal, stage).await?;
        }
        Ok(())
    }

    async fn run_stage(&self, principal: &Principal, stage: Requirement) -> Result<(), AuthError> {
        let user = principal.user().ok_or(AuthError::AuthenticationRequired)?;

        match stage {
            Requirement::Authenticated => Ok(()),
            Requirement::Activated if user.activated => Ok(()),
            Requirement::Activated => Err(AuthError::AccountInactive),
            Requirement::Permission(code) => {
                let lookup = self.permissions.permissions_for_user(user.id);
                let permissions = with_deadline(self.deadline, lookup)
                    .await
                    .map_err(AuthError::LookupFailure)?;

                if permissions.include(code) {
                    Ok(())
                } else {
                    Err(AuthError::PermissionDenied)
                }
            }
        }
    }

    pub fn gate(&self, requirement: Requirement) -> Gate {
        Gate {
            chain: self.clone(),
            requirement,
        }
    }
}

/// A chain bound to one requirement, used as route middleware state.
#[derive(Clone)]
pub struct Gate {
    chain: AuthorizationChain,
    requirement: Requirement,
}

pub async fn require(State(gate): State<Gate>, request: Request, next: Next) -> Response {
    let anonymous = Principal::Anonymous;
    let principal = request.extensions().get::<Principal>().unwrap_or(&anonymous);

    if let Err(err) = gate.chain.check(principal, gate.requirement).await {
        return ApiError::from(err).into_response();
    }

    next.run(request).await
}
