pub mod auth;
pub mod authorize;
pub mod metrics;
pub mod rate_limit;

pub use auth::{authenticate, AuthError, CredentialLookup, Principal, PrincipalResolver};
pub use authorize::{require, AuthorizationChain, Gate, PermissionLookup, Requirement};
pub use metrics::{track_metrics, Metrics};
pub use rate_limit::{client_identity, rate_limit, ClientThrottle};
