// handlers/tokens/mod.rs - token issuing handlers

pub mod activation;     // POST /v1/tokens/activation
pub mod authentication; // POST /v1/tokens/authentication
pub mod password_reset; // POST /v1/tokens/password-reset

pub use activation::token_activation;
pub use authentication::token_authentication;
pub use password_reset::token_password_reset;
