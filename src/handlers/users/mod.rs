// handlers/users/mod.rs - account lifecycle handlers

pub mod activate; // PUT  /v1/users/activated
pub mod password; // PUT  /v1/users/password
pub mod register; // POST /v1/users

pub use activate::user_activate;
pub use password::user_password_reset;
pub use register::user_register;
