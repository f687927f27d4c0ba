// handlers/mod.rs - HTTP handlers grouped by resource
//
// Public:    /v1/healthcheck, /v1/users/*, /v1/tokens/*, /debug/vars
// Gated:     /v1/movies/* (movies:read / movies:write, see routes.rs)

pub mod debug;
pub mod health;
pub mod json;
pub mod movies;
pub mod tokens;
pub mod users;

use std::collections::HashMap;

use crate::error::ApiError;
use crate::validator::Validator;

pub use json::StrictJson;

/// Parses the `:id` path segment. Anything that is not a positive integer is a 404.
pub fn read_id_param(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(ApiError::NotFound),
    }
}

pub fn read_string(qs: &HashMap<String, String>, key: &str, default: &str) -> String {
    match qs.get(key) {
        Some(value) if !value.is_empty() => value.clone(),
        _ => default.to_string(),
    }
}

pub fn read_csv(qs: &HashMap<String, String>, key: &str) -> Vec<String> {
    match qs.get(key) {
        Some(value) if !value.is_empty() => value.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

/// Reads an integer query value, recording a validation error when it does not parse.
pub fn read_int(qs: &HashMap<String, String>, key: &str, default: i64, v: &mut Validator) -> i64 {
    match qs.get(key) {
        Some(value) if !value.is_empty() => value.parse().unwrap_or_else(|_| {
            v.add_error(key, "must be an integer value");
            default
        }),
        _ => default,
    }
}
