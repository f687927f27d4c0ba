// handlers/json.rs - strict JSON request body extractor

use axum::{
    async_trait,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use serde_json::error::Category;

use crate::error::ApiError;

pub const MAX_BODY_BYTES: usize = 1_048_576;

/// Like `axum::Json` but with the API's rules: at most 1 MiB, exactly one
/// JSON value, and client readable messages for every failure. Unknown keys
/// are rejected by `#[serde(deny_unknown_fields)]` on the input type.
#[derive(Debug)]
pub struct StrictJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for StrictJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let bytes = axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|_| {
                ApiError::bad_request(format!("body must not be larger than {} bytes", MAX_BODY_BYTES))
            })?;

        decode(&bytes).map(StrictJson)
    }
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::bad_request("body must not be empty"));
    }

    let mut de = serde_json::Deserializer::from_slice(bytes);
    let value = T::deserialize(&mut de).map_err(describe)?;

    de.end()
        .map_err(|_| ApiError::bad_request("body must only contain a single JSON value"))?;

    Ok(value)
}

fn describe(err: serde_json::Error) -> ApiError {
    let message = match err.classify() {
        Category::Eof => "body contains badly-formed JSON".to_string(),
        Category::Syntax => format!(
            "body contains badly-formed JSON (at line {}, column {})",
            err.line(),
            err.column()
        ),
        Category::Data => describe_data_error(&err),
        Category::Io => err.to_string(),
    };
    ApiError::bad_request(message)
}

fn describe_data_error(err: &serde_json::Error) -> String {
    // serde_json appends " at line L column C" to data errors
    let full = err.to_string();
    let text = full
        .rsplit_once(" at line ")
        .map(|(head, _)| head)
        .unwrap_or(&full);

    if let Some(rest) = text.strip_prefix("unknown field `") {
        let field = rest.split('`').next().unwrap_or_default();
        return format!("body contains unknown key \"{}\"", field);
    }

    if text.starts_with("invalid type") {
        return format!(
            "body contains incorrect JSON type (at line {}, column {})",
            err.line(),
            err.column()
        );
    }

    text.to_string()
}
