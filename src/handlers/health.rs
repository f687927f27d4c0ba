// handlers/health.rs - GET /v1/healthcheck handler

use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::state::AppState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn healthcheck(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "available",
        "system_info": {
            "environment": state.config.environment,
            "version": VERSION,
        }
    }))
}
