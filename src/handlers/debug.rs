// handlers/debug.rs - GET /debug/vars handler
//
// Runtime counters for operators. Not versioned and not gated.

use axum::{extract::State, response::Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::config::BUILD_TIME;
use crate::handlers::health::VERSION;
use crate::state::AppState;

pub async fn debug_vars(State(state): State<AppState>) -> Json<Value> {
    let mut vars = state.metrics.snapshot();

    vars["version"] = json!(VERSION);
    vars["build_time"] = json!(BUILD_TIME);
    vars["timestamp"] = json!(Utc::now().timestamp());
    vars["background_tasks"] = json!(state.tasks.len());
    vars["database"] = json!({
        "open_connections": state.pool.size(),
        "idle": state.pool.num_idle(),
        "max_open_connections": state.config.db.max_open_conns,
    });

    Json(vars)
}
