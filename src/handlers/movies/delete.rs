// handlers/movies/delete.rs - DELETE /v1/movies/:id handler

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::handlers::read_id_param;
use crate::state::AppState;

pub async fn movie_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = read_id_param(&id)?;
    state.models.movies.delete(id).await?;
    Ok(Json(json!({ "message": "movie successfully deleted" })))
}
