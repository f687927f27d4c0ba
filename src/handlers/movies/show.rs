// handlers/movies/show.rs - GET /v1/movies/:id handler

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::handlers::read_id_param;
use crate::state::AppState;

pub async fn movie_show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = read_id_param(&id)?;
    let movie = state.models.movies.get(id).await?;
    Ok(Json(json!({ "movie": movie })))
}
