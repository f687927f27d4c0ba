// handlers/movies/create.rs - POST /v1/movies handler

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;

use crate::database::models::{Movie, Runtime};
use crate::error::{ApiError, ApiResult};
use crate::handlers::StrictJson;
use crate::state::AppState;
use crate::validator::Validator;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMovieRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub runtime: Runtime,
    #[serde(default)]
    pub genres: Vec<String>,
}

/**
 * POST /v1/movies - Add a movie to the catalog
 *
 * Responds 201 with the stored movie and a `Location` header pointing at it.
 * Missing fields are reported by validation (422), not by the JSON reader.
 */
pub async fn movie_create(
    State(state): State<AppState>,
    StrictJson(input): StrictJson<CreateMovieRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut movie = Movie::new(input.title, input.year, input.runtime, input.genres);

    let mut v = Validator::new();
    movie.validate(&mut v);
    if !v.valid() {
        return Err(ApiError::failed_validation(v));
    }

    state.models.movies.insert(&mut movie).await?;

    let location = format!("/v1/movies/{}", movie.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(json!({ "movie": movie })),
    ))
}
