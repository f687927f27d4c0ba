// handlers/movies/update.rs - PATCH /v1/movies/:id handler

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::{Movie, Runtime};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{read_id_param, StrictJson};
use crate::state::AppState;
use crate::validator::Validator;

/// Partial update. Absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMovieRequest {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<Runtime>,
    pub genres: Option<Vec<String>>,
}

impl UpdateMovieRequest {
    pub fn apply(self, movie: &mut Movie) {
        if let Some(title) = self.title {
            movie.title = title;
        }
        if let Some(year) = self.year {
            movie.year = year;
        }
        if let Some(runtime) = self.runtime {
            movie.runtime = runtime;
        }
        if let Some(genres) = self.genres {
            movie.genres = genres;
        }
    }
}

/**
 * PATCH /v1/movies/:id - Partially update a movie
 *
 * The movie is read first so a missing id is a 404. The write itself is
 * conditional on the version that read returned; if another writer got
 * there first the client receives 409 and should re-read and retry.
 */
pub async fn movie_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    StrictJson(input): StrictJson<UpdateMovieRequest>,
) -> ApiResult<Json<Value>> {
    let id = read_id_param(&id)?;
    let mut movie = state.models.movies.get(id).await?;

    input.apply(&mut movie);

    let mut v = Validator::new();
    movie.validate(&mut v);
    if !v.valid() {
        return Err(ApiError::failed_validation(v));
    }

    state
        .models
        .guard
        .update(&state.models.movies, &mut movie)
        .await?;

    Ok(Json(json!({ "movie": movie })))
}
