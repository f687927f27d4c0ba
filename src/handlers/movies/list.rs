// handlers/movies/list.rs - GET /v1/movies handler

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde_json::{json, Value};

use crate::database::models::MOVIE_SORT_SAFELIST;
use crate::error::{ApiError, ApiResult};
use crate::filter::Filters;
use crate::handlers::{read_csv, read_int, read_string};
use crate::state::AppState;
use crate::validator::Validator;

/**
 * GET /v1/movies - Search and page through the catalog
 *
 * Query parameters:
 * - `title`: full text match on the title
 * - `genres`: comma separated, every genre must be present
 * - `page`, `page_size`: 1-based paging, defaults 1 and 20
 * - `sort`: one of id, title, year, runtime, optionally prefixed with `-`
 */
pub async fn movie_list(
    State(state): State<AppState>,
    Query(qs): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let mut v = Validator::new();

    let title = read_string(&qs, "title", "");
    let genres = read_csv(&qs, "genres");
    let filters = Filters {
        page: read_int(&qs, "page", 1, &mut v),
        page_size: read_int(&qs, "page_size", 20, &mut v),
        sort: read_string(&qs, "sort", "id"),
        sort_safelist: MOVIE_SORT_SAFELIST,
    };

    filters.validate(&mut v);
    if !v.valid() {
        return Err(ApiError::failed_validation(v));
    }

    let (movies, metadata) = state.models.movies.get_all(&title, &genres, &filters).await?;
    Ok(Json(json!({ "movies": movies, "metadata": metadata })))
}
