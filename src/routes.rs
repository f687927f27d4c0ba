use std::any::Any;

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put, MethodRouter},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;
use uuid::Uuid;

use crate::database::models::{MOVIES_READ, MOVIES_WRITE};
use crate::error::ApiError;
use crate::handlers::{debug, health, movies, tokens, users};
use crate::middleware::auth::authenticate;
use crate::middleware::authorize::{require, AuthorizationChain, Requirement};
use crate::middleware::metrics::track_metrics;
use crate::middleware::rate_limit::rate_limit;
use crate::state::{AppState, Governance};

/// Builds the full application. Layers, outermost first: request span,
/// metrics, panic recovery, CORS, rate limit, authentication, router.
pub fn app(state: AppState, governance: Governance) -> Router {
    Router::new()
        .route("/v1/healthcheck", get(health::healthcheck).fallback(method_not_allowed))
        .merge(movie_routes(&governance.chain))
        .merge(user_routes())
        .merge(token_routes())
        .route("/debug/vars", get(debug::debug_vars).fallback(method_not_allowed))
        .fallback(not_found)
        .layer(from_fn_with_state(governance.resolver.clone(), authenticate))
        .layer(from_fn_with_state(governance.throttle.clone(), rate_limit))
        .layer(cors(&state.config.cors_trusted_origins))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(from_fn_with_state(state.metrics.clone(), track_metrics))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                request_id = %Uuid::new_v4(),
                request_method = %request.method(),
                request_url = %request.uri(),
            )
        }))
        .with_state(state)
}

fn movie_routes(chain: &AuthorizationChain) -> Router<AppState> {
    let read = || from_fn_with_state(chain.gate(Requirement::Permission(MOVIES_READ)), require);
    let write = || from_fn_with_state(chain.gate(Requirement::Permission(MOVIES_WRITE)), require);

    let collection: MethodRouter<AppState> = get(movies::movie_list)
        .route_layer(read())
        .merge(post(movies::movie_create).route_layer(write()))
        .fallback(method_not_allowed);

    let member: MethodRouter<AppState> = get(movies::movie_show)
        .route_layer(read())
        .merge(
            patch(movies::movie_update)
                .delete(movies::movie_delete)
                .route_layer(write()),
        )
        .fallback(method_not_allowed);

    Router::new()
        .route("/v1/movies", collection)
        .route("/v1/movies/:id", member)
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/users", post(users::user_register).fallback(method_not_allowed))
        .route(
            "/v1/users/activated",
            put(users::user_activate).fallback(method_not_allowed),
        )
        .route(
            "/v1/users/password",
            put(users::user_password_reset).fallback(method_not_allowed),
        )
}

fn token_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/tokens/authentication",
            post(tokens::token_authentication).fallback(method_not_allowed),
        )
        .route(
            "/v1/tokens/activation",
            post(tokens::token_activation).fallback(method_not_allowed),
        )
        .route(
            "/v1/tokens/password-reset",
            post(tokens::token_password_reset).fallback(method_not_allowed),
        )
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());

    let mut response = ApiError::server_error(anyhow::anyhow!("handler panicked: {}", detail)).into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

fn cors(trusted_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = trusted_origins
        .iter()
        .filter(|o| !o.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring unparsable trusted origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::OPTIONS, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panic_response_closes_connection() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONNECTION], "close");
    }
}
