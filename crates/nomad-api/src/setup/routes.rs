//! Route configuration and setup

use crate::auth::{auth_middleware, require_trip_membership, AuthState};
use crate::constants::API_PREFIX;
use crate::handlers::{health, poll_images, wallet_documents, wallet_files, wallet_upload};
use crate::middleware::{
    request_id_middleware, security_headers_middleware, RequestId, SecurityHeadersConfig,
};
use crate::state::AppState;
use crate::upload::gate::body_limit;
use axum::{
    extract::Request,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use nomad_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub async fn setup_routes(
    config: &Config,
    state: Arc<AppState>,
) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;
    let auth_state = Arc::new(AuthState::new(config.jwt_secret()));

    let protected_routes = protected_routes(state.clone()).layer(
        axum::middleware::from_fn_with_state(auth_state, auth_middleware),
    );
    let app_state_routes = public_routes().merge(protected_routes);

    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0.as_str())
            .unwrap_or("-");
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    });

    let security_headers_config = Arc::new(SecurityHeadersConfig::new(config.is_production()));

    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10_000)
        .max(1);
    tracing::info!(http_concurrency_limit, "HTTP concurrency limit layer enabled");

    let app = app_state_routes
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(cors)
        .layer(trace_layer)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn_with_state(
            security_headers_config,
            security_headers_middleware,
        ))
        .with_state(state);

    Ok(app)
}

/// Routes reachable without a bearer token
fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health))
        .route(
            &format!("{}/wallet/files/{{token}}", API_PREFIX),
            get(wallet_files::serve_file),
        )
}

/// Upload and document routes. Trip-scoped routes also require membership,
/// checked before the body is read.
fn protected_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let uploads = &state.uploads;

    let trip_routes = Router::new()
        .route(
            &format!("{}/trips/{{id}}/poll-images", API_PREFIX),
            post(poll_images::upload_poll_image).layer(body_limit(&uploads.poll_images)),
        )
        .route(
            &format!("{}/trips/{{id}}/wallet/documents", API_PREFIX),
            post(wallet_upload::upload_group_document)
                .get(wallet_documents::list_group_documents)
                .layer(body_limit(&uploads.wallet)),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_trip_membership,
        ));

    let wallet_routes = Router::new()
        .route(
            &format!("{}/wallet/documents", API_PREFIX),
            post(wallet_upload::upload_personal_document)
                .get(wallet_documents::list_personal_documents)
                .layer(body_limit(&uploads.wallet)),
        )
        .route(
            &format!("{}/wallet/documents/{{doc_id}}", API_PREFIX),
            get(wallet_documents::get_document).delete(wallet_documents::delete_document),
        );

    trip_routes.merge(wallet_routes)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}
