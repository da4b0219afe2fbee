use crate::handlers::{self, AppState};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Builds the HTTP surface. Rate limiting is layered on by the binary.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Routes that act on the session's open lead view
    let view_routes = Router::new()
        .route("/api/v1/leads/:lead_id/view", post(handlers::open_view))
        .route("/api/v1/view", get(handlers::get_view))
        .route("/api/v1/view/services", get(handlers::get_services))
        .route(
            "/api/v1/view/validation/retry",
            post(handlers::retry_validation),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::require_session,
        ));

    let api_routes = Router::new()
        .route("/api/v1/sessions", post(handlers::create_session))
        .merge(view_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::require_api_key,
        ))
        .layer(
            ServiceBuilder::new()
                // Navigation payloads are small; 1MB is plenty
                .layer(RequestBodyLimitLayer::new(1024 * 1024)),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
