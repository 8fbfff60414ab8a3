//! Router construction for the claims server.

use std::sync::Arc;

use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Extension, Router,
};
use claims_core::ClaimStore;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers;
use crate::middleware::jwt::{jwt_auth, JwtConfig};

/// Build the full axum router with all routes and middleware.
pub fn build_router(store: Arc<dyn ClaimStore>, jwt_config: JwtConfig) -> Router {
    // Routes that require an authenticated actor
    let protected = Router::new()
        .route("/claim/:id/flag/", post(handlers::mutations::flag_claim))
        .route("/claim/:id/note/", post(handlers::mutations::add_note))
        .route(
            "/admin-dashboard/",
            get(handlers::dashboard::admin_dashboard),
        )
        .layer(axum_mw::from_fn(jwt_auth))
        .layer(Extension(jwt_config));

    let public = Router::new()
        .route("/", get(handlers::claims::claim_list))
        .route("/claim/:id/", get(handlers::claims::claim_detail))
        .route("/health", get(handlers::health::health));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(protected)
        .layer(Extension(store))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
