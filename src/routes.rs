use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::bootstrap::with_db_init;
use crate::handlers;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Database-backed endpoints: a missing database or schema triggers the
    // bootstrap, then safe requests are replayed once.
    let api_routes = Router::new()
        .route("/catalog/tables", get(handlers::catalog::list_tables))
        .route("/catalog/counts", get(handlers::catalog::counts))
        .route_layer(middleware::from_fn_with_state(state.clone(), with_db_init));

    let admin_routes =
        Router::new().route("/setup-database", post(handlers::setup::setup_database));

    Router::new()
        .nest("/api", api_routes)
        .nest("/admin", admin_routes)
        .route("/health", get(handlers::setup::health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
