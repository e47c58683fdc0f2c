//! HTTP router.

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};

/// Builds the application router with the link guard around every route.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/logout", get(auth::logout))
        .route(
            "/accounts/{account_id}/disconnect",
            post(auth::disconnect_account),
        )
        .route("/api/link", get(auth::link_status))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::link_guard,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
