pub mod admin;
pub mod guard;
pub mod inbound;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full HTTP router: a public health probe and the
/// admin-token-gated inbound/introspection surface.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/health", get(admin::health))
        .route("/v1/inbound", post(inbound::inbound))
        .route("/v1/admin/agents", get(admin::list_agents))
        .route("/v1/admin/spans", get(admin::recent_spans))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
