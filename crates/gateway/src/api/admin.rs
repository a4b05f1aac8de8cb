//! Admin introspection endpoints — active agent roster and recent spans.
//! Gated behind the admin bearer token (dev mode allows all when unset).

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::api::guard::AdminGuard;
use crate::state::AppState;

/// `GET /v1/health` — public, no auth.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /v1/admin/agents` — every agent instance the lifecycle manager
/// still holds, spawned or terminated.
pub async fn list_agents(State(state): State<AppState>, _guard: AdminGuard) -> impl IntoResponse {
    Json(state.lifecycle.list_active())
}

#[derive(Debug, Deserialize)]
pub struct SpansQuery {
    #[serde(default = "d_limit")]
    limit: usize,
}

fn d_limit() -> usize {
    100
}

/// `GET /v1/admin/spans?limit=100` — most recently closed observability
/// spans, newest first.
pub async fn recent_spans(
    State(state): State<AppState>,
    Query(query): Query<SpansQuery>,
    _guard: AdminGuard,
) -> impl IntoResponse {
    Json(state.observability.recent_closed(query.limit))
}
