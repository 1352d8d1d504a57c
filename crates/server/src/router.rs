use crate::middleware::request_id;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use gateway_core::{
    metrics::MetricsCollector,
    relayer::{RelayError, Relayer},
    runtime::GatewayComponents,
    session::CachedSessionRegistry,
    types::{Payload, RelayRequest},
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Optional header carrying the path appended to the servicer or altruist URL.
pub const X_RELAY_PATH: &str = "x-relay-path";

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub relayer: Arc<Relayer>,
    pub session_registry: Arc<CachedSessionRegistry>,
    pub metrics: Arc<MetricsCollector>,
}

impl AppState {
    #[must_use]
    pub fn from_components(components: &GatewayComponents) -> Self {
        Self {
            relayer: components.relayer().clone(),
            session_registry: components.session_registry().clone(),
            metrics: components.metrics_collector().clone(),
        }
    }
}

/// Status code reported to the client when both the node and the altruist path failed.
fn relay_error_status(error: &RelayError) -> StatusCode {
    match error {
        RelayError::NodeNotFound | RelayError::AltruistNotFound => StatusCode::SERVICE_UNAVAILABLE,
        RelayError::AltruistTimeout => StatusCode::GATEWAY_TIMEOUT,
        RelayError::MalformedRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// Relays the raw request body to `chain_id`.
///
/// The body is forwarded untouched as a `POST`; the response body of the node or
/// altruist is returned as-is.
pub async fn handle_relay(
    State(state): State<AppState>,
    Path(chain_id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let path = headers.get(X_RELAY_PATH).and_then(|v| v.to_str().ok()).unwrap_or_default();
    let request = RelayRequest::new(chain_id.clone(), Payload::post(body, path));

    match state.relayer.send_relay(request).await {
        Ok(response) => {
            debug!(chain_id = %chain_id, request_id = request_id(&headers), "relay served");
            (StatusCode::OK, [("content-type", "application/json")], response.response)
        }
        Err(e) => {
            warn!(
                chain_id = %chain_id,
                request_id = request_id(&headers),
                error = %e,
                "relay failed on every path"
            );
            let body = serde_json::json!({
                "error": e.to_string(),
                "chain_id": chain_id,
            });
            (relay_error_status(&e), [("content-type", "application/json")], body.to_string())
        }
    }
}

/// Public view of every cached node.
pub async fn handle_qos_nodes(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session_registry.qos_nodes())
}

pub async fn handle_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render(),
    )
}

/// Always `200`: relays are still served through the altruist when no node is healthy,
/// so a node shortage is reported as `degraded` rather than as a failed probe.
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let nodes = state.session_registry.qos_nodes();
    let healthy = nodes.iter().filter(|node| node.is_healthy).count();

    let health_status = serde_json::json!({
        "status": if healthy > 0 { "healthy" } else { "degraded" },
        "sessions": {
            "cached": state.session_registry.session_count(),
            "last_primed_height": state.session_registry.last_primed_session_height(),
        },
        "nodes": {
            "total": nodes.len(),
            "healthy": healthy,
        },
        "timestamp": chrono::Utc::now().to_rfc3339()
    });

    (StatusCode::OK, Json(health_status))
}
