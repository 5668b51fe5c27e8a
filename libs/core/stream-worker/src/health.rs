//! Health check handlers for stream workers.
//!
//! - Liveness probes (`/health`, `/healthz`)
//! - Readiness probes (`/ready`, `/readyz`)
//! - Prometheus metrics (`/metrics`)
//! - DLQ inspection (`/admin/dlq/stats`, `/admin/dlq/messages`)

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::metrics;
use crate::queue::QueueInspector;

/// Shared state for health endpoints.
#[derive(Clone)]
pub struct HealthState {
    pub queue: Arc<dyn QueueInspector>,
    pub app_name: String,
    pub app_version: String,
}

impl HealthState {
    pub fn new(
        queue: Arc<dyn QueueInspector>,
        app_name: impl Into<String>,
        app_version: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            app_name: app_name.into(),
            app_version: app_version.into(),
        }
    }
}

/// Health response for liveness probes.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub name: String,
    pub version: String,
}

/// Liveness probe handler. Always OK while the process serves requests.
pub async fn health_handler(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        name: state.app_name,
        version: state.app_version,
    })
}

/// Readiness probe handler. Ready when the queue backend answers a ping.
pub async fn ready_handler(State(state): State<HealthState>) -> (StatusCode, Json<Value>) {
    match state.queue.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ready", "checks": { "queue": "ok" } })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "checks": { "queue": format!("error: {}", e) }
            })),
        ),
    }
}

/// Prometheus metrics endpoint handler.
pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::prometheus_handle() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            "metrics recorder not installed".to_string(),
        ),
    }
}

/// `GET /admin/dlq/stats`
pub async fn dlq_stats_handler(
    State(state): State<HealthState>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    state.queue.dlq_stats().await.map(Json).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
    })
}

#[derive(Debug, Deserialize)]
pub struct DlqListParams {
    /// Capped at 100
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

/// `GET /admin/dlq/messages?limit=10`, oldest first.
pub async fn dlq_list_handler(
    State(state): State<HealthState>,
    Query(params): Query<DlqListParams>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    let limit = params.limit.min(100);

    match state.queue.dlq_entries(limit).await {
        Ok(entries) => {
            let messages: Vec<Value> = entries
                .into_iter()
                .map(|(id, entry)| json!({ "id": id, "entry": entry }))
                .collect();
            Ok(Json(json!({
                "count": messages.len(),
                "limit": limit,
                "messages": messages,
            })))
        }
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}

/// Router with health, metrics and DLQ inspection endpoints.
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/readyz", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .route("/admin/dlq/stats", get(dlq_stats_handler))
        .route("/admin/dlq/messages", get(dlq_list_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Delivery;
    use crate::memory::InMemoryQueue;
    use crate::queue::MessageQueue;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn router(queue: Arc<InMemoryQueue>) -> Router {
        health_router(HealthState::new(queue, "mailer-email-worker", "0.1.0"))
    }

    #[tokio::test]
    async fn test_liveness() {
        let (status, body) = get_json(router(Arc::new(InMemoryQueue::new())), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["name"], "mailer-email-worker");
    }

    #[tokio::test]
    async fn test_readiness() {
        let (status, body) = get_json(router(Arc::new(InMemoryQueue::new())), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["queue"], "ok");
    }

    #[tokio::test]
    async fn test_dlq_endpoints() {
        let queue = Arc::new(InMemoryQueue::new());
        queue
            .reject(&Delivery::new("9-0", "{bad"), "Serialization error")
            .await
            .unwrap();

        let (status, stats) = get_json(router(queue.clone()), "/admin/dlq/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["length"], 1);

        let (status, list) = get_json(router(queue), "/admin/dlq/messages?limit=5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["count"], 1);
        assert_eq!(list["messages"][0]["entry"]["payload"], "{bad");
    }
}
