//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, terminal session status reporting, and
//! Prometheus metrics.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (terminal session connected)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::{AdapterCapabilities, ConnectionState, TerminalAdapter};
use crate::domain::session::{Platform, TerminalVersion};
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Terminal session status.
    pub session: SessionStatus,
    /// Host obligations of the adapter.
    pub capabilities: AdapterCapabilities,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Terminal session connected.
    Healthy,
    /// Session being opened or closed.
    Degraded,
    /// No terminal session.
    Unhealthy,
}

impl HealthStatus {
    /// Status for a lifecycle state.
    #[must_use]
    pub const fn from_state(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Connected => Self::Healthy,
            ConnectionState::Connecting | ConnectionState::Disconnecting => Self::Degraded,
            ConnectionState::Idle => Self::Unhealthy,
        }
    }
}

/// Terminal session status.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    /// Lifecycle state.
    pub state: ConnectionState,
    /// Whether the session is connected.
    pub connected: bool,
    /// Current connect cycle, if any.
    pub cycle: Option<u64>,
    /// Configured protocol version.
    pub terminal_version: TerminalVersion,
    /// Client binary platform.
    pub platform: Platform,
    /// Events bound on the live client.
    pub bound_events: usize,
    /// Orders in the order-id registry.
    pub tracked_orders: usize,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    adapter: Arc<TerminalAdapter>,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(version: String, adapter: Arc<TerminalAdapter>) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            adapter,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

/// Routes served by the health server.
pub fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.adapter.state() == ConnectionState::Connected {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let adapter = &state.adapter;
    let connection = adapter.state();

    HealthResponse {
        status: HealthStatus::from_state(connection),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        session: SessionStatus {
            state: connection,
            connected: connection == ConnectionState::Connected,
            cycle: adapter.current_cycle(),
            terminal_version: adapter.session().version(),
            platform: adapter.platform(),
            bound_events: adapter.bound_events().len(),
            tracked_orders: adapter.tracked_orders(),
        },
        capabilities: adapter.capabilities(),
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::application::ports::{ClientEvent, TerminalClient};
    use crate::application::services::{ClientTarget, VersionedClientFactory};
    use crate::domain::messages::InMessage;
    use crate::domain::session::{Bitness, ServerAddress, SessionConfig, SessionHolder};
    use crate::infrastructure::bus::ChannelSink;
    use crate::infrastructure::loopback::LoopbackClient;

    fn state(client: Arc<LoopbackClient>) -> Arc<HealthServerState> {
        let factory = VersionedClientFactory::with_bitness(Bitness::X64).with_builder(
            ClientTarget::V3X64,
            move |_| Arc::clone(&client) as Arc<dyn TerminalClient>,
        );
        let session = SessionHolder::new(SessionConfig::new(
            TerminalVersion::V3,
            ServerAddress::new("localhost", 8443),
            "u",
            "p",
        ));
        let (sink, _rx) = ChannelSink::unbounded();
        let adapter = TerminalAdapter::new(Arc::new(session), Arc::new(factory), Arc::new(sink));
        Arc::new(HealthServerState::new("0.1.0".to_string(), Arc::new(adapter)))
    }

    async fn get_status(state: &Arc<HealthServerState>, path: &str) -> StatusCode {
        router(Arc::clone(state))
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test]
    fn status_follows_state() {
        assert_eq!(
            HealthStatus::from_state(ConnectionState::Connected),
            HealthStatus::Healthy
        );
        assert_eq!(
            HealthStatus::from_state(ConnectionState::Connecting),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::from_state(ConnectionState::Idle),
            HealthStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn readiness_requires_connected_session() {
        let client = Arc::new(LoopbackClient::manual());
        let state = state(Arc::clone(&client));

        assert_eq!(get_status(&state, "/readyz").await, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(get_status(&state, "/healthz").await, StatusCode::OK);

        state.adapter.send_in_message(InMessage::Connect).unwrap();
        assert_eq!(get_status(&state, "/readyz").await, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(get_status(&state, "/health").await, StatusCode::OK);

        client.raise(ClientEvent::Connected);
        assert_eq!(get_status(&state, "/readyz").await, StatusCode::OK);
    }

    #[test]
    fn response_reports_session() {
        let state = state(Arc::new(LoopbackClient::manual()));
        state.adapter.send_in_message(InMessage::Connect).unwrap();

        let response = build_health_response(&state);
        assert_eq!(response.session.state, ConnectionState::Connecting);
        assert_eq!(response.session.cycle, Some(1));
        assert_eq!(response.session.bound_events, 18);
        assert_eq!(response.session.platform, Platform::AnyCpu);
        assert_eq!(response.session.tracked_orders, 0);
    }
}
