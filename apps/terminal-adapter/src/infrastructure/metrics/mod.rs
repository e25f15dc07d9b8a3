//! Prometheus Metrics Module
//!
//! Exposes adapter metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Messages**: Counts of inbound and outbound messages by type
//! - **Connection**: Lifecycle state and connect cycles
//! - **Errors**: Rejected inbound messages and stale client events
//! - **Latency**: Inbound dispatch duration
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. Without an
//! installed recorder every function here is a no-op.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::application::error::AdapterError;
use crate::application::ports::ClientEventKind;
use crate::application::services::ConnectionState;
use crate::domain::messages::{InMessageKind, OutMessageKind};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Message counters
    describe_counter!(
        "terminal_adapter_inbound_messages_total",
        "Total inbound messages received from the host bus"
    );
    describe_counter!(
        "terminal_adapter_outbound_messages_total",
        "Total outbound messages emitted to the host bus"
    );

    // Connection
    describe_gauge!(
        "terminal_adapter_connection_state",
        "Lifecycle state (0 idle, 1 connecting, 2 connected, 3 disconnecting)"
    );
    describe_counter!(
        "terminal_adapter_connect_cycles_total",
        "Total connect cycles started"
    );

    // Error counters
    describe_counter!(
        "terminal_adapter_errors_total",
        "Total inbound messages rejected by error type"
    );
    describe_counter!(
        "terminal_adapter_stale_events_total",
        "Total client events dropped because their cycle had ended"
    );

    // Latency histograms
    describe_histogram!(
        "terminal_adapter_dispatch_seconds",
        "Time to dispatch one inbound message"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record an inbound message.
pub fn record_inbound_message(kind: InMessageKind) {
    counter!(
        "terminal_adapter_inbound_messages_total",
        "message_type" => kind.as_str()
    )
    .increment(1);
}

/// Record an outbound message.
pub fn record_outbound_message(kind: OutMessageKind) {
    counter!(
        "terminal_adapter_outbound_messages_total",
        "message_type" => kind.as_str()
    )
    .increment(1);
}

/// Update the lifecycle state gauge.
pub fn set_connection_state(state: ConnectionState) {
    gauge!("terminal_adapter_connection_state").set(state.as_gauge());
}

/// Record the start of a connect cycle.
pub fn record_connect_cycle() {
    counter!("terminal_adapter_connect_cycles_total").increment(1);
}

/// Record an inbound message rejected with `error`.
pub fn record_adapter_error(error: &AdapterError) {
    counter!(
        "terminal_adapter_errors_total",
        "error_type" => error.as_str()
    )
    .increment(1);
}

/// Record a client event dropped as stale.
pub fn record_stale_event(kind: ClientEventKind) {
    counter!(
        "terminal_adapter_stale_events_total",
        "event" => kind.as_str()
    )
    .increment(1);
}

/// Record inbound dispatch duration.
pub fn record_dispatch_duration(kind: InMessageKind, duration: Duration) {
    histogram!(
        "terminal_adapter_dispatch_seconds",
        "message_type" => kind.as_str()
    )
    .record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_inbound_message(InMessageKind::Connect);
        record_outbound_message(OutMessageKind::Connect);
        set_connection_state(ConnectionState::Connected);
        record_connect_cycle();
        record_adapter_error(&AdapterError::NotConnected);
        record_stale_event(ClientEventKind::NewBar);
        record_dispatch_duration(InMessageKind::MarketData, Duration::from_micros(40));
    }

    #[test]
    fn handle_absent_before_init() {
        // Other tests never install a recorder.
        assert!(get_metrics_handle().is_none());
    }
}
