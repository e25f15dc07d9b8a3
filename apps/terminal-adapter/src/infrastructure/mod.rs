//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// JSON lines codec and channel-backed outbound pipe.
pub mod bus;

/// Configuration loading.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// In-memory terminal client.
pub mod loopback;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;

/// Host-side connect timeout supervision.
pub mod watchdog;
