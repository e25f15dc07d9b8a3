#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::vtable_address_comparisons
    )
)]

//! Terminal Adapter - Trading Terminal Message Adapter
//!
//! Translates a vendor-neutral stream of trading messages into calls against
//! a versioned trading-terminal client, and turns the client's asynchronous
//! events back into outbound messages.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Message model and session types
//!   - `messages`: Inbound and outbound bus messages
//!   - `session`: Protocol version, platform selector, address, credentials
//!   - `board`: Vendor board code table
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Terminal client capability contract, outbound pipe
//!   - `services`: Client factory, lifecycle controller, dispatcher,
//!     translator, and the `TerminalAdapter` facade
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `loopback`: In-memory terminal client
//!   - `bus`: JSON lines codec and channel-backed outbound pipe
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!   - `watchdog`: Host-side connect timeout
//!   - `metrics`, `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//!              ┌──────────────┐  calls   ┌────────────────┐
//! InMessage ──►│  Dispatcher  │─────────►│ TerminalClient │
//!              └──────┬───────┘          └───────┬────────┘
//!                     │ connect/disconnect       │ events (client threads)
//!              ┌──────▼───────┐          ┌───────▼────────┐
//!              │  Lifecycle   │◄─────────│ Cycle handler  │
//!              │  Controller  │  gates   └───────┬────────┘
//!              └──────────────┘          ┌───────▼────────┐
//!                                        │   Translator   │──► OutMessage
//!                                        └────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Message model and session types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::board::BoardCodeTable;
pub use domain::messages::{InMessage, InMessageKind, OutMessage, OutMessageKind};
pub use domain::session::{
    Bitness, Platform, ServerAddress, SessionConfig, SessionError, SessionHolder, TerminalVersion,
};

// Application
pub use application::error::AdapterError;
pub use application::ports::{
    ClientError, ClientEvent, ClientEventHandler, ClientEventKind, OutboundSink, TerminalClient,
};
pub use application::services::{
    AdapterCapabilities, ClientFactory, ClientTarget, ConnectionState, CycleCaches, CycleId,
    TerminalAdapter, VersionedClientFactory,
};

// Infrastructure config
pub use infrastructure::config::{AdapterConfig, ConfigError, ServerSettings, WatchdogSettings};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Message bus
pub use infrastructure::bus::{BusError, ChannelSink, JsonLineCodec};

// Loopback client (backend of the binary, double in integration tests)
pub use infrastructure::loopback::{ClientCall, LoopbackClient};

// Connect watchdog
pub use infrastructure::watchdog::ConnectWatchdog;

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
