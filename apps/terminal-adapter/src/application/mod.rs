//! Application Layer - Ports and the adapter services.
//!
//! This layer owns the connection lifecycle and the translation between
//! bus messages and terminal client calls/events.

/// Typed errors returned to the host.
pub mod error;

/// Port interfaces for the terminal client and the outbound pipe.
pub mod ports;

/// Factory, lifecycle controller, dispatcher and translator.
pub mod services;
