//! Domain Layer - Message model, session settings and board codes.
//!
//! This layer has no knowledge of the terminal client or the host pipes.
//! All types here are plain Rust with serialization support.

/// Board code translation table.
pub mod board;

/// Vendor-neutral inbound and outbound messages.
pub mod messages;

/// Session configuration shared with the adapter.
pub mod session;
