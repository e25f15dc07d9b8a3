//! Port Interfaces
//!
//! Contracts the adapter depends on, following the Hexagonal Architecture
//! pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - `TerminalClient`: capability set of a versioned trading-terminal client
//! - `OutboundSink`: the host's outbound message pipe
//!
//! ## Driver Ports (Inbound)
//!
//! - `ClientEventHandler`: callback surface the client raises events into

mod client_port;
mod outbound_port;

pub use client_port::{
    BarRow, ClientError, ClientEvent, ClientEventHandler, ClientEventKind, DepthRow, OrderUpdate,
    OwnTrade, PortfolioRow, PortfolioUpdate, PositionUpdate, SecurityRow, SecurityUpdate,
    TerminalClient, TradeTick,
};
pub use outbound_port::OutboundSink;
