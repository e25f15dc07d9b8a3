//! Vendor-Neutral Message Model
//!
//! Inbound messages arrive from the host message bus and drive the adapter.
//! Outbound messages are emitted by the adapter as the terminal reports
//! events. Both are tagged by a `type` field on the wire.

mod inbound;
mod outbound;

use serde::{Deserialize, Serialize};

pub use inbound::{
    CandleRequest, InMessage, InMessageKind, MarketDataMessage, MarketDataType,
    OrderCancelMessage, OrderGroupCancelMessage, OrderRegisterMessage, OrderReplaceMessage,
    PortfolioLookupMessage, PortfolioMessage, SecurityLookupMessage,
};
pub use outbound::{
    CandleMessage, ExecutionKind, ExecutionMessage, Level1ChangeMessage, LookupResultMessage,
    OutMessage, OutMessageKind, PortfolioChangeMessage, PortfolioOutMessage,
    PositionChangeMessage, QuoteChangeMessage, QuoteLevel, SecurityMessage, TickMessage,
};

/// Host-assigned identifier correlating requests with their results.
pub type TransactionId = u64;

/// Order or trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy side.
    Buy,
    /// Sell side.
    Sell,
}

/// Order type accepted by the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Limit order.
    #[default]
    Limit,
    /// Market order.
    Market,
    /// Stop (conditional) order.
    Conditional,
}

/// Order lifecycle state as reported by the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Accepted by the terminal, not yet active on the exchange.
    Pending,
    /// Resting on the exchange.
    Active,
    /// Filled or cancelled.
    Done,
    /// Rejected by the terminal or the exchange.
    Failed,
}
