//! Terminal Client Port (Driven Port)
//!
//! Capability contract every versioned terminal client implements: lifecycle
//! operations, order and subscription calls, and a fixed list of named
//! events the adapter binds handlers to.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::messages::{
    OrderRegisterMessage, OrderReplaceMessage, OrderState, Side, TransactionId,
};

// =============================================================================
// Event Surface
// =============================================================================

/// Named events a terminal client raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClientEventKind {
    /// A portfolio row arrived.
    NewPortfolio,
    /// Portfolio money fields changed.
    PortfolioChanged,
    /// A position changed.
    PositionChanged,
    /// An own trade arrived.
    NewMyTrade,
    /// The terminal assigned an order id.
    NewOrder,
    /// Order registration failed.
    OrderFailed,
    /// Order cancellation failed.
    OrderCancelFailed,
    /// Order state changed.
    OrderChanged,
    /// Order re-registration failed.
    OrderReRegisterFailed,
    /// Order re-registration succeeded.
    OrderReRegistered,
    /// A security row arrived.
    NewSecurity,
    /// Security level 1 fields changed.
    SecurityChanged,
    /// An order book row arrived.
    QuoteChanged,
    /// A tick trade arrived.
    NewTrade,
    /// A historical tick trade arrived.
    NewHistoryTrade,
    /// A bar row arrived.
    NewBar,
    /// Connection established.
    Connected,
    /// Connection closed or lost.
    Disconnected,
}

impl ClientEventKind {
    /// Every event, in binding order.
    pub const ALL: [Self; 18] = [
        Self::NewPortfolio,
        Self::PortfolioChanged,
        Self::PositionChanged,
        Self::NewMyTrade,
        Self::NewOrder,
        Self::OrderFailed,
        Self::OrderCancelFailed,
        Self::OrderChanged,
        Self::OrderReRegisterFailed,
        Self::OrderReRegistered,
        Self::NewSecurity,
        Self::SecurityChanged,
        Self::QuoteChanged,
        Self::NewTrade,
        Self::NewHistoryTrade,
        Self::NewBar,
        Self::Connected,
        Self::Disconnected,
    ];

    /// Event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewPortfolio => "new_portfolio",
            Self::PortfolioChanged => "portfolio_changed",
            Self::PositionChanged => "position_changed",
            Self::NewMyTrade => "new_my_trade",
            Self::NewOrder => "new_order",
            Self::OrderFailed => "order_failed",
            Self::OrderCancelFailed => "order_cancel_failed",
            Self::OrderChanged => "order_changed",
            Self::OrderReRegisterFailed => "order_re_register_failed",
            Self::OrderReRegistered => "order_re_registered",
            Self::NewSecurity => "new_security",
            Self::SecurityChanged => "security_changed",
            Self::QuoteChanged => "quote_changed",
            Self::NewTrade => "new_trade",
            Self::NewHistoryTrade => "new_history_trade",
            Self::NewBar => "new_bar",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

/// Portfolio row from a portfolio list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioRow {
    /// Zero-based row index.
    pub row: u32,
    /// Total rows in this list.
    pub count: u32,
    /// Portfolio name.
    pub name: String,
    /// Vendor board identifier.
    pub exchange: String,
}

/// Portfolio money fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioUpdate {
    /// Portfolio name.
    pub name: String,
    /// Cash balance.
    pub cash: Decimal,
    /// Leverage.
    pub leverage: Decimal,
    /// Commission.
    pub commission: Decimal,
    /// Free balance.
    pub balance: Decimal,
}

/// Position of one security.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionUpdate {
    /// Portfolio name.
    pub portfolio: String,
    /// Security code.
    pub security_id: String,
    /// Average entry price.
    pub average_price: Decimal,
    /// Current amount.
    pub amount: Decimal,
    /// Amount including pending orders.
    pub planned: Decimal,
}

/// Own trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnTrade {
    /// Portfolio name.
    pub portfolio: String,
    /// Security code.
    pub security_id: String,
    /// Terminal order id.
    pub order_id: String,
    /// Exchange trade id.
    pub trade_id: String,
    /// Trade price.
    pub price: Decimal,
    /// Trade volume.
    pub volume: Decimal,
    /// Trade time.
    pub time: DateTime<Utc>,
}

/// Order state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpdate {
    /// Transaction id the order was registered with (0 for foreign orders).
    pub transaction_id: TransactionId,
    /// Terminal order id.
    pub order_id: String,
    /// Portfolio name.
    pub portfolio: String,
    /// Security code.
    pub security_id: String,
    /// Order state.
    pub state: OrderState,
    /// Order direction.
    pub side: Side,
    /// Order price.
    pub price: Decimal,
    /// Order volume.
    pub volume: Decimal,
    /// Unfilled volume.
    pub balance: Decimal,
    /// Change time.
    pub time: DateTime<Utc>,
}

/// Security row from a security list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityRow {
    /// Zero-based row index.
    pub row: u32,
    /// Total rows in this list.
    pub count: u32,
    /// Security code.
    pub security_id: String,
    /// Full name.
    pub name: String,
    /// Short name.
    pub short_name: String,
    /// Vendor board identifier.
    pub board: String,
    /// Price step.
    pub price_step: Decimal,
    /// Lot size.
    pub lot_size: Decimal,
    /// Expiry date.
    pub expiry: Option<DateTime<Utc>>,
}

/// Security level 1 fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityUpdate {
    /// Security code.
    pub security_id: String,
    /// Last trade price.
    pub last_price: Option<Decimal>,
    /// Best bid price.
    pub bid: Option<Decimal>,
    /// Best bid volume.
    pub bid_volume: Option<Decimal>,
    /// Best ask price.
    pub ask: Option<Decimal>,
    /// Best ask volume.
    pub ask_volume: Option<Decimal>,
    /// Open interest.
    pub open_interest: Option<Decimal>,
    /// Update time.
    pub time: DateTime<Utc>,
}

/// One row of an order book snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthRow {
    /// Security code.
    pub security_id: String,
    /// Zero-based row index.
    pub row: u32,
    /// Total rows in this snapshot.
    pub count: u32,
    /// Bid price at this row.
    pub bid: Option<Decimal>,
    /// Bid volume at this row.
    pub bid_volume: Decimal,
    /// Ask price at this row.
    pub ask: Option<Decimal>,
    /// Ask volume at this row.
    pub ask_volume: Decimal,
}

/// Anonymous tick trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeTick {
    /// Security code.
    pub security_id: String,
    /// Exchange trade id.
    pub trade_id: String,
    /// Trade price.
    pub price: Decimal,
    /// Trade volume.
    pub volume: Decimal,
    /// Aggressor side.
    pub side: Option<Side>,
    /// Trade time.
    pub time: DateTime<Utc>,
}

/// One bar of a bar response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarRow {
    /// Security code.
    pub security_id: String,
    /// Bar length in seconds.
    pub timeframe_secs: u32,
    /// Zero-based row index.
    pub row: u32,
    /// Total rows in this response.
    pub count: u32,
    /// Bar open time.
    pub time: DateTime<Utc>,
    /// Open.
    pub open: Decimal,
    /// High.
    pub high: Decimal,
    /// Low.
    pub low: Decimal,
    /// Close.
    pub close: Decimal,
    /// Volume.
    pub volume: Decimal,
    /// Open interest.
    pub open_interest: Option<Decimal>,
}

/// Event raised by a terminal client.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ClientEvent {
    NewPortfolio(PortfolioRow),
    PortfolioChanged(PortfolioUpdate),
    PositionChanged(PositionUpdate),
    NewMyTrade(OwnTrade),
    NewOrder {
        transaction_id: TransactionId,
        order_id: String,
    },
    OrderFailed {
        transaction_id: TransactionId,
        reason: String,
    },
    OrderCancelFailed {
        order_id: String,
        reason: String,
    },
    OrderChanged(OrderUpdate),
    OrderReRegisterFailed {
        transaction_id: TransactionId,
        order_id: String,
        reason: String,
    },
    OrderReRegistered {
        transaction_id: TransactionId,
        order_id: String,
    },
    NewSecurity(SecurityRow),
    SecurityChanged(SecurityUpdate),
    QuoteChanged(DepthRow),
    NewTrade(TradeTick),
    NewHistoryTrade(TradeTick),
    NewBar(BarRow),
    Connected,
    Disconnected {
        error: Option<String>,
    },
}

impl ClientEvent {
    /// Name of the event this value is raised as.
    #[must_use]
    pub const fn kind(&self) -> ClientEventKind {
        match self {
            Self::NewPortfolio(_) => ClientEventKind::NewPortfolio,
            Self::PortfolioChanged(_) => ClientEventKind::PortfolioChanged,
            Self::PositionChanged(_) => ClientEventKind::PositionChanged,
            Self::NewMyTrade(_) => ClientEventKind::NewMyTrade,
            Self::NewOrder { .. } => ClientEventKind::NewOrder,
            Self::OrderFailed { .. } => ClientEventKind::OrderFailed,
            Self::OrderCancelFailed { .. } => ClientEventKind::OrderCancelFailed,
            Self::OrderChanged(_) => ClientEventKind::OrderChanged,
            Self::OrderReRegisterFailed { .. } => ClientEventKind::OrderReRegisterFailed,
            Self::OrderReRegistered { .. } => ClientEventKind::OrderReRegistered,
            Self::NewSecurity(_) => ClientEventKind::NewSecurity,
            Self::SecurityChanged(_) => ClientEventKind::SecurityChanged,
            Self::QuoteChanged(_) => ClientEventKind::QuoteChanged,
            Self::NewTrade(_) => ClientEventKind::NewTrade,
            Self::NewHistoryTrade(_) => ClientEventKind::NewHistoryTrade,
            Self::NewBar(_) => ClientEventKind::NewBar,
            Self::Connected => ClientEventKind::Connected,
            Self::Disconnected { .. } => ClientEventKind::Disconnected,
        }
    }
}

/// Callback surface a client raises events into.
///
/// Clients may call this from their own threads.
pub trait ClientEventHandler: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: ClientEvent);
}

// =============================================================================
// Client Capabilities
// =============================================================================

/// Error from a synchronous client call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The call was refused or failed inside the client.
    #[error("terminal call {operation} failed: {message}")]
    CallFailed {
        /// Operation name.
        operation: &'static str,
        /// Error details.
        message: String,
    },

    /// The client has no open session.
    #[error("terminal client is not connected")]
    NotConnected,
}

/// Capability set of a versioned trading-terminal client.
///
/// Calls only issue requests; outcomes arrive later as events on the
/// handlers bound with [`TerminalClient::bind`]. A client must not hold
/// internal locks while invoking a handler.
pub trait TerminalClient: Send + Sync {
    /// Route events of `kind` to `handler`, replacing any previous handler.
    fn bind(&self, kind: ClientEventKind, handler: Arc<dyn ClientEventHandler>);

    /// Stop routing events of `kind`.
    fn unbind(&self, kind: ClientEventKind);

    /// Open a session. Must not block on the network handshake.
    fn connect(&self, host: &str, port: u16, login: &str, password: &str)
    -> Result<(), ClientError>;

    /// Close the session.
    fn disconnect(&self) -> Result<(), ClientError>;

    /// Cancel every active order.
    fn cancel_all_orders(&self) -> Result<(), ClientError>;

    /// Register an order.
    fn register_order(&self, order: &OrderRegisterMessage) -> Result<(), ClientError>;

    /// Cancel an order by terminal order id.
    fn cancel_order(
        &self,
        portfolio: &str,
        security_id: &str,
        order_id: &str,
    ) -> Result<(), ClientError>;

    /// Move an order to a new price.
    fn replace_order(&self, replace: &OrderReplaceMessage) -> Result<(), ClientError>;

    /// Request the portfolio list.
    fn request_portfolios(&self) -> Result<(), ClientError>;

    /// Start portfolio updates.
    fn subscribe_portfolio(&self, portfolio: &str) -> Result<(), ClientError>;

    /// Stop portfolio updates.
    fn unsubscribe_portfolio(&self, portfolio: &str) -> Result<(), ClientError>;

    /// Request the security list.
    fn lookup_securities(&self) -> Result<(), ClientError>;

    /// Start level 1 updates.
    fn subscribe_level1(&self, security_id: &str) -> Result<(), ClientError>;

    /// Stop level 1 updates.
    fn unsubscribe_level1(&self, security_id: &str) -> Result<(), ClientError>;

    /// Start order book updates.
    fn subscribe_market_depth(&self, security_id: &str) -> Result<(), ClientError>;

    /// Stop order book updates.
    fn unsubscribe_market_depth(&self, security_id: &str) -> Result<(), ClientError>;

    /// Start tick trade updates.
    fn subscribe_trades(&self, security_id: &str) -> Result<(), ClientError>;

    /// Stop tick trade updates.
    fn unsubscribe_trades(&self, security_id: &str) -> Result<(), ClientError>;

    /// Request historical bars.
    fn request_bars(
        &self,
        security_id: &str,
        timeframe_secs: u32,
        from: DateTime<Utc>,
        count: u32,
    ) -> Result<(), ClientError>;
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn event_list_is_complete_and_unique() {
        let unique: HashSet<_> = ClientEventKind::ALL.iter().collect();
        assert_eq!(unique.len(), ClientEventKind::ALL.len());
        assert_eq!(ClientEventKind::ALL.len(), 18);
    }

    #[test]
    fn event_kind_round_trip() {
        assert_eq!(ClientEvent::Connected.kind(), ClientEventKind::Connected);
        assert_eq!(
            ClientEvent::Disconnected { error: None }.kind(),
            ClientEventKind::Disconnected
        );
        assert_eq!(
            ClientEvent::NewOrder {
                transaction_id: 1,
                order_id: "A1".to_string()
            }
            .kind()
            .as_str(),
            "new_order"
        );
    }

    #[test]
    fn client_error_display() {
        let err = ClientError::CallFailed {
            operation: "connect",
            message: "refused".to_string(),
        };
        assert_eq!(err.to_string(), "terminal call connect failed: refused");
    }
}
