//! Outbound messages (adapter → host bus).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{OrderState, Side, TransactionId};

/// Message emitted by the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutMessage {
    /// Session established.
    Connect,
    /// Session closed; `error` is absent on a clean shutdown.
    Disconnect {
        /// Reason the connection was lost.
        error: Option<String>,
    },
    /// Portfolio discovered.
    Portfolio(PortfolioOutMessage),
    /// Portfolio money fields changed.
    PortfolioChange(PortfolioChangeMessage),
    /// Position changed.
    PositionChange(PositionChangeMessage),
    /// Order state change, own trade or order failure.
    Execution(ExecutionMessage),
    /// Security discovered.
    Security(SecurityMessage),
    /// Level 1 fields changed.
    Level1Change(Level1ChangeMessage),
    /// Consolidated order book.
    QuoteChange(QuoteChangeMessage),
    /// Anonymous tick trade.
    Tick(TickMessage),
    /// Historical bar.
    Candle(CandleMessage),
    /// Portfolio lookup completed.
    PortfolioLookupResult(LookupResultMessage),
    /// Security lookup completed.
    SecurityLookupResult(LookupResultMessage),
}

impl OutMessage {
    /// Discriminator of this message.
    #[must_use]
    pub const fn kind(&self) -> OutMessageKind {
        match self {
            Self::Connect => OutMessageKind::Connect,
            Self::Disconnect { .. } => OutMessageKind::Disconnect,
            Self::Portfolio(_) => OutMessageKind::Portfolio,
            Self::PortfolioChange(_) => OutMessageKind::PortfolioChange,
            Self::PositionChange(_) => OutMessageKind::PositionChange,
            Self::Execution(_) => OutMessageKind::Execution,
            Self::Security(_) => OutMessageKind::Security,
            Self::Level1Change(_) => OutMessageKind::Level1Change,
            Self::QuoteChange(_) => OutMessageKind::QuoteChange,
            Self::Tick(_) => OutMessageKind::Tick,
            Self::Candle(_) => OutMessageKind::Candle,
            Self::PortfolioLookupResult(_) => OutMessageKind::PortfolioLookupResult,
            Self::SecurityLookupResult(_) => OutMessageKind::SecurityLookupResult,
        }
    }
}

/// Outbound message discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum OutMessageKind {
    Connect,
    Disconnect,
    Portfolio,
    PortfolioChange,
    PositionChange,
    Execution,
    Security,
    Level1Change,
    QuoteChange,
    Tick,
    Candle,
    PortfolioLookupResult,
    SecurityLookupResult,
}

impl OutMessageKind {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Portfolio => "portfolio",
            Self::PortfolioChange => "portfolio_change",
            Self::PositionChange => "position_change",
            Self::Execution => "execution",
            Self::Security => "security",
            Self::Level1Change => "level1_change",
            Self::QuoteChange => "quote_change",
            Self::Tick => "tick",
            Self::Candle => "candle",
            Self::PortfolioLookupResult => "portfolio_lookup_result",
            Self::SecurityLookupResult => "security_lookup_result",
        }
    }
}

/// Portfolio discovered by the terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioOutMessage {
    /// Portfolio name.
    pub portfolio_name: String,
    /// Canonical board code.
    pub board_code: String,
}

/// Portfolio money fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioChangeMessage {
    /// Portfolio name.
    pub portfolio_name: String,
    /// Cash balance.
    pub cash: Decimal,
    /// Leverage.
    pub leverage: Decimal,
    /// Accumulated commission.
    pub commission: Decimal,
    /// Free balance.
    pub balance: Decimal,
}

/// Position of one security in one portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionChangeMessage {
    /// Portfolio name.
    pub portfolio_name: String,
    /// Security code.
    pub security_id: String,
    /// Average entry price.
    pub average_price: Decimal,
    /// Current position.
    pub current_value: Decimal,
    /// Position including pending orders.
    pub planned_value: Decimal,
}

/// What an execution message describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    /// Order state.
    Order,
    /// Own trade.
    Trade,
}

/// Order state change, own trade or order failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMessage {
    /// Order or trade.
    pub kind: ExecutionKind,
    /// Transaction id of the request this relates to.
    pub original_transaction_id: Option<TransactionId>,
    /// Terminal order id.
    pub order_id: Option<String>,
    /// Portfolio name.
    pub portfolio_name: Option<String>,
    /// Security code.
    pub security_id: Option<String>,
    /// Order state.
    pub order_state: Option<OrderState>,
    /// Order direction.
    pub side: Option<Side>,
    /// Order or trade price.
    pub price: Option<Decimal>,
    /// Order or trade volume.
    pub volume: Option<Decimal>,
    /// Unfilled volume.
    pub balance: Option<Decimal>,
    /// Trade id (own trades only).
    pub trade_id: Option<String>,
    /// Failure text.
    pub error: Option<String>,
    /// Event time.
    pub server_time: DateTime<Utc>,
}

impl ExecutionMessage {
    /// Empty execution message of the given kind.
    #[must_use]
    pub const fn new(kind: ExecutionKind, server_time: DateTime<Utc>) -> Self {
        Self {
            kind,
            original_transaction_id: None,
            order_id: None,
            portfolio_name: None,
            security_id: None,
            order_state: None,
            side: None,
            price: None,
            volume: None,
            balance: None,
            trade_id: None,
            error: None,
            server_time,
        }
    }

    /// Failed order operation.
    #[must_use]
    pub fn failure(
        original_transaction_id: Option<TransactionId>,
        order_id: Option<String>,
        error: String,
        server_time: DateTime<Utc>,
    ) -> Self {
        Self {
            original_transaction_id,
            order_id,
            order_state: Some(OrderState::Failed),
            error: Some(error),
            ..Self::new(ExecutionKind::Order, server_time)
        }
    }

    /// Whether this message reports a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Security discovered by the terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityMessage {
    /// Security code.
    pub security_id: String,
    /// Full name.
    pub name: String,
    /// Short name.
    pub short_name: String,
    /// Canonical board code.
    pub board_code: String,
    /// Minimum price step.
    pub price_step: Decimal,
    /// Lot size.
    pub lot_size: Decimal,
    /// Expiry date for derivatives.
    pub expiry: Option<DateTime<Utc>>,
}

/// Level 1 fields of a security.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level1ChangeMessage {
    /// Security code.
    pub security_id: String,
    /// Last trade price.
    pub last_price: Option<Decimal>,
    /// Best bid price (present only when it changed).
    pub best_bid_price: Option<Decimal>,
    /// Best bid volume (present only when it changed).
    pub best_bid_volume: Option<Decimal>,
    /// Best ask price (present only when it changed).
    pub best_ask_price: Option<Decimal>,
    /// Best ask volume (present only when it changed).
    pub best_ask_volume: Option<Decimal>,
    /// Open interest.
    pub open_interest: Option<Decimal>,
    /// Event time.
    pub server_time: DateTime<Utc>,
}

/// One price level of an order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLevel {
    /// Price.
    pub price: Decimal,
    /// Volume.
    pub volume: Decimal,
}

/// Consolidated order book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteChangeMessage {
    /// Security code.
    pub security_id: String,
    /// Bids, best (highest) first.
    pub bids: Vec<QuoteLevel>,
    /// Asks, best (lowest) first.
    pub asks: Vec<QuoteLevel>,
    /// Event time.
    pub server_time: DateTime<Utc>,
}

/// Anonymous tick trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickMessage {
    /// Security code.
    pub security_id: String,
    /// Exchange trade id.
    pub trade_id: String,
    /// Trade price.
    pub price: Decimal,
    /// Trade volume.
    pub volume: Decimal,
    /// Aggressor side, if known.
    pub side: Option<Side>,
    /// Whether the trade came from a history request.
    pub is_history: bool,
    /// Trade time.
    pub server_time: DateTime<Utc>,
}

/// Historical bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandleMessage {
    /// Transaction id of the candle request.
    pub original_transaction_id: Option<TransactionId>,
    /// Security code.
    pub security_id: String,
    /// Bar length in seconds.
    pub timeframe_secs: u32,
    /// Bar open time.
    pub open_time: DateTime<Utc>,
    /// Open price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Close price.
    pub close: Decimal,
    /// Traded volume.
    pub volume: Decimal,
    /// Open interest at close.
    pub open_interest: Option<Decimal>,
    /// Whether this is the last bar of the response.
    pub is_finished: bool,
}

/// Completion of a lookup request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResultMessage {
    /// Transaction id of the lookup request.
    pub original_transaction_id: TransactionId,
    /// Failure text.
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_serializes_error() {
        let clean = serde_json::to_string(&OutMessage::Disconnect { error: None }).unwrap();
        assert_eq!(clean, r#"{"type":"disconnect","error":null}"#);

        let lost = OutMessage::Disconnect {
            error: Some("socket reset".to_string()),
        };
        assert!(serde_json::to_string(&lost).unwrap().contains("socket reset"));
    }

    #[test]
    fn failure_execution() {
        let msg = ExecutionMessage::failure(Some(5), None, "no funds".to_string(), Utc::now());
        assert!(msg.is_failure());
        assert_eq!(msg.order_state, Some(OrderState::Failed));
        assert_eq!(msg.kind, ExecutionKind::Order);
        assert_eq!(msg.original_transaction_id, Some(5));
    }

    #[test]
    fn kinds_label_every_variant() {
        let msg = OutMessage::PortfolioLookupResult(LookupResultMessage {
            original_transaction_id: 1,
            error: None,
        });
        assert_eq!(msg.kind().as_str(), "portfolio_lookup_result");
        assert_eq!(OutMessage::Connect.kind(), OutMessageKind::Connect);
    }
}
