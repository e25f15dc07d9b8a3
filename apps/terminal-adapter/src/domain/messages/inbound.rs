//! Inbound messages (host bus → adapter).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{OrderType, Side, TransactionId};

/// Message sent into the adapter by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InMessage {
    /// Open a terminal session.
    Connect,
    /// Close the terminal session.
    Disconnect,
    /// Register a new order.
    OrderRegister(OrderRegisterMessage),
    /// Cancel one order.
    OrderCancel(OrderCancelMessage),
    /// Cancel every active order.
    OrderGroupCancel(OrderGroupCancelMessage),
    /// Move an active order to a new price.
    OrderReplace(OrderReplaceMessage),
    /// Subscribe to or unsubscribe from portfolio updates.
    Portfolio(PortfolioMessage),
    /// Request the list of portfolios.
    PortfolioLookup(PortfolioLookupMessage),
    /// Subscribe to or unsubscribe from market data.
    MarketData(MarketDataMessage),
    /// Request the list of securities.
    SecurityLookup(SecurityLookupMessage),
    /// Any message type this adapter does not handle.
    #[serde(other)]
    Unsupported,
}

impl InMessage {
    /// Discriminator of this message.
    #[must_use]
    pub const fn kind(&self) -> InMessageKind {
        match self {
            Self::Connect => InMessageKind::Connect,
            Self::Disconnect => InMessageKind::Disconnect,
            Self::OrderRegister(_) => InMessageKind::OrderRegister,
            Self::OrderCancel(_) => InMessageKind::OrderCancel,
            Self::OrderGroupCancel(_) => InMessageKind::OrderGroupCancel,
            Self::OrderReplace(_) => InMessageKind::OrderReplace,
            Self::Portfolio(_) => InMessageKind::Portfolio,
            Self::PortfolioLookup(_) => InMessageKind::PortfolioLookup,
            Self::MarketData(_) => InMessageKind::MarketData,
            Self::SecurityLookup(_) => InMessageKind::SecurityLookup,
            Self::Unsupported => InMessageKind::Unsupported,
        }
    }
}

/// Inbound message discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InMessageKind {
    /// [`InMessage::Connect`].
    Connect,
    /// [`InMessage::Disconnect`].
    Disconnect,
    /// [`InMessage::OrderRegister`].
    OrderRegister,
    /// [`InMessage::OrderCancel`].
    OrderCancel,
    /// [`InMessage::OrderGroupCancel`].
    OrderGroupCancel,
    /// [`InMessage::OrderReplace`].
    OrderReplace,
    /// [`InMessage::Portfolio`].
    Portfolio,
    /// [`InMessage::PortfolioLookup`].
    PortfolioLookup,
    /// [`InMessage::MarketData`].
    MarketData,
    /// [`InMessage::SecurityLookup`].
    SecurityLookup,
    /// [`InMessage::Unsupported`].
    Unsupported,
}

impl InMessageKind {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::OrderRegister => "order_register",
            Self::OrderCancel => "order_cancel",
            Self::OrderGroupCancel => "order_group_cancel",
            Self::OrderReplace => "order_replace",
            Self::Portfolio => "portfolio",
            Self::PortfolioLookup => "portfolio_lookup",
            Self::MarketData => "market_data",
            Self::SecurityLookup => "security_lookup",
            Self::Unsupported => "unsupported",
        }
    }
}

/// New order request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRegisterMessage {
    /// Transaction id of this request.
    pub transaction_id: TransactionId,
    /// Portfolio (trading account) name.
    pub portfolio_name: String,
    /// Security code.
    pub security_id: String,
    /// Order direction.
    pub side: Side,
    /// Order type.
    #[serde(default)]
    pub order_type: OrderType,
    /// Limit price (ignored for market orders).
    pub price: Decimal,
    /// Order volume.
    pub volume: Decimal,
    /// Trigger price for conditional orders.
    #[serde(default)]
    pub stop_price: Option<Decimal>,
}

/// Single order cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelMessage {
    /// Transaction id of this request.
    pub transaction_id: TransactionId,
    /// Transaction id the order was registered with.
    pub order_transaction_id: TransactionId,
    /// Terminal order id, if already known.
    #[serde(default)]
    pub order_id: Option<String>,
    /// Portfolio name.
    pub portfolio_name: String,
    /// Security code.
    pub security_id: String,
}

/// Cancel-all request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderGroupCancelMessage {
    /// Transaction id of this request.
    pub transaction_id: TransactionId,
}

/// Re-register (move) request for an active order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReplaceMessage {
    /// Transaction id of the replacement order.
    pub transaction_id: TransactionId,
    /// Terminal id of the order being replaced.
    pub old_order_id: String,
    /// Portfolio name.
    pub portfolio_name: String,
    /// Security code.
    pub security_id: String,
    /// New price.
    pub price: Decimal,
}

/// Portfolio subscription change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioMessage {
    /// Transaction id of this request.
    pub transaction_id: TransactionId,
    /// Portfolio name.
    pub portfolio_name: String,
    /// `true` to subscribe, `false` to unsubscribe.
    pub is_subscribe: bool,
}

/// Portfolio list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioLookupMessage {
    /// Transaction id of this request.
    pub transaction_id: TransactionId,
}

/// Market data subscription change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketDataMessage {
    /// Transaction id of this request.
    pub transaction_id: TransactionId,
    /// Security code.
    pub security_id: String,
    /// Data requested.
    pub data_type: MarketDataType,
    /// `true` to subscribe, `false` to unsubscribe.
    pub is_subscribe: bool,
}

/// Kind of market data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketDataType {
    /// Best quotes and last-trade fields.
    Level1,
    /// Order book.
    MarketDepth,
    /// Tick trades.
    Trades,
    /// Historical bars.
    Candles(CandleRequest),
}

/// Historical bar request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandleRequest {
    /// Bar length in seconds.
    pub timeframe_secs: u32,
    /// Earliest bar time.
    pub from: DateTime<Utc>,
    /// Maximum number of bars.
    pub count: u32,
}

/// Security list request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityLookupMessage {
    /// Transaction id of this request.
    pub transaction_id: TransactionId,
    /// Optional security code filter.
    #[serde(default)]
    pub security_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_messages_decode() {
        let connect: InMessage = serde_json::from_str(r#"{"type":"connect"}"#).unwrap();
        let disconnect: InMessage = serde_json::from_str(r#"{"type":"disconnect"}"#).unwrap();
        assert_eq!(connect, InMessage::Connect);
        assert_eq!(disconnect, InMessage::Disconnect);
    }

    #[test]
    fn unknown_type_decodes_as_unsupported() {
        let msg: InMessage =
            serde_json::from_str(r#"{"type":"order_status","transaction_id":7}"#).unwrap();
        assert_eq!(msg, InMessage::Unsupported);
        assert_eq!(msg.kind().as_str(), "unsupported");
    }

    #[test]
    fn order_register_decodes_with_defaults() {
        let msg: InMessage = serde_json::from_str(
            r#"{"type":"order_register","transaction_id":1,"portfolio_name":"BP1234",
                "security_id":"SBER","side":"buy","price":"250.5","volume":"10"}"#,
        )
        .unwrap();

        let InMessage::OrderRegister(register) = msg else {
            panic!("expected order register");
        };
        assert_eq!(register.order_type, OrderType::Limit);
        assert_eq!(register.price, Decimal::new(2505, 1));
        assert!(register.stop_price.is_none());
    }

    #[test]
    fn candle_market_data_decodes() {
        let msg: InMessage = serde_json::from_str(
            r#"{"type":"market_data","transaction_id":3,"security_id":"GAZP","is_subscribe":true,
                "data_type":{"kind":"candles","timeframe_secs":300,
                "from":"2024-03-01T10:00:00Z","count":100}}"#,
        )
        .unwrap();

        let InMessage::MarketData(md) = msg else {
            panic!("expected market data");
        };
        let MarketDataType::Candles(request) = md.data_type else {
            panic!("expected candles");
        };
        assert_eq!(request.timeframe_secs, 300);
        assert_eq!(request.count, 100);
    }
}
