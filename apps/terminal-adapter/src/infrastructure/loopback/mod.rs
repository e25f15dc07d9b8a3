//! Loopback Terminal Client
//!
//! In-memory [`TerminalClient`] that records every call it receives.
//!
//! - **Manual mode**: calls are recorded only; events are raised by the
//!   owner through [`LoopbackClient::raise`].
//! - **Auto mode**: behaves like a well-mannered terminal. Connect and
//!   disconnect raise the matching events, orders are acknowledged with
//!   generated ids, lookups answer with a small demo universe.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::application::ports::{
    ClientError, ClientEvent, ClientEventHandler, ClientEventKind, OrderUpdate, PortfolioRow,
    SecurityRow, TerminalClient,
};
use crate::domain::messages::{
    OrderRegisterMessage, OrderReplaceMessage, OrderState, TransactionId,
};

/// Portfolio reported by an auto-mode client.
pub const DEMO_PORTFOLIO: &str = "DEMO";

/// Securities reported by an auto-mode client.
pub const DEMO_SECURITIES: [&str; 2] = ["SBER", "GAZP"];

/// Market data feed of a subscription call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    /// Level 1.
    Level1,
    /// Order book.
    MarketDepth,
    /// Tick trades.
    Trades,
}

/// One call received by a [`LoopbackClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ClientCall {
    Bind(ClientEventKind),
    Unbind(ClientEventKind),
    Connect {
        host: String,
        port: u16,
        login: String,
        password: String,
    },
    Disconnect,
    CancelAllOrders,
    RegisterOrder {
        transaction_id: TransactionId,
        security_id: String,
    },
    CancelOrder {
        portfolio: String,
        security_id: String,
        order_id: String,
    },
    ReplaceOrder {
        transaction_id: TransactionId,
        order_id: String,
        price: Decimal,
    },
    RequestPortfolios,
    SubscribePortfolio(String),
    UnsubscribePortfolio(String),
    LookupSecurities,
    Subscribe {
        feed: Feed,
        security_id: String,
    },
    Unsubscribe {
        feed: Feed,
        security_id: String,
    },
    RequestBars {
        security_id: String,
        timeframe_secs: u32,
        from: DateTime<Utc>,
        count: u32,
    },
}

impl ClientCall {
    /// Event kind of a `Bind` call.
    #[must_use]
    pub const fn bound(&self) -> Option<ClientEventKind> {
        match self {
            Self::Bind(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Event kind of an `Unbind` call.
    #[must_use]
    pub const fn unbound(&self) -> Option<ClientEventKind> {
        match self {
            Self::Unbind(kind) => Some(*kind),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Manual,
    Auto,
}

#[derive(Default)]
struct LoopbackState {
    calls: Vec<ClientCall>,
    handlers: HashMap<ClientEventKind, Arc<dyn ClientEventHandler>>,
    failures: HashMap<&'static str, String>,
    orders: HashMap<String, OrderRegisterMessage>,
    connected: bool,
}

/// In-memory terminal client.
pub struct LoopbackClient {
    mode: Mode,
    state: Mutex<LoopbackState>,
}

impl LoopbackClient {
    /// Client that records calls and raises nothing on its own.
    #[must_use]
    pub fn manual() -> Self {
        Self::with_mode(Mode::Manual)
    }

    /// Client that answers calls with plausible events.
    #[must_use]
    pub fn auto() -> Self {
        Self::with_mode(Mode::Auto)
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            state: Mutex::new(LoopbackState::default()),
        }
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ClientCall> {
        self.state.lock().calls.clone()
    }

    /// Event kinds that currently have a handler.
    #[must_use]
    pub fn bound_kinds(&self) -> Vec<ClientEventKind> {
        let mut kinds: Vec<_> = self.state.lock().handlers.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Make the next call to `operation` fail with `message`.
    pub fn fail_next(&self, operation: &'static str, message: impl Into<String>) {
        self.state.lock().failures.insert(operation, message.into());
    }

    /// Raise `event` to its bound handler. Returns `false` if none is bound.
    pub fn raise(&self, event: ClientEvent) -> bool {
        let handler = self.state.lock().handlers.get(&event.kind()).cloned();
        match handler {
            Some(handler) => {
                handler.on_event(event);
                true
            }
            None => {
                tracing::trace!(kind = event.kind().as_str(), "No handler bound, event dropped");
                false
            }
        }
    }

    fn record(&self, operation: &'static str, call: ClientCall) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        match state.failures.remove(operation) {
            Some(message) => Err(ClientError::CallFailed { operation, message }),
            None => Ok(()),
        }
    }

    fn require_connected(&self) -> Result<(), ClientError> {
        if self.mode == Mode::Auto && !self.state.lock().connected {
            return Err(ClientError::NotConnected);
        }
        Ok(())
    }

    fn is_auto(&self) -> bool {
        self.mode == Mode::Auto
    }

    fn order_changed(
        order: &OrderRegisterMessage,
        order_id: &str,
        state: OrderState,
    ) -> ClientEvent {
        let balance = if state == OrderState::Done {
            Decimal::ZERO
        } else {
            order.volume
        };
        ClientEvent::OrderChanged(OrderUpdate {
            transaction_id: order.transaction_id,
            order_id: order_id.to_string(),
            portfolio: order.portfolio_name.clone(),
            security_id: order.security_id.clone(),
            state,
            side: order.side,
            price: order.price,
            volume: order.volume,
            balance,
            time: Utc::now(),
        })
    }
}

impl Default for LoopbackClient {
    fn default() -> Self {
        Self::manual()
    }
}

impl std::fmt::Debug for LoopbackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LoopbackClient")
            .field("mode", &self.mode)
            .field("calls", &state.calls.len())
            .field("bound", &state.handlers.len())
            .finish_non_exhaustive()
    }
}

impl TerminalClient for LoopbackClient {
    fn bind(&self, kind: ClientEventKind, handler: Arc<dyn ClientEventHandler>) {
        let mut state = self.state.lock();
        state.calls.push(ClientCall::Bind(kind));
        state.handlers.insert(kind, handler);
    }

    fn unbind(&self, kind: ClientEventKind) {
        let mut state = self.state.lock();
        state.calls.push(ClientCall::Unbind(kind));
        state.handlers.remove(&kind);
    }

    fn connect(
        &self,
        host: &str,
        port: u16,
        login: &str,
        password: &str,
    ) -> Result<(), ClientError> {
        self.record(
            "connect",
            ClientCall::Connect {
                host: host.to_string(),
                port,
                login: login.to_string(),
                password: password.to_string(),
            },
        )?;

        if self.is_auto() {
            self.state.lock().connected = true;
            self.raise(ClientEvent::Connected);
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<(), ClientError> {
        self.record("disconnect", ClientCall::Disconnect)?;

        if self.is_auto() {
            self.state.lock().connected = false;
            self.raise(ClientEvent::Disconnected { error: None });
        }
        Ok(())
    }

    fn cancel_all_orders(&self) -> Result<(), ClientError> {
        self.record("cancel_all_orders", ClientCall::CancelAllOrders)?;
        self.require_connected()?;

        if self.is_auto() {
            let orders: Vec<_> = self.state.lock().orders.drain().collect();
            for (order_id, order) in orders {
                self.raise(Self::order_changed(&order, &order_id, OrderState::Done));
            }
        }
        Ok(())
    }

    fn register_order(&self, order: &OrderRegisterMessage) -> Result<(), ClientError> {
        self.record(
            "register_order",
            ClientCall::RegisterOrder {
                transaction_id: order.transaction_id,
                security_id: order.security_id.clone(),
            },
        )?;
        self.require_connected()?;

        if self.is_auto() {
            let order_id = Uuid::new_v4().to_string();
            self.state
                .lock()
                .orders
                .insert(order_id.clone(), order.clone());
            self.raise(ClientEvent::NewOrder {
                transaction_id: order.transaction_id,
                order_id: order_id.clone(),
            });
            self.raise(Self::order_changed(order, &order_id, OrderState::Active));
        }
        Ok(())
    }

    fn cancel_order(
        &self,
        portfolio: &str,
        security_id: &str,
        order_id: &str,
    ) -> Result<(), ClientError> {
        self.record(
            "cancel_order",
            ClientCall::CancelOrder {
                portfolio: portfolio.to_string(),
                security_id: security_id.to_string(),
                order_id: order_id.to_string(),
            },
        )?;
        self.require_connected()?;

        if self.is_auto() {
            let order = self.state.lock().orders.remove(order_id);
            match order {
                Some(order) => {
                    self.raise(Self::order_changed(&order, order_id, OrderState::Done));
                }
                None => {
                    self.raise(ClientEvent::OrderCancelFailed {
                        order_id: order_id.to_string(),
                        reason: "order not found".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn replace_order(&self, replace: &OrderReplaceMessage) -> Result<(), ClientError> {
        self.record(
            "replace_order",
            ClientCall::ReplaceOrder {
                transaction_id: replace.transaction_id,
                order_id: replace.old_order_id.clone(),
                price: replace.price,
            },
        )?;
        self.require_connected()?;

        if self.is_auto() {
            let order = self.state.lock().orders.remove(&replace.old_order_id);
            match order {
                Some(mut order) => {
                    let order_id = Uuid::new_v4().to_string();
                    order.transaction_id = replace.transaction_id;
                    order.price = replace.price;
                    self.state
                        .lock()
                        .orders
                        .insert(order_id.clone(), order);
                    self.raise(ClientEvent::OrderReRegistered {
                        transaction_id: replace.transaction_id,
                        order_id,
                    });
                }
                None => {
                    self.raise(ClientEvent::OrderReRegisterFailed {
                        transaction_id: replace.transaction_id,
                        order_id: replace.old_order_id.clone(),
                        reason: "order not found".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn request_portfolios(&self) -> Result<(), ClientError> {
        self.record("request_portfolios", ClientCall::RequestPortfolios)?;
        self.require_connected()?;

        if self.is_auto() {
            self.raise(ClientEvent::NewPortfolio(PortfolioRow {
                row: 0,
                count: 1,
                name: DEMO_PORTFOLIO.to_string(),
                exchange: "EQ".to_string(),
            }));
        }
        Ok(())
    }

    fn subscribe_portfolio(&self, portfolio: &str) -> Result<(), ClientError> {
        self.record(
            "subscribe_portfolio",
            ClientCall::SubscribePortfolio(portfolio.to_string()),
        )?;
        self.require_connected()
    }

    fn unsubscribe_portfolio(&self, portfolio: &str) -> Result<(), ClientError> {
        self.record(
            "unsubscribe_portfolio",
            ClientCall::UnsubscribePortfolio(portfolio.to_string()),
        )?;
        self.require_connected()
    }

    fn lookup_securities(&self) -> Result<(), ClientError> {
        self.record("lookup_securities", ClientCall::LookupSecurities)?;
        self.require_connected()?;

        if self.is_auto() {
            let count = u32::try_from(DEMO_SECURITIES.len()).unwrap_or(u32::MAX);
            for (row, code) in (0..count).zip(DEMO_SECURITIES) {
                self.raise(ClientEvent::NewSecurity(SecurityRow {
                    row,
                    count,
                    security_id: code.to_string(),
                    name: code.to_string(),
                    short_name: code.to_string(),
                    board: "EQ".to_string(),
                    price_step: Decimal::new(1, 2),
                    lot_size: Decimal::ONE,
                    expiry: None,
                }));
            }
        }
        Ok(())
    }

    fn subscribe_level1(&self, security_id: &str) -> Result<(), ClientError> {
        self.record("subscribe_level1", subscribe(Feed::Level1, security_id))?;
        self.require_connected()
    }

    fn unsubscribe_level1(&self, security_id: &str) -> Result<(), ClientError> {
        self.record("unsubscribe_level1", unsubscribe(Feed::Level1, security_id))?;
        self.require_connected()
    }

    fn subscribe_market_depth(&self, security_id: &str) -> Result<(), ClientError> {
        self.record(
            "subscribe_market_depth",
            subscribe(Feed::MarketDepth, security_id),
        )?;
        self.require_connected()
    }

    fn unsubscribe_market_depth(&self, security_id: &str) -> Result<(), ClientError> {
        self.record(
            "unsubscribe_market_depth",
            unsubscribe(Feed::MarketDepth, security_id),
        )?;
        self.require_connected()
    }

    fn subscribe_trades(&self, security_id: &str) -> Result<(), ClientError> {
        self.record("subscribe_trades", subscribe(Feed::Trades, security_id))?;
        self.require_connected()
    }

    fn unsubscribe_trades(&self, security_id: &str) -> Result<(), ClientError> {
        self.record("unsubscribe_trades", unsubscribe(Feed::Trades, security_id))?;
        self.require_connected()
    }

    fn request_bars(
        &self,
        security_id: &str,
        timeframe_secs: u32,
        from: DateTime<Utc>,
        count: u32,
    ) -> Result<(), ClientError> {
        self.record(
            "request_bars",
            ClientCall::RequestBars {
                security_id: security_id.to_string(),
                timeframe_secs,
                from,
                count,
            },
        )?;
        self.require_connected()
    }
}

fn subscribe(feed: Feed, security_id: &str) -> ClientCall {
    ClientCall::Subscribe {
        feed,
        security_id: security_id.to_string(),
    }
}

fn unsubscribe(feed: Feed, security_id: &str) -> ClientCall {
    ClientCall::Unsubscribe {
        feed,
        security_id: security_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ClientEventKind>>);

    impl ClientEventHandler for Recorder {
        fn on_event(&self, event: ClientEvent) {
            self.0.lock().push(event.kind());
        }
    }

    fn bind_all(client: &LoopbackClient) -> Arc<Recorder> {
        let recorder = Arc::new(Recorder::default());
        for kind in ClientEventKind::ALL {
            client.bind(kind, Arc::clone(&recorder) as Arc<dyn ClientEventHandler>);
        }
        recorder
    }

    #[test]
    fn manual_raises_only_on_request() {
        let client = LoopbackClient::manual();
        let recorder = bind_all(&client);

        client.connect("h", 1, "u", "p").unwrap();
        assert!(recorder.0.lock().is_empty());

        assert!(client.raise(ClientEvent::Connected));
        assert_eq!(*recorder.0.lock(), vec![ClientEventKind::Connected]);
    }

    #[test]
    fn raise_without_handler() {
        let client = LoopbackClient::manual();
        assert!(!client.raise(ClientEvent::Connected));
    }

    #[test]
    fn fail_next_fails_once() {
        let client = LoopbackClient::manual();
        client.fail_next("disconnect", "nope");
        assert!(client.disconnect().is_err());
        assert!(client.disconnect().is_ok());
        assert_eq!(client.calls().len(), 2);
    }

    #[test]
    fn auto_acknowledges_orders() {
        let client = LoopbackClient::auto();
        let recorder = bind_all(&client);
        client.connect("h", 1, "u", "p").unwrap();

        let order = OrderRegisterMessage {
            transaction_id: 1,
            portfolio_name: DEMO_PORTFOLIO.to_string(),
            security_id: "SBER".to_string(),
            side: crate::domain::messages::Side::Buy,
            order_type: crate::domain::messages::OrderType::Limit,
            price: Decimal::new(250, 0),
            volume: Decimal::ONE,
            stop_price: None,
        };
        client.register_order(&order).unwrap();
        client.cancel_all_orders().unwrap();

        assert_eq!(
            *recorder.0.lock(),
            vec![
                ClientEventKind::Connected,
                ClientEventKind::NewOrder,
                ClientEventKind::OrderChanged,
                ClientEventKind::OrderChanged,
            ]
        );
    }

    #[test]
    fn auto_requires_session() {
        let client = LoopbackClient::auto();
        assert_eq!(client.request_portfolios(), Err(ClientError::NotConnected));
    }
}
