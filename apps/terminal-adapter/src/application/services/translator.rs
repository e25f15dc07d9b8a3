//! Outbound Translator
//!
//! Converts business events raised by the terminal client into outbound
//! messages. Partial updates (order book rows, bar rows, list rows) are
//! accumulated in [`CycleCaches`], which live for exactly one connection
//! cycle.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::application::ports::{
    BarRow, ClientEvent, DepthRow, OrderUpdate, OutboundSink, OwnTrade, PortfolioRow,
    SecurityRow, SecurityUpdate,
};
use crate::domain::board::BoardCodeTable;
use crate::domain::messages::{
    CandleMessage, ExecutionKind, ExecutionMessage, Level1ChangeMessage, LookupResultMessage,
    OrderState, OutMessage, PortfolioChangeMessage, PortfolioOutMessage, PositionChangeMessage,
    QuoteChangeMessage, QuoteLevel, SecurityMessage, TickMessage, TransactionId,
};
use crate::infrastructure::metrics;

/// Error text of a lookup rejected because another one is outstanding.
pub const LOOKUP_IN_PROGRESS: &str = "lookup already in progress";

// =============================================================================
// Per-Cycle Caches
// =============================================================================

/// Order book rows received so far for one security.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepthAccumulator {
    /// Bid levels in arrival order.
    pub bids: Vec<QuoteLevel>,
    /// Ask levels in arrival order.
    pub asks: Vec<QuoteLevel>,
}

/// Key of an outstanding candle request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandleKey {
    /// Security code.
    pub security_id: String,
    /// Bar length in seconds.
    pub timeframe_secs: u32,
}

impl CandleKey {
    /// Build a key.
    #[must_use]
    pub fn new(security_id: impl Into<String>, timeframe_secs: u32) -> Self {
        Self {
            security_id: security_id.into(),
            timeframe_secs,
        }
    }
}

/// Last best bid/ask seen for one security.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BestQuote {
    /// Best bid price.
    pub bid_price: Option<Decimal>,
    /// Best bid volume.
    pub bid_volume: Option<Decimal>,
    /// Best ask price.
    pub ask_price: Option<Decimal>,
    /// Best ask volume.
    pub ask_volume: Option<Decimal>,
}

/// Transient state scoped to one connection cycle.
///
/// `CycleCaches::default()` is the state right after a connect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleCaches {
    /// Order book snapshots being assembled, by security.
    pub depths: HashMap<String, DepthAccumulator>,
    /// Transaction id of each outstanding candle request.
    pub candle_transactions: HashMap<CandleKey, TransactionId>,
    /// Best quotes, by security.
    pub best_quotes: HashMap<String, BestQuote>,
    /// Outstanding portfolio lookup.
    pub portfolio_lookup: Option<TransactionId>,
    /// Outstanding security lookup.
    pub security_lookup: Option<TransactionId>,
}

impl CycleCaches {
    /// Whether every cache is in its initial state.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Terminal order ids by transaction id, and back.
///
/// Kept across cycles: orders outlive a connection. An order leaves the
/// registry once it reaches a final state or is replaced.
#[derive(Debug, Default)]
struct OrderIds {
    by_transaction: HashMap<TransactionId, String>,
    by_order: HashMap<String, TransactionId>,
    /// Old order id of each outstanding replace, by replace transaction.
    replacing: HashMap<TransactionId, String>,
}

impl OrderIds {
    fn record(&mut self, transaction_id: TransactionId, order_id: &str) {
        if transaction_id == 0 || order_id.is_empty() {
            return;
        }
        let previous = self
            .by_transaction
            .insert(transaction_id, order_id.to_string());
        if let Some(previous) = previous.filter(|p| p != order_id) {
            self.by_order.remove(&previous);
        }
        self.by_order.insert(order_id.to_string(), transaction_id);
    }

    fn forget(&mut self, order_id: &str) {
        let Some(transaction_id) = self.by_order.remove(order_id) else {
            return;
        };
        if self
            .by_transaction
            .get(&transaction_id)
            .is_some_and(|id| id == order_id)
        {
            self.by_transaction.remove(&transaction_id);
        }
    }

    fn transaction_of(&self, order_id: &str) -> Option<TransactionId> {
        self.by_order.get(order_id).copied()
    }

    fn len(&self) -> usize {
        self.by_order.len()
    }
}

#[derive(Debug, Default)]
struct TranslatorState {
    caches: CycleCaches,
    orders: OrderIds,
}

// =============================================================================
// Translator
// =============================================================================

/// Writes outbound messages for client events.
pub struct OutboundTranslator {
    sink: Arc<dyn OutboundSink>,
    boards: BoardCodeTable,
    state: Mutex<TranslatorState>,
}

impl OutboundTranslator {
    /// Create a translator emitting into `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn OutboundSink>, boards: BoardCodeTable) -> Self {
        Self {
            sink,
            boards,
            state: Mutex::new(TranslatorState::default()),
        }
    }

    /// Clear every per-cycle cache and lookup id.
    pub fn reset_cycle(&self) {
        let mut state = self.state.lock();
        if !state.caches.is_empty() {
            tracing::debug!(
                depths = state.caches.depths.len(),
                candles = state.caches.candle_transactions.len(),
                quotes = state.caches.best_quotes.len(),
                "Clearing caches of previous cycle"
            );
        }
        state.caches = CycleCaches::default();
    }

    /// Copy of the per-cycle caches.
    #[must_use]
    pub fn caches(&self) -> CycleCaches {
        self.state.lock().caches.clone()
    }

    /// Terminal order id recorded for `transaction_id`.
    #[must_use]
    pub fn order_id_for(&self, transaction_id: TransactionId) -> Option<String> {
        self.state
            .lock()
            .orders
            .by_transaction
            .get(&transaction_id)
            .cloned()
    }

    /// Number of orders in the order-id registry.
    #[must_use]
    pub fn tracked_orders(&self) -> usize {
        self.state.lock().orders.len()
    }

    /// Remember which order a replace request under `transaction_id` replaces.
    pub fn begin_replace(&self, transaction_id: TransactionId, old_order_id: &str) {
        self.state
            .lock()
            .orders
            .replacing
            .insert(transaction_id, old_order_id.to_string());
    }

    /// Forget a replace request the client refused.
    pub fn abort_replace(&self, transaction_id: TransactionId) {
        self.state.lock().orders.replacing.remove(&transaction_id);
    }

    /// Write one message to the outbound pipe.
    pub fn emit(&self, message: OutMessage) {
        metrics::record_outbound_message(message.kind());
        self.sink.send_out(message);
    }

    /// Translate one business event and emit the result.
    ///
    /// Lifecycle events are not handled here and are ignored.
    pub fn translate(&self, event: ClientEvent) {
        for message in self.translate_event(event) {
            self.emit(message);
        }
    }

    /// Translate one business event without emitting it.
    ///
    /// Updates the caches and the order-id registry. Emission is left to the
    /// caller so it can happen outside any adapter lock.
    pub fn translate_event(&self, event: ClientEvent) -> Vec<OutMessage> {
        let mut state = self.state.lock();
        self.translate_locked(&mut state, event)
    }

    // -------------------------------------------------------------------------
    // Lookup and candle bookkeeping
    // -------------------------------------------------------------------------

    /// Mark a portfolio lookup outstanding. Returns `false` if another one is.
    pub fn begin_portfolio_lookup(&self, transaction_id: TransactionId) -> bool {
        let mut state = self.state.lock();
        if state.caches.portfolio_lookup.is_some() {
            return false;
        }
        state.caches.portfolio_lookup = Some(transaction_id);
        true
    }

    /// Forget an outstanding portfolio lookup.
    pub fn abort_portfolio_lookup(&self, transaction_id: TransactionId) {
        let mut state = self.state.lock();
        if state.caches.portfolio_lookup == Some(transaction_id) {
            state.caches.portfolio_lookup = None;
        }
    }

    /// Mark a security lookup outstanding. Returns `false` if another one is.
    pub fn begin_security_lookup(&self, transaction_id: TransactionId) -> bool {
        let mut state = self.state.lock();
        if state.caches.security_lookup.is_some() {
            return false;
        }
        state.caches.security_lookup = Some(transaction_id);
        true
    }

    /// Forget an outstanding security lookup.
    pub fn abort_security_lookup(&self, transaction_id: TransactionId) {
        let mut state = self.state.lock();
        if state.caches.security_lookup == Some(transaction_id) {
            state.caches.security_lookup = None;
        }
    }

    /// Remember the transaction a candle request was issued under.
    pub fn record_candle_request(&self, key: CandleKey, transaction_id: TransactionId) {
        self.state
            .lock()
            .caches
            .candle_transactions
            .insert(key, transaction_id);
    }

    /// Forget a candle request.
    pub fn forget_candle_request(&self, key: &CandleKey) -> Option<TransactionId> {
        self.state.lock().caches.candle_transactions.remove(key)
    }

    // -------------------------------------------------------------------------
    // Event translation
    // -------------------------------------------------------------------------

    fn translate_locked(&self, state: &mut TranslatorState, event: ClientEvent) -> Vec<OutMessage> {
        let now = Utc::now();
        match event {
            ClientEvent::NewPortfolio(row) => self.portfolio(&mut state.caches, row),
            ClientEvent::PortfolioChanged(update) => {
                vec![OutMessage::PortfolioChange(PortfolioChangeMessage {
                    portfolio_name: update.name,
                    cash: update.cash,
                    leverage: update.leverage,
                    commission: update.commission,
                    balance: update.balance,
                })]
            }
            ClientEvent::PositionChanged(update) => {
                vec![OutMessage::PositionChange(PositionChangeMessage {
                    portfolio_name: update.portfolio,
                    security_id: update.security_id,
                    average_price: update.average_price,
                    current_value: update.amount,
                    planned_value: update.planned,
                })]
            }
            ClientEvent::NewMyTrade(trade) => vec![own_trade(&state.orders, trade)],
            ClientEvent::NewOrder {
                transaction_id,
                order_id,
            } => {
                state.orders.record(transaction_id, &order_id);
                let mut msg = ExecutionMessage::new(ExecutionKind::Order, now);
                msg.original_transaction_id = Some(transaction_id);
                msg.order_id = Some(order_id);
                msg.order_state = Some(OrderState::Active);
                vec![OutMessage::Execution(msg)]
            }
            ClientEvent::OrderFailed {
                transaction_id,
                reason,
            } => vec![OutMessage::Execution(ExecutionMessage::failure(
                Some(transaction_id),
                None,
                reason,
                now,
            ))],
            ClientEvent::OrderCancelFailed { order_id, reason } => {
                let original = state.orders.transaction_of(&order_id);
                // The order itself stays alive.
                vec![OutMessage::Execution(ExecutionMessage {
                    order_state: None,
                    ..ExecutionMessage::failure(original, Some(order_id), reason, now)
                })]
            }
            ClientEvent::OrderChanged(update) => vec![order_changed(&mut state.orders, update)],
            ClientEvent::OrderReRegisterFailed {
                transaction_id,
                order_id,
                reason,
            } => {
                state.orders.replacing.remove(&transaction_id);
                vec![OutMessage::Execution(ExecutionMessage {
                    order_state: None,
                    ..ExecutionMessage::failure(Some(transaction_id), Some(order_id), reason, now)
                })]
            }
            ClientEvent::OrderReRegistered {
                transaction_id,
                order_id,
            } => {
                if let Some(old) = state.orders.replacing.remove(&transaction_id) {
                    state.orders.forget(&old);
                }
                state.orders.record(transaction_id, &order_id);
                let mut msg = ExecutionMessage::new(ExecutionKind::Order, now);
                msg.original_transaction_id = Some(transaction_id);
                msg.order_id = Some(order_id);
                msg.order_state = Some(OrderState::Active);
                vec![OutMessage::Execution(msg)]
            }
            ClientEvent::NewSecurity(row) => self.security(&mut state.caches, row),
            ClientEvent::SecurityChanged(update) => vec![level1(&mut state.caches, update)],
            ClientEvent::QuoteChanged(row) => {
                depth_row(&mut state.caches, row).into_iter().collect()
            }
            ClientEvent::NewTrade(tick) => vec![tick_message(tick, false)],
            ClientEvent::NewHistoryTrade(tick) => vec![tick_message(tick, true)],
            ClientEvent::NewBar(bar) => vec![candle(&mut state.caches, bar)],
            ClientEvent::Connected | ClientEvent::Disconnected { .. } => {
                tracing::debug!(
                    kind = event.kind().as_str(),
                    "Lifecycle event ignored by translator"
                );
                Vec::new()
            }
        }
    }

    fn portfolio(&self, caches: &mut CycleCaches, row: PortfolioRow) -> Vec<OutMessage> {
        let mut out = vec![OutMessage::Portfolio(PortfolioOutMessage {
            portfolio_name: row.name,
            board_code: self.boards.resolve(&row.exchange),
        })];

        if is_last_row(row.row, row.count) {
            if let Some(id) = caches.portfolio_lookup.take() {
                out.push(OutMessage::PortfolioLookupResult(LookupResultMessage {
                    original_transaction_id: id,
                    error: None,
                }));
            }
        }
        out
    }

    fn security(&self, caches: &mut CycleCaches, row: SecurityRow) -> Vec<OutMessage> {
        let mut out = vec![OutMessage::Security(SecurityMessage {
            security_id: row.security_id,
            name: row.name,
            short_name: row.short_name,
            board_code: self.boards.resolve(&row.board),
            price_step: row.price_step,
            lot_size: row.lot_size,
            expiry: row.expiry,
        })];

        if is_last_row(row.row, row.count) {
            if let Some(id) = caches.security_lookup.take() {
                out.push(OutMessage::SecurityLookupResult(LookupResultMessage {
                    original_transaction_id: id,
                    error: None,
                }));
            }
        }
        out
    }
}

impl std::fmt::Debug for OutboundTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundTranslator")
            .field("boards", &self.boards.len())
            .finish_non_exhaustive()
    }
}

const fn is_last_row(row: u32, count: u32) -> bool {
    row.saturating_add(1) >= count
}

fn own_trade(orders: &OrderIds, trade: OwnTrade) -> OutMessage {
    let mut msg = ExecutionMessage::new(ExecutionKind::Trade, trade.time);
    msg.original_transaction_id = orders.transaction_of(&trade.order_id);
    msg.order_id = Some(trade.order_id);
    msg.portfolio_name = Some(trade.portfolio);
    msg.security_id = Some(trade.security_id);
    msg.trade_id = Some(trade.trade_id);
    msg.price = Some(trade.price);
    msg.volume = Some(trade.volume);
    OutMessage::Execution(msg)
}

fn order_changed(orders: &mut OrderIds, update: OrderUpdate) -> OutMessage {
    if matches!(update.state, OrderState::Done | OrderState::Failed) {
        orders.forget(&update.order_id);
    } else {
        orders.record(update.transaction_id, &update.order_id);
    }

    let mut msg = ExecutionMessage::new(ExecutionKind::Order, update.time);
    msg.original_transaction_id = (update.transaction_id != 0).then_some(update.transaction_id);
    msg.order_id = Some(update.order_id);
    msg.portfolio_name = Some(update.portfolio);
    msg.security_id = Some(update.security_id);
    msg.order_state = Some(update.state);
    msg.side = Some(update.side);
    msg.price = Some(update.price);
    msg.volume = Some(update.volume);
    msg.balance = Some(update.balance);
    OutMessage::Execution(msg)
}

/// Level 1 message; best bid/ask fields are set only when they moved.
fn level1(caches: &mut CycleCaches, update: SecurityUpdate) -> OutMessage {
    let cached = caches
        .best_quotes
        .entry(update.security_id.clone())
        .or_default();

    let changed = |new: Option<Decimal>, old: &mut Option<Decimal>| {
        if new.is_some() && new != *old {
            *old = new;
            new
        } else {
            None
        }
    };

    let best_bid_price = changed(update.bid, &mut cached.bid_price);
    let best_bid_volume = changed(update.bid_volume, &mut cached.bid_volume);
    let best_ask_price = changed(update.ask, &mut cached.ask_price);
    let best_ask_volume = changed(update.ask_volume, &mut cached.ask_volume);

    OutMessage::Level1Change(Level1ChangeMessage {
        security_id: update.security_id,
        last_price: update.last_price,
        best_bid_price,
        best_bid_volume,
        best_ask_price,
        best_ask_volume,
        open_interest: update.open_interest,
        server_time: update.time,
    })
}

/// Accumulate one book row; the last row yields the consolidated book.
fn depth_row(caches: &mut CycleCaches, row: DepthRow) -> Option<OutMessage> {
    let book = caches.depths.entry(row.security_id.clone()).or_default();

    if row.row == 0 {
        book.bids.clear();
        book.asks.clear();
    }

    if let Some(price) = row.bid.filter(|_| row.bid_volume > Decimal::ZERO) {
        book.bids.push(QuoteLevel {
            price,
            volume: row.bid_volume,
        });
    }
    if let Some(price) = row.ask.filter(|_| row.ask_volume > Decimal::ZERO) {
        book.asks.push(QuoteLevel {
            price,
            volume: row.ask_volume,
        });
    }

    if !is_last_row(row.row, row.count) {
        return None;
    }

    let DepthAccumulator { mut bids, mut asks } =
        caches.depths.remove(&row.security_id).unwrap_or_default();
    bids.sort_by(|a, b| b.price.cmp(&a.price));
    asks.sort_by(|a, b| a.price.cmp(&b.price));

    Some(OutMessage::QuoteChange(QuoteChangeMessage {
        security_id: row.security_id,
        bids,
        asks,
        server_time: Utc::now(),
    }))
}

fn tick_message(tick: crate::application::ports::TradeTick, is_history: bool) -> OutMessage {
    OutMessage::Tick(TickMessage {
        security_id: tick.security_id,
        trade_id: tick.trade_id,
        price: tick.price,
        volume: tick.volume,
        side: tick.side,
        is_history,
        server_time: tick.time,
    })
}

fn candle(caches: &mut CycleCaches, bar: BarRow) -> OutMessage {
    let key = CandleKey::new(bar.security_id.clone(), bar.timeframe_secs);
    let is_finished = is_last_row(bar.row, bar.count);
    let original_transaction_id = if is_finished {
        caches.candle_transactions.remove(&key)
    } else {
        caches.candle_transactions.get(&key).copied()
    };

    OutMessage::Candle(CandleMessage {
        original_transaction_id,
        security_id: bar.security_id,
        timeframe_secs: bar.timeframe_secs,
        open_time: bar.time,
        open: bar.open,
        high: bar.high,
        low: bar.low,
        close: bar.close,
        volume: bar.volume,
        open_interest: bar.open_interest,
        is_finished,
    })
}
