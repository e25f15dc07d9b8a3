//! Inbound Dispatcher
//!
//! Routes each inbound message to a lifecycle operation or to one call on
//! the live client.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::application::error::AdapterError;
use crate::application::ports::{ClientError, TerminalClient};
use crate::application::services::adapter::{AdapterCore, CycleEventHandler};
use crate::application::services::translator::{CandleKey, LOOKUP_IN_PROGRESS};
use crate::domain::messages::{
    ExecutionMessage, InMessage, LookupResultMessage, MarketDataMessage, MarketDataType,
    OrderCancelMessage, OrderReplaceMessage, OutMessage, PortfolioLookupMessage,
    PortfolioMessage, SecurityLookupMessage, TransactionId,
};
use crate::infrastructure::metrics;

/// Dispatch one inbound message.
pub(crate) fn dispatch(core: &Arc<AdapterCore>, message: InMessage) -> Result<(), AdapterError> {
    let kind = message.kind();
    let started = Instant::now();
    metrics::record_inbound_message(kind);

    let result = match message {
        InMessage::Connect => connect(core),
        InMessage::Disconnect => core.controller.disconnect(),
        InMessage::OrderRegister(order) => {
            call(core, |client| client.register_order(&order))
        }
        InMessage::OrderCancel(cancel) => cancel_order(core, &cancel),
        InMessage::OrderGroupCancel(_) => call(core, |client| client.cancel_all_orders()),
        InMessage::OrderReplace(replace) => replace_order(core, &replace),
        InMessage::Portfolio(portfolio) => subscribe_portfolio(core, &portfolio),
        InMessage::PortfolioLookup(lookup) => portfolio_lookup(core, &lookup),
        InMessage::MarketData(request) => market_data(core, &request),
        InMessage::SecurityLookup(lookup) => security_lookup(core, &lookup),
        InMessage::Unsupported => {
            tracing::warn!("Ignoring inbound message of unsupported type");
            Ok(())
        }
    };

    if let Err(ref e) = result {
        tracing::warn!(kind = kind.as_str(), error = %e, "Inbound message rejected");
        metrics::record_adapter_error(e);
    }
    metrics::record_dispatch_duration(kind, started.elapsed());
    result
}

fn connect(core: &Arc<AdapterCore>) -> Result<(), AdapterError> {
    let weak = Arc::downgrade(core);
    core.controller
        .connect(|cycle| {
            core.translator.reset_cycle();
            Arc::new(CycleEventHandler::new(cycle, weak))
        })
        .map(|_| ())
}

/// Run one call on the live client.
fn call<F>(core: &AdapterCore, f: F) -> Result<(), AdapterError>
where
    F: FnOnce(&dyn TerminalClient) -> Result<(), ClientError>,
{
    let client = core.controller.client()?;
    f(client.as_ref()).map_err(AdapterError::from)
}

fn cancel_order(core: &AdapterCore, cancel: &OrderCancelMessage) -> Result<(), AdapterError> {
    let client = core.controller.client()?;

    let order_id = cancel
        .order_id
        .clone()
        .or_else(|| core.translator.order_id_for(cancel.order_transaction_id));

    let Some(order_id) = order_id else {
        tracing::warn!(
            transaction_id = cancel.transaction_id,
            order_transaction_id = cancel.order_transaction_id,
            "Cancel for order with unknown terminal id"
        );
        core.translator
            .emit(OutMessage::Execution(ExecutionMessage::failure(
                Some(cancel.transaction_id),
                None,
                format!(
                    "no terminal order id known for transaction {}",
                    cancel.order_transaction_id
                ),
                Utc::now(),
            )));
        return Ok(());
    };

    client
        .cancel_order(&cancel.portfolio_name, &cancel.security_id, &order_id)
        .map_err(AdapterError::from)
}

fn replace_order(core: &AdapterCore, replace: &OrderReplaceMessage) -> Result<(), AdapterError> {
    let client = core.controller.client()?;
    let id = replace.transaction_id;

    // Recorded first: the client may report the replacement synchronously.
    core.translator.begin_replace(id, &replace.old_order_id);
    client.replace_order(replace).map_err(|e| {
        core.translator.abort_replace(id);
        AdapterError::from(e)
    })
}

fn subscribe_portfolio(
    core: &AdapterCore,
    portfolio: &PortfolioMessage,
) -> Result<(), AdapterError> {
    call(core, |client| {
        if portfolio.is_subscribe {
            client.subscribe_portfolio(&portfolio.portfolio_name)
        } else {
            client.unsubscribe_portfolio(&portfolio.portfolio_name)
        }
    })
}

fn portfolio_lookup(
    core: &AdapterCore,
    lookup: &PortfolioLookupMessage,
) -> Result<(), AdapterError> {
    let client = core.controller.client()?;
    let id = lookup.transaction_id;

    if !core.translator.begin_portfolio_lookup(id) {
        core.translator
            .emit(OutMessage::PortfolioLookupResult(in_progress(id)));
        return Ok(());
    }

    client.request_portfolios().map_err(|e| {
        core.translator.abort_portfolio_lookup(id);
        AdapterError::from(e)
    })
}

fn security_lookup(
    core: &AdapterCore,
    lookup: &SecurityLookupMessage,
) -> Result<(), AdapterError> {
    let client = core.controller.client()?;
    let id = lookup.transaction_id;

    if !core.translator.begin_security_lookup(id) {
        core.translator
            .emit(OutMessage::SecurityLookupResult(in_progress(id)));
        return Ok(());
    }

    if let Some(code) = &lookup.security_code {
        tracing::debug!(transaction_id = id, code, "Security lookup returns the full list");
    }

    client.lookup_securities().map_err(|e| {
        core.translator.abort_security_lookup(id);
        AdapterError::from(e)
    })
}

fn market_data(core: &AdapterCore, request: &MarketDataMessage) -> Result<(), AdapterError> {
    let client = core.controller.client()?;
    let security = request.security_id.as_str();

    let result = match (&request.data_type, request.is_subscribe) {
        (MarketDataType::Level1, true) => client.subscribe_level1(security),
        (MarketDataType::Level1, false) => client.unsubscribe_level1(security),
        (MarketDataType::MarketDepth, true) => client.subscribe_market_depth(security),
        (MarketDataType::MarketDepth, false) => client.unsubscribe_market_depth(security),
        (MarketDataType::Trades, true) => client.subscribe_trades(security),
        (MarketDataType::Trades, false) => client.unsubscribe_trades(security),
        (MarketDataType::Candles(candles), true) => {
            let key = CandleKey::new(security, candles.timeframe_secs);
            core.translator
                .record_candle_request(key.clone(), request.transaction_id);
            client
                .request_bars(security, candles.timeframe_secs, candles.from, candles.count)
                .inspect_err(|_| {
                    core.translator.forget_candle_request(&key);
                })
        }
        (MarketDataType::Candles(candles), false) => {
            core.translator
                .forget_candle_request(&CandleKey::new(security, candles.timeframe_secs));
            Ok(())
        }
    };

    result.map_err(AdapterError::from)
}

fn in_progress(id: TransactionId) -> LookupResultMessage {
    LookupResultMessage {
        original_transaction_id: id,
        error: Some(LOOKUP_IN_PROGRESS.to_string()),
    }
}
