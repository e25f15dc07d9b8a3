//! Terminal Adapter
//!
//! Facade the host drives: one inbound message per call, outbound messages
//! through the host-supplied [`OutboundSink`].

use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;
use serde::Serialize;

use crate::application::error::AdapterError;
use crate::application::ports::{ClientEvent, ClientEventHandler, ClientEventKind, OutboundSink};
use crate::application::services::dispatcher;
use crate::application::services::factory::ClientFactory;
use crate::application::services::lifecycle::{
    ConnectionController, ConnectionState, CycleId, EventOutcome,
};
use crate::application::services::translator::{CycleCaches, OutboundTranslator};
use crate::domain::board::BoardCodeTable;
use crate::domain::messages::{InMessage, OutMessage};
use crate::domain::session::{Platform, SessionHolder};
use crate::infrastructure::metrics;

/// What the host must do for this adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdapterCapabilities {
    /// Portfolios are discovered through a lookup request.
    pub portfolio_lookup_required: bool,
    /// Securities are discovered through a lookup request.
    pub security_lookup_required: bool,
    /// Order status must be requested explicitly.
    pub order_status_required: bool,
}

impl AdapterCapabilities {
    /// Capabilities of the terminal adapter.
    pub const TERMINAL: Self = Self {
        portfolio_lookup_required: true,
        security_lookup_required: true,
        order_status_required: false,
    };
}

/// Shared state behind the facade and the bound event handlers.
pub(crate) struct AdapterCore {
    pub(crate) controller: ConnectionController,
    pub(crate) translator: OutboundTranslator,
    /// Serializes event delivery so outbound order follows event order.
    /// Re-entrant: the sink may feed inbound messages back on the same thread.
    delivery: ReentrantMutex<()>,
}

impl AdapterCore {
    pub(crate) fn new(controller: ConnectionController, translator: OutboundTranslator) -> Self {
        Self {
            controller,
            translator,
            delivery: ReentrantMutex::new(()),
        }
    }

    /// Route one client event raised for `cycle`.
    ///
    /// The stale check and state change happen under the controller lock;
    /// resulting messages are emitted after it is released.
    fn route(&self, cycle: CycleId, event: ClientEvent) {
        let _delivery = self.delivery.lock();
        let kind = event.kind();

        let messages = match event {
            ClientEvent::Connected => match self.controller.on_connected(cycle) {
                EventOutcome::Applied => Some(vec![OutMessage::Connect]),
                EventOutcome::Unchanged => Some(Vec::new()),
                EventOutcome::Stale => None,
            },
            ClientEvent::Disconnected { error } => self
                .controller
                .on_disconnected(cycle, error.as_deref())
                .is_current()
                .then(|| vec![OutMessage::Disconnect { error }]),
            business => self
                .controller
                .with_current(cycle, || self.translator.translate_event(business)),
        };

        let Some(messages) = messages else {
            tracing::debug!(cycle, kind = kind.as_str(), "Dropping event from stale cycle");
            metrics::record_stale_event(kind);
            return;
        };

        for message in messages {
            self.translator.emit(message);
        }
    }
}

/// Handler bound to every client event for one cycle.
pub(crate) struct CycleEventHandler {
    cycle: CycleId,
    core: Weak<AdapterCore>,
}

impl CycleEventHandler {
    pub(crate) const fn new(cycle: CycleId, core: Weak<AdapterCore>) -> Self {
        Self { cycle, core }
    }
}

impl ClientEventHandler for CycleEventHandler {
    fn on_event(&self, event: ClientEvent) {
        if let Some(core) = self.core.upgrade() {
            core.route(self.cycle, event);
        }
    }
}

/// Trading terminal message adapter.
pub struct TerminalAdapter {
    core: Arc<AdapterCore>,
}

impl TerminalAdapter {
    /// Create an idle adapter with the standard board table.
    #[must_use]
    pub fn new(
        session: Arc<SessionHolder>,
        factory: Arc<dyn ClientFactory>,
        sink: Arc<dyn OutboundSink>,
    ) -> Self {
        Self::with_boards(session, factory, sink, BoardCodeTable::standard())
    }

    /// Create an idle adapter with a custom board table.
    #[must_use]
    pub fn with_boards(
        session: Arc<SessionHolder>,
        factory: Arc<dyn ClientFactory>,
        sink: Arc<dyn OutboundSink>,
        boards: BoardCodeTable,
    ) -> Self {
        Self {
            core: Arc::new(AdapterCore::new(
                ConnectionController::new(factory, session),
                OutboundTranslator::new(sink, boards),
            )),
        }
    }

    /// Process one inbound message.
    ///
    /// # Errors
    ///
    /// - [`AdapterError::AlreadyConnected`] for a connect while a client exists.
    /// - [`AdapterError::NotConnected`] for any other message while idle.
    /// - [`AdapterError::UnsupportedVersion`] if no client can be built.
    /// - [`AdapterError::Client`] if the client refused the call.
    pub fn send_in_message(&self, message: InMessage) -> Result<(), AdapterError> {
        dispatcher::dispatch(&self.core, message)
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.core.controller.state()
    }

    /// Cycle of the live client, if any.
    #[must_use]
    pub fn current_cycle(&self) -> Option<CycleId> {
        self.core.controller.current_cycle()
    }

    /// Events bound on the live client.
    #[must_use]
    pub fn bound_events(&self) -> Vec<ClientEventKind> {
        self.core.controller.bound_events()
    }

    /// Copy of the per-cycle caches.
    #[must_use]
    pub fn caches(&self) -> CycleCaches {
        self.core.translator.caches()
    }

    /// Orders whose terminal id is still tracked.
    #[must_use]
    pub fn tracked_orders(&self) -> usize {
        self.core.translator.tracked_orders()
    }

    /// When the current connect attempt was issued, while connecting.
    #[must_use]
    pub fn connecting_since(&self) -> Option<std::time::Instant> {
        self.core.controller.connecting_since()
    }

    /// Client binary platform for the configured version.
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.core.controller.session().platform()
    }

    /// Shared session configuration.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionHolder> {
        self.core.controller.session()
    }

    /// Host obligations.
    #[must_use]
    pub const fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::TERMINAL
    }
}

impl std::fmt::Debug for TerminalAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalAdapter")
            .field("controller", &self.core.controller)
            .field("translator", &self.core.translator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::factory::{ClientTarget, VersionedClientFactory};
    use crate::domain::session::{Bitness, ServerAddress, SessionConfig, TerminalVersion};
    use crate::infrastructure::bus::ChannelSink;
    use crate::domain::messages::PortfolioLookupMessage;
    use crate::infrastructure::loopback::{ClientCall, LoopbackClient};
    use parking_lot::Mutex;
    use std::sync::OnceLock;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn adapter(client: Arc<LoopbackClient>) -> (TerminalAdapter, UnboundedReceiver<OutMessage>) {
        let factory = VersionedClientFactory::with_bitness(Bitness::X64).with_builder(
            ClientTarget::V3X64,
            move |_| Arc::clone(&client) as Arc<dyn crate::application::ports::TerminalClient>,
        );
        let session = SessionHolder::new(SessionConfig::new(
            TerminalVersion::V3,
            ServerAddress::new("localhost", 8443),
            "u",
            "p",
        ));
        let (sink, rx) = ChannelSink::unbounded();
        (
            TerminalAdapter::new(Arc::new(session), Arc::new(factory), Arc::new(sink)),
            rx,
        )
    }

    #[test]
    fn capabilities_flags() {
        let (adapter, _rx) = adapter(Arc::new(LoopbackClient::manual()));
        let caps = adapter.capabilities();
        assert!(caps.portfolio_lookup_required);
        assert!(caps.security_lookup_required);
        assert!(!caps.order_status_required);
    }

    #[test]
    fn platform_follows_version() {
        let (adapter, _rx) = adapter(Arc::new(LoopbackClient::manual()));
        assert_eq!(adapter.platform(), Platform::AnyCpu);
        adapter.session().set_version(TerminalVersion::V2);
        assert_eq!(adapter.platform(), Platform::X86);
    }

    #[test]
    fn connected_event_emits_once() {
        let client = Arc::new(LoopbackClient::manual());
        let (adapter, mut rx) = adapter(Arc::clone(&client));

        adapter.send_in_message(InMessage::Connect).unwrap();
        client.raise(ClientEvent::Connected);
        client.raise(ClientEvent::Connected);

        assert_eq!(adapter.state(), ConnectionState::Connected);
        assert_eq!(rx.try_recv().ok(), Some(OutMessage::Connect));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropping_adapter_unbinds_client() {
        let client = Arc::new(LoopbackClient::manual());
        let (adapter, _rx) = adapter(Arc::clone(&client));
        adapter.send_in_message(InMessage::Connect).unwrap();
        assert_eq!(client.bound_kinds().len(), 18);

        drop(adapter);
        assert!(client.bound_kinds().is_empty());
    }

    /// Requests portfolios from inside `send_out` when it sees `Connect`.
    #[derive(Default)]
    struct LookupOnConnect {
        adapter: OnceLock<Weak<TerminalAdapter>>,
        seen: Mutex<Vec<OutMessage>>,
        lookups: Mutex<Vec<Result<(), AdapterError>>>,
    }

    impl OutboundSink for LookupOnConnect {
        fn send_out(&self, message: OutMessage) {
            let is_connect = message == OutMessage::Connect;
            self.seen.lock().push(message);
            if !is_connect {
                return;
            }
            if let Some(adapter) = self.adapter.get().and_then(Weak::upgrade) {
                let lookup = PortfolioLookupMessage { transaction_id: 1 };
                let result = adapter.send_in_message(InMessage::PortfolioLookup(lookup));
                self.lookups.lock().push(result);
            }
        }
    }

    #[test]
    fn sink_may_send_inbound_messages_on_connect() {
        let client = Arc::new(LoopbackClient::manual());
        let shared = Arc::clone(&client);
        let factory = VersionedClientFactory::with_bitness(Bitness::X64).with_builder(
            ClientTarget::V3X64,
            move |_| Arc::clone(&shared) as Arc<dyn crate::application::ports::TerminalClient>,
        );
        let session = SessionHolder::new(SessionConfig::new(
            TerminalVersion::V3,
            ServerAddress::new("localhost", 8443),
            "u",
            "p",
        ));
        let sink = Arc::new(LookupOnConnect::default());
        let adapter = Arc::new(TerminalAdapter::new(
            Arc::new(session),
            Arc::new(factory),
            Arc::clone(&sink) as Arc<dyn OutboundSink>,
        ));
        sink.adapter.set(Arc::downgrade(&adapter)).unwrap();

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let worker = {
            let adapter = Arc::clone(&adapter);
            let client = Arc::clone(&client);
            std::thread::spawn(move || {
                adapter.send_in_message(InMessage::Connect).unwrap();
                client.raise(ClientEvent::Connected);
                done_tx.send(()).unwrap();
            })
        };

        assert!(
            done_rx.recv_timeout(Duration::from_secs(5)).is_ok(),
            "connect did not complete"
        );
        worker.join().unwrap();

        assert_eq!(adapter.state(), ConnectionState::Connected);
        assert_eq!(*sink.seen.lock(), vec![OutMessage::Connect]);
        assert_eq!(*sink.lookups.lock(), vec![Ok(())]);
        assert!(client.calls().contains(&ClientCall::RequestPortfolios));
        assert_eq!(adapter.caches().portfolio_lookup, Some(1));
    }
}
