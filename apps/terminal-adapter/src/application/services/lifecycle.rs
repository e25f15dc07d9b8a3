//! Connection Lifecycle Controller
//!
//! Owns the single live terminal client and its event binding.
//!
//! ```text
//!   Idle ──connect()──► Connecting ──Connected event──► Connected
//!    ▲                      │                               │
//!    │                      └──────disconnect()─────┐       │
//!    │                                              ▼       │
//!    └──────Disconnected event────────────── Disconnecting ◄┘
//! ```
//!
//! A Disconnected event tears the session down from any non-idle state.
//! Every state change happens under one mutex. Client lifecycle calls
//! (`connect`, `disconnect`) are made with the mutex released because a
//! client may raise events synchronously from inside them.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

use crate::application::error::AdapterError;
use crate::application::ports::{ClientEventHandler, ClientEventKind, TerminalClient};
use crate::application::services::factory::ClientFactory;
use crate::domain::session::SessionHolder;
use crate::infrastructure::metrics;

/// Sequence number of one connect-to-disconnect span.
pub type CycleId = u64;

/// Adapter connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No client handle.
    #[default]
    Idle,
    /// Client built, events bound, connect issued.
    Connecting,
    /// Connected event observed.
    Connected,
    /// Disconnect issued.
    Disconnecting,
}

impl ConnectionState {
    /// State name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        }
    }

    /// Numeric value exported as a gauge.
    #[must_use]
    pub const fn as_gauge(&self) -> f64 {
        match self {
            Self::Idle => 0.0,
            Self::Connecting => 1.0,
            Self::Connected => 2.0,
            Self::Disconnecting => 3.0,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Event Binding
// =============================================================================

/// Every client event bound to one handler for as long as this value lives.
///
/// Dropping the binding unbinds exactly the events it bound.
pub struct EventBinding {
    client: Arc<dyn TerminalClient>,
    bound: Vec<ClientEventKind>,
}

impl EventBinding {
    /// Bind all events in [`ClientEventKind::ALL`] to `handler`.
    #[must_use]
    pub fn bind(client: Arc<dyn TerminalClient>, handler: &Arc<dyn ClientEventHandler>) -> Self {
        for kind in ClientEventKind::ALL {
            client.bind(kind, Arc::clone(handler));
        }

        Self {
            client,
            bound: ClientEventKind::ALL.to_vec(),
        }
    }

    /// Events currently bound.
    #[must_use]
    pub fn kinds(&self) -> &[ClientEventKind] {
        &self.bound
    }

    /// The bound client.
    #[must_use]
    pub fn client(&self) -> Arc<dyn TerminalClient> {
        Arc::clone(&self.client)
    }

    /// Unbind now. Returns how many events were unbound.
    pub fn release(mut self) -> usize {
        self.unbind_all()
    }

    fn unbind_all(&mut self) -> usize {
        let count = self.bound.len();
        for kind in self.bound.drain(..) {
            self.client.unbind(kind);
        }
        count
    }
}

impl Drop for EventBinding {
    fn drop(&mut self) {
        self.unbind_all();
    }
}

impl fmt::Debug for EventBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBinding")
            .field("bound", &self.bound.len())
            .finish_non_exhaustive()
    }
}

/// What a lifecycle event did to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event belongs to a cycle that is no longer live.
    Stale,
    /// Live cycle, but the state did not change.
    Unchanged,
    /// The state changed.
    Applied,
}

impl EventOutcome {
    /// Whether the event belonged to the live cycle.
    #[must_use]
    pub const fn is_current(self) -> bool {
        !matches!(self, Self::Stale)
    }
}

/// The live client of one cycle.
#[derive(Debug)]
struct LiveSession {
    cycle: CycleId,
    binding: EventBinding,
}

#[derive(Debug, Default)]
struct ControllerInner {
    state: ConnectionState,
    session: Option<LiveSession>,
    last_cycle: CycleId,
    connecting_since: Option<Instant>,
}

impl ControllerInner {
    fn is_current(&self, cycle: CycleId) -> bool {
        self.session.as_ref().is_some_and(|s| s.cycle == cycle)
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "Connection state transition");
        }
        self.state = next;
        self.connecting_since = (next == ConnectionState::Connecting).then(Instant::now);
        metrics::set_connection_state(next);
    }

    /// Unbind and drop the session, returning how many events were unbound.
    fn teardown(&mut self) -> Option<(CycleId, usize)> {
        let session = self.session.take()?;
        let unbound = session.binding.release();
        self.transition(ConnectionState::Idle);
        Some((session.cycle, unbound))
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Owns the only reference to the live client.
pub struct ConnectionController {
    factory: Arc<dyn ClientFactory>,
    session: Arc<SessionHolder>,
    inner: Mutex<ControllerInner>,
}

impl ConnectionController {
    /// Create an idle controller.
    #[must_use]
    pub fn new(factory: Arc<dyn ClientFactory>, session: Arc<SessionHolder>) -> Self {
        Self {
            factory,
            session,
            inner: Mutex::new(ControllerInner::default()),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Cycle of the live client, if any.
    #[must_use]
    pub fn current_cycle(&self) -> Option<CycleId> {
        self.inner.lock().session.as_ref().map(|s| s.cycle)
    }

    /// When the current connect attempt was issued, while `Connecting`.
    #[must_use]
    pub fn connecting_since(&self) -> Option<Instant> {
        self.inner.lock().connecting_since
    }

    /// Events bound on the live client (empty when idle).
    #[must_use]
    pub fn bound_events(&self) -> Vec<ClientEventKind> {
        self.inner
            .lock()
            .session
            .as_ref()
            .map(|s| s.binding.kinds().to_vec())
            .unwrap_or_default()
    }

    /// Shared session configuration.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionHolder> {
        &self.session
    }

    /// The live client.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::NotConnected`] when there is none.
    pub fn client(&self) -> Result<Arc<dyn TerminalClient>, AdapterError> {
        self.inner
            .lock()
            .session
            .as_ref()
            .map(|s| s.binding.client())
            .ok_or(AdapterError::NotConnected)
    }

    /// Start a new cycle: build the client, bind `prepare(cycle)` to every
    /// event and issue the connect call.
    ///
    /// `prepare` runs only once the controller is known to be idle, so it is
    /// the place to reset per-cycle state.
    ///
    /// # Errors
    ///
    /// - [`AdapterError::AlreadyConnected`] if a client handle exists.
    /// - [`AdapterError::UnsupportedVersion`] from the factory.
    /// - [`AdapterError::Client`] if the connect call fails; the cycle is torn
    ///   down again before returning.
    pub fn connect<F>(&self, prepare: F) -> Result<CycleId, AdapterError>
    where
        F: FnOnce(CycleId) -> Arc<dyn ClientEventHandler>,
    {
        let (cycle, client, config) = {
            let mut inner = self.inner.lock();
            if inner.session.is_some() {
                return Err(AdapterError::AlreadyConnected);
            }

            let cycle = inner.last_cycle + 1;
            let handler = prepare(cycle);
            let config = self.session.snapshot();
            let client = self.factory.create(&config)?;
            let binding = EventBinding::bind(Arc::clone(&client), &handler);

            inner.last_cycle = cycle;
            inner.session = Some(LiveSession { cycle, binding });
            inner.transition(ConnectionState::Connecting);
            (cycle, client, config)
        };

        metrics::record_connect_cycle();
        tracing::info!(
            cycle,
            version = %config.version,
            address = %config.address,
            login = %config.login,
            "Connecting to terminal"
        );

        let address = &config.address;
        if let Err(e) = client.connect(
            address.host(),
            address.port(),
            &config.login,
            config.password(),
        ) {
            tracing::warn!(cycle, error = %e, "Terminal connect call failed");
            if let Some((_, unbound)) = self.abandon(cycle) {
                tracing::debug!(cycle, unbound, "Abandoned connect cycle");
            }
            return Err(e.into());
        }

        Ok(cycle)
    }

    /// Issue the disconnect call on the live client.
    ///
    /// # Errors
    ///
    /// - [`AdapterError::NotConnected`] if there is no client handle.
    /// - [`AdapterError::Client`] if the disconnect call fails; the previous
    ///   state is restored.
    pub fn disconnect(&self) -> Result<(), AdapterError> {
        let (cycle, client, previous) = {
            let mut inner = self.inner.lock();
            let Some(session) = inner.session.as_ref() else {
                return Err(AdapterError::NotConnected);
            };
            let cycle = session.cycle;
            let client = session.binding.client();
            let previous = inner.state;
            inner.transition(ConnectionState::Disconnecting);
            (cycle, client, previous)
        };

        tracing::info!(cycle, from = %previous, "Disconnecting from terminal");

        if let Err(e) = client.disconnect() {
            tracing::warn!(cycle, error = %e, "Terminal disconnect call failed");
            let mut inner = self.inner.lock();
            if inner.is_current(cycle) && inner.state == ConnectionState::Disconnecting {
                inner.transition(previous);
            }
            return Err(e.into());
        }

        Ok(())
    }

    /// Apply a Connected event for `cycle`.
    pub fn on_connected(&self, cycle: CycleId) -> EventOutcome {
        let mut inner = self.inner.lock();
        if !inner.is_current(cycle) {
            return EventOutcome::Stale;
        }

        if inner.state != ConnectionState::Connecting {
            tracing::debug!(cycle, state = %inner.state, "Ignoring connected event");
            return EventOutcome::Unchanged;
        }

        inner.transition(ConnectionState::Connected);
        tracing::info!(cycle, "Terminal connected");
        EventOutcome::Applied
    }

    /// Apply a Disconnected event for `cycle`: unbind every event, drop the
    /// client and go idle.
    pub fn on_disconnected(&self, cycle: CycleId, error: Option<&str>) -> EventOutcome {
        let mut inner = self.inner.lock();
        if !inner.is_current(cycle) {
            return EventOutcome::Stale;
        }

        let previous = inner.state;
        if let Some((cycle, unbound)) = inner.teardown() {
            match error {
                Some(error) => {
                    tracing::warn!(
                        cycle,
                        from = %previous,
                        unbound,
                        error,
                        "Terminal connection lost"
                    );
                }
                None => tracing::info!(cycle, from = %previous, unbound, "Terminal disconnected"),
            }
        }

        EventOutcome::Applied
    }

    /// Run `f` under the state lock if `cycle` is still the live cycle.
    ///
    /// `f` must not call back into the controller.
    pub fn with_current<R>(&self, cycle: CycleId, f: impl FnOnce() -> R) -> Option<R> {
        let inner = self.inner.lock();
        inner.is_current(cycle).then(f)
    }

    /// Tear down `cycle` without emitting anything.
    fn abandon(&self, cycle: CycleId) -> Option<(CycleId, usize)> {
        let mut inner = self.inner.lock();
        if inner.is_current(cycle) {
            inner.teardown()
        } else {
            None
        }
    }
}

impl fmt::Debug for ConnectionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ConnectionController")
            .field("state", &inner.state)
            .field("cycle", &inner.session.as_ref().map(|s| s.cycle))
            .finish_non_exhaustive()
    }
}
