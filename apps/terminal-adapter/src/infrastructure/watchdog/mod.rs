//! Connect Watchdog
//!
//! The adapter has no connect timeout of its own: a client that never
//! raises Connected or Disconnected leaves it in `Connecting`. The host
//! runs this task to issue a disconnect once a connect has been pending
//! for longer than the configured timeout.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::application::services::TerminalAdapter;
use crate::domain::messages::InMessage;

/// Bounds on how often the adapter state is polled.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Disconnects connect attempts that stay pending too long.
#[derive(Debug)]
pub struct ConnectWatchdog {
    adapter: Arc<TerminalAdapter>,
    timeout: Duration,
}

impl ConnectWatchdog {
    /// Create a watchdog for `adapter`.
    #[must_use]
    pub const fn new(adapter: Arc<TerminalAdapter>, timeout: Duration) -> Self {
        Self { adapter, timeout }
    }

    /// Check once. Returns `true` if a disconnect was issued.
    pub fn check(&self) -> bool {
        let Some(since) = self.adapter.connecting_since() else {
            return false;
        };

        let pending = since.elapsed();
        if pending < self.timeout {
            return false;
        }

        tracing::warn!(
            pending_ms = u64::try_from(pending.as_millis()).unwrap_or(u64::MAX),
            timeout_secs = self.timeout.as_secs(),
            cycle = self.adapter.current_cycle(),
            "Connect pending too long, disconnecting"
        );

        if let Err(e) = self.adapter.send_in_message(InMessage::Disconnect) {
            tracing::warn!(error = %e, "Watchdog disconnect failed");
        }
        true
    }

    /// Poll until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        let period = self.timeout.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL);
        let mut ticker = tokio::time::interval(period);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.check();
                }
            }
        }

        tracing::debug!("Connect watchdog stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{ClientEvent, TerminalClient};
    use crate::application::services::{ClientTarget, ConnectionState, VersionedClientFactory};
    use crate::domain::session::{
        Bitness, ServerAddress, SessionConfig, SessionHolder, TerminalVersion,
    };
    use crate::infrastructure::bus::ChannelSink;
    use crate::infrastructure::loopback::{ClientCall, LoopbackClient};

    fn adapter(client: &Arc<LoopbackClient>) -> Arc<TerminalAdapter> {
        let client = Arc::clone(client);
        let factory = VersionedClientFactory::with_bitness(Bitness::X86).with_builder(
            ClientTarget::V2X86,
            move |_| Arc::clone(&client) as Arc<dyn TerminalClient>,
        );
        let session = SessionHolder::new(SessionConfig::new(
            TerminalVersion::V2,
            ServerAddress::new("localhost", 8443),
            "u",
            "p",
        ));
        let (sink, _rx) = ChannelSink::unbounded();
        Arc::new(TerminalAdapter::new(
            Arc::new(session),
            Arc::new(factory),
            Arc::new(sink),
        ))
    }

    #[test]
    fn idle_adapter_left_alone() {
        let client = Arc::new(LoopbackClient::manual());
        let watchdog = ConnectWatchdog::new(adapter(&client), Duration::ZERO);
        assert!(!watchdog.check());
    }

    #[test]
    fn pending_connect_disconnected_after_timeout() {
        let client = Arc::new(LoopbackClient::manual());
        let adapter = adapter(&client);
        adapter.send_in_message(InMessage::Connect).unwrap();

        let watchdog = ConnectWatchdog::new(Arc::clone(&adapter), Duration::ZERO);
        assert!(watchdog.check());
        assert_eq!(adapter.state(), ConnectionState::Disconnecting);
        assert!(client.calls().contains(&ClientCall::Disconnect));

        // Not connecting anymore.
        assert!(!watchdog.check());
    }

    #[test]
    fn connected_adapter_left_alone() {
        let client = Arc::new(LoopbackClient::manual());
        let adapter = adapter(&client);
        adapter.send_in_message(InMessage::Connect).unwrap();
        client.raise(ClientEvent::Connected);

        let watchdog = ConnectWatchdog::new(adapter, Duration::ZERO);
        assert!(!watchdog.check());
    }

    #[test]
    fn fresh_connect_within_timeout() {
        let client = Arc::new(LoopbackClient::manual());
        let adapter = adapter(&client);
        adapter.send_in_message(InMessage::Connect).unwrap();

        let watchdog = ConnectWatchdog::new(adapter, Duration::from_secs(3600));
        assert!(!watchdog.check());
    }

    #[tokio::test]
    async fn run_disconnects_stalled_connect_until_cancelled() {
        let client = Arc::new(LoopbackClient::manual());
        let adapter = adapter(&client);
        adapter.send_in_message(InMessage::Connect).unwrap();

        let cancel = CancellationToken::new();
        let watchdog = ConnectWatchdog::new(Arc::clone(&adapter), Duration::ZERO);
        let handle = tokio::spawn(watchdog.run(cancel.clone()));

        // Short real waits; the poll period is MIN_POLL_INTERVAL.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while adapter.state() == ConnectionState::Connecting
            && tokio::time::Instant::now() < deadline
        {
            tokio::time::sleep(MIN_POLL_INTERVAL).await;
        }
        assert_eq!(adapter.state(), ConnectionState::Disconnecting);

        cancel.cancel();
        let joined = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("watchdog did not stop");
        tokio_test::assert_ok!(joined);
    }
}
