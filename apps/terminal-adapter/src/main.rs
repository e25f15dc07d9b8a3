//! Terminal Adapter Binary
//!
//! Hosts the adapter over a JSON lines message bus: inbound messages are
//! read from stdin, outbound messages are written to stdout, and logs go to
//! stderr. The binary registers the in-memory loopback client for every
//! protocol version so the full message flow can run without a vendor
//! terminal.
//!
//! # Usage
//!
//! ```bash
//! echo '{"type":"connect"}' | cargo run --bin terminal-adapter
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `TERMINAL_LOGIN`: Terminal account login
//! - `TERMINAL_PASSWORD`: Terminal account password
//!
//! ## Optional
//! - `TERMINAL_VERSION`: v2 | v3 (default: v3)
//! - `TERMINAL_ADDRESS`: Terminal server `host:port`
//! - `TERMINAL_CLIENT_SETTINGS`, `TERMINAL_SERVER_SETTINGS`: V3 settings strings
//! - `ADAPTER_HEALTH_PORT`: Health check HTTP port (default: 8083)
//! - `ADAPTER_CONNECT_TIMEOUT_SECS`: Disconnect pending connects after this long (default: off)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: cream-terminal-adapter)
//! - `RUST_LOG`: Log level (default: info)

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use terminal_adapter::infrastructure::health::{HealthServer, HealthServerState};
use terminal_adapter::infrastructure::telemetry;
use terminal_adapter::{
    AdapterConfig, ChannelSink, ClientTarget, ConnectWatchdog, ConnectionState, InMessage,
    JsonLineCodec, LoopbackClient, OutMessage, SessionHolder, TerminalAdapter, TerminalClient,
    VersionedClientFactory, init_metrics,
};
use tokio::io::AsyncWriteExt;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Inbound lines buffered between the stdin thread and the dispatcher.
const INBOUND_BUFFER: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Terminal Adapter");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = AdapterConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();
    let writer_token = CancellationToken::new();

    let factory = loopback_factory();
    let session = Arc::new(SessionHolder::new(config.session.clone()));
    if !factory.supports(session.version()) {
        anyhow::bail!(
            "no terminal client registered for version {}",
            session.version()
        );
    }

    let (sink, outbound_rx) = ChannelSink::unbounded();
    let adapter = Arc::new(TerminalAdapter::new(
        session,
        Arc::new(factory),
        Arc::new(sink),
    ));

    // Spawn outbound writer
    let writer = tokio::spawn(write_outbound(outbound_rx, writer_token.clone()));

    // Spawn inbound reader
    let (line_tx, line_rx) = mpsc::channel::<String>(INBOUND_BUFFER);
    spawn_stdin_reader(line_tx);
    tokio::spawn(dispatch_inbound(
        line_rx,
        Arc::clone(&adapter),
        shutdown_token.clone(),
    ));

    // Spawn connect watchdog
    if let Some(timeout) = config.watchdog.connect_timeout {
        let watchdog = ConnectWatchdog::new(Arc::clone(&adapter), timeout);
        tokio::spawn(watchdog.run(shutdown_token.clone()));
    }

    // Spawn health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&adapter),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    tracing::info!("Terminal adapter ready");

    await_shutdown(shutdown_token).await;

    // Close the live session so the host sees its Disconnect
    if adapter.state() != ConnectionState::Idle
        && let Err(e) = adapter.send_in_message(InMessage::Disconnect)
    {
        tracing::warn!(error = %e, "Disconnect on shutdown failed");
    }

    writer_token.cancel();
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, writer).await.is_err() {
        tracing::warn!("Outbound writer did not drain before timeout");
    }

    tracing::info!("Terminal adapter stopped");
    Ok(())
}

/// Factory with the loopback client registered for every target.
fn loopback_factory() -> VersionedClientFactory {
    let mut factory = VersionedClientFactory::new();
    for target in [ClientTarget::V2X86, ClientTarget::V3X86, ClientTarget::V3X64] {
        factory.register(target, |_| {
            Arc::new(LoopbackClient::auto()) as Arc<dyn TerminalClient>
        });
    }
    factory
}

/// Read stdin lines on a dedicated thread.
///
/// Blocking stdin reads cannot be cancelled, so the thread is detached and
/// dies with the process.
fn spawn_stdin_reader(tx: mpsc::Sender<String>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
        tracing::debug!("Stdin closed");
    });
}

/// Decode inbound lines and hand them to the adapter.
async fn dispatch_inbound(
    mut rx: mpsc::Receiver<String>,
    adapter: Arc<TerminalAdapter>,
    shutdown_token: CancellationToken,
) {
    let codec = JsonLineCodec::new();

    loop {
        let line = tokio::select! {
            () = shutdown_token.cancelled() => break,
            line = rx.recv() => line,
        };

        let Some(line) = line else {
            tracing::info!("Inbound stream closed, initiating shutdown");
            shutdown_token.cancel();
            break;
        };

        match codec.decode(&line) {
            Ok(Some(message)) => {
                let kind = message.kind();
                if let Err(e) = adapter.send_in_message(message) {
                    tracing::warn!(kind = kind.as_str(), error = %e, "Inbound message rejected");
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Failed to decode inbound line");
            }
        }
    }
}

/// Encode outbound messages as JSON lines on stdout.
async fn write_outbound(mut rx: mpsc::UnboundedReceiver<OutMessage>, stop: CancellationToken) {
    let codec = JsonLineCodec::new();
    let mut stdout = tokio::io::stdout();

    loop {
        let message = tokio::select! {
            message = rx.recv() => message,
            () = stop.cancelled() => {
                // Drain what the shutdown disconnect produced
                while let Ok(message) = rx.try_recv() {
                    write_line(&mut stdout, &codec, &message).await;
                }
                break;
            }
        };

        let Some(message) = message else {
            break;
        };
        write_line(&mut stdout, &codec, &message).await;
    }

    if let Err(e) = stdout.flush().await {
        tracing::warn!(error = %e, "Failed to flush stdout");
    }
    tracing::debug!("Outbound writer stopped");
}

async fn write_line(stdout: &mut tokio::io::Stdout, codec: &JsonLineCodec, message: &OutMessage) {
    let line = match codec.encode(message) {
        Ok(line) => line,
        Err(e) => {
            tracing::error!(
                kind = message.kind().as_str(),
                error = %e,
                "Failed to encode outbound message"
            );
            return;
        }
    };

    let result = async {
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await
    }
    .await;

    if let Err(e) = result {
        tracing::error!(error = %e, "Failed to write outbound message");
    }
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &AdapterConfig) {
    tracing::info!(
        terminal_version = config.session.version.as_str(),
        address = %config.session.address,
        login = %config.session.login,
        health_port = config.server.health_port,
        connect_timeout_secs = config.watchdog.connect_timeout.map(|t| t.as_secs()),
        "Configuration loaded"
    );
    tracing::debug!(
        client_settings = config.session.client_settings.is_some(),
        server_settings = config.session.server_settings.is_some(),
        "Session settings"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv_from_ancestors() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for a shutdown signal (SIGTERM, SIGINT, or the inbound stream closing).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => {}
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
