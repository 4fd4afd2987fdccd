//! LogLink agent entry point.
//!
//! Wires together discovery, the pairing transport, and persistence, then
//! runs the remote-logging core headless until Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()          -- TOML config with defaults
//!  └─ PasscodeStore          -- per-server passcodes on disk
//!  └─ RemoteLogger::new()    -- spawns the event pump
//!       ├─ ServiceBrowser    -- mDNS browse task
//!       └─ TcpPairingTransport -- per-attempt handshake tasks
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use loglink_agent::application::remote_logger::{LoggerEvent, RemoteLogger};
use loglink_agent::infrastructure::network::browser::ServiceBrowser;
use loglink_agent::infrastructure::network::handshake::TcpPairingTransport;
use loglink_agent::infrastructure::storage::{load_config, PasscodeStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!("LogLink agent starting");

    let passcodes = Arc::new(PasscodeStore::open_default()?);
    let transport = Arc::new(TcpPairingTransport::new(
        config.agent_name.clone(),
        Duration::from_millis(config.handshake_timeout_ms),
    ));
    let discoverer = Box::new(ServiceBrowser::new(config.service_type.clone()));

    let (logger, mut events) = RemoteLogger::new(&config, discoverer, transport, passcodes);

    // Observe snapshot changes for the log.
    logger.subscribe(|snapshot| {
        info!(
            enabled = snapshot.enabled,
            servers = snapshot.servers.len(),
            selected = ?snapshot.selected_server_name,
            "state changed"
        );
    });

    logger.set_enabled(true);

    // ── Caller-event pump ─────────────────────────────────────────────────────
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                LoggerEvent::NeedsPasscode { endpoint } => {
                    // Headless run: no passcode prompt is available.
                    warn!("{endpoint} requires a passcode; connect with one stored first");
                }
                LoggerEvent::ConnectionResult(Ok(server_name)) => {
                    info!("connected to {server_name}");
                }
                LoggerEvent::ConnectionResult(Err(e)) => {
                    warn!("connection failed: {e}");
                }
            }
        }
    });

    info!("LogLink agent ready.  Press Ctrl-C to exit.");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    logger.shutdown();
    info!("LogLink agent stopped");
    Ok(())
}
