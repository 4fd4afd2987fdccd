//! RemoteLogger: the orchestrator tying discovery, the registry, passcodes,
//! and the connection state machine together behind one observable surface.
//!
//! # Architecture
//!
//! ```text
//! RemoteLogger (handle)                     pump task (owns all state)
//!  ├─ set_enabled ──► Debouncer ──► Msg::ApplyEnabled ─┐
//!  ├─ connect/disconnect ──► Msg::Connect/Disconnect ──┤
//!  │                                                   ▼
//!  │   Discoverer ──► BrowserEvent ──────────► one event loop
//!  │   handshake tasks ──► AttemptOutcome ───►   PeerRegistry
//!  │                                             ConnectionManager
//!  └─ snapshot()/subscribe() ◄── StateSnapshot ◄─ after every message
//! ```
//!
//! All mutation happens inside the single pump task; the "one logical event
//! queue".  The handle only sends commands and reads the latest immutable
//! snapshot; subscribers are invoked from the pump in occurrence order, so
//! for a given peer observers can never see transitions reordered.
//!
//! There is no hidden global: construct a `RemoteLogger` once at process
//! start and hand it to whoever needs it (it is cheap to clone).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use loglink_core::domain::peer::PeerEndpoint;
use loglink_core::domain::registry::PeerRegistry;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::application::connection::{
    AttemptOutcome, ConnectError, ConnectionEvent, ConnectionManager, PairingTransport,
};
use crate::application::debounce::Debouncer;
use crate::infrastructure::network::{BrowserEvent, Discoverer, DiscoveryError};
use crate::infrastructure::storage::{AgentConfig, PasscodeStore};

/// One row of the observable server list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerView {
    pub endpoint: PeerEndpoint,
    pub name: String,
    pub is_protected: bool,
    pub is_selected: bool,
}

/// Immutable snapshot of everything the UI binds to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StateSnapshot {
    /// Whether remote logging is on (post-debounce, i.e. actually applied).
    pub enabled: bool,
    /// Currently visible servers, sorted case-insensitively by name.
    pub servers: Vec<ServerView>,
    /// Name of the connected server, if any.
    pub selected_server_name: Option<String>,
    /// Latest discovery-layer error; cleared on successful (re)start.
    pub browser_error: Option<DiscoveryError>,
}

/// Callbacks delivered to the caller (the passcode form and result alerts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggerEvent {
    /// The chosen server is protected and no passcode is stored; collect one
    /// and call [`RemoteLogger::connect_with_passcode`].
    NeedsPasscode { endpoint: PeerEndpoint },
    /// Terminal outcome of the latest connect attempt.
    ConnectionResult(Result<String, ConnectError>),
}

type Subscriber = Arc<dyn Fn(&StateSnapshot) + Send + Sync>;

enum Msg {
    ApplyEnabled(bool),
    Connect {
        endpoint: PeerEndpoint,
        passcode: Option<String>,
    },
    Disconnect,
    Shutdown,
}

/// Handle to the remote-logging core.  Clone freely; all clones drive the
/// same pump.
#[derive(Clone)]
pub struct RemoteLogger {
    msg_tx: mpsc::UnboundedSender<Msg>,
    debouncer: Arc<Debouncer<bool>>,
    snapshot: Arc<Mutex<StateSnapshot>>,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl RemoteLogger {
    /// Builds the core and spawns its pump.  Returns the handle plus the
    /// receiver for [`LoggerEvent`]s.
    pub fn new(
        config: &AgentConfig,
        discoverer: Box<dyn Discoverer>,
        transport: Arc<dyn PairingTransport>,
        passcodes: Arc<PasscodeStore>,
    ) -> (Self, mpsc::Receiver<LoggerEvent>) {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(64);
        let (outcome_tx, outcome_rx) = mpsc::channel(64);

        let snapshot = Arc::new(Mutex::new(StateSnapshot::default()));
        let subscribers: Arc<Mutex<Vec<Subscriber>>> = Arc::new(Mutex::new(Vec::new()));

        let pump = Pump {
            enabled: false,
            service_type: config.service_type.clone(),
            registry: PeerRegistry::new(),
            manager: ConnectionManager::new(transport, passcodes, outcome_tx),
            discoverer,
            browser_error: None,
            browser_rx: None,
            msg_rx,
            outcome_rx,
            event_tx,
            snapshot: Arc::clone(&snapshot),
            subscribers: Arc::clone(&subscribers),
        };
        tokio::spawn(pump.run());

        let debounce_tx = msg_tx.clone();
        let debouncer = Debouncer::new(
            Duration::from_millis(config.debounce_ms),
            move |enabled: bool| {
                let _ = debounce_tx.send(Msg::ApplyEnabled(enabled));
            },
        );

        (
            Self {
                msg_tx,
                debouncer: Arc::new(debouncer),
                snapshot,
                subscribers,
            },
            event_rx,
        )
    }

    /// Requests the enabled state.  Rapid toggles coalesce: only the final
    /// value within the quiet window causes a lifecycle action.
    pub fn set_enabled(&self, enabled: bool) {
        self.debouncer.submit(enabled);
    }

    /// Connect intent without an explicit passcode.  Protected peers with no
    /// stored passcode answer with [`LoggerEvent::NeedsPasscode`].
    pub fn connect(&self, endpoint: PeerEndpoint) {
        let _ = self.msg_tx.send(Msg::Connect {
            endpoint,
            passcode: None,
        });
    }

    /// Connect intent carrying a passcode collected from the user.
    pub fn connect_with_passcode(&self, endpoint: PeerEndpoint, passcode: String) {
        let _ = self.msg_tx.send(Msg::Connect {
            endpoint,
            passcode: Some(passcode),
        });
    }

    /// Deselects the current server, if any.
    pub fn disconnect(&self) {
        let _ = self.msg_tx.send(Msg::Disconnect);
    }

    /// Stops discovery and any connection immediately, bypassing the
    /// debounce.  The handle is inert afterwards.
    pub fn shutdown(&self) {
        let _ = self.msg_tx.send(Msg::Shutdown);
    }

    /// The latest state snapshot.
    pub fn snapshot(&self) -> StateSnapshot {
        match self.snapshot.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.snapshot().enabled
    }

    pub fn selected_server_name(&self) -> Option<String> {
        self.snapshot().selected_server_name
    }

    /// Whether `endpoint` is the currently connected server.
    pub fn is_selected(&self, endpoint: &PeerEndpoint) -> bool {
        self.snapshot()
            .servers
            .iter()
            .any(|s| s.is_selected && &s.endpoint == endpoint)
    }

    /// Registers a state observer.  It is invoked immediately with the
    /// current snapshot, then on every change, always from the core's event
    /// loop and in occurrence order.
    pub fn subscribe(&self, callback: impl Fn(&StateSnapshot) + Send + Sync + 'static) {
        let current = self.snapshot();
        callback(&current);
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(Arc::new(callback));
        }
    }
}

// ── Pump ──────────────────────────────────────────────────────────────────────

/// The single event loop owning all mutable state.
struct Pump {
    enabled: bool,
    service_type: String,
    registry: PeerRegistry,
    manager: ConnectionManager,
    discoverer: Box<dyn Discoverer>,
    browser_error: Option<DiscoveryError>,
    browser_rx: Option<mpsc::Receiver<BrowserEvent>>,
    msg_rx: mpsc::UnboundedReceiver<Msg>,
    outcome_rx: mpsc::Receiver<AttemptOutcome>,
    event_tx: mpsc::Sender<LoggerEvent>,
    snapshot: Arc<Mutex<StateSnapshot>>,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl Pump {
    async fn run(mut self) {
        loop {
            let events = tokio::select! {
                msg = self.msg_rx.recv() => match msg {
                    Some(Msg::Shutdown) | None => break,
                    Some(msg) => self.handle_msg(msg).await,
                },
                Some(outcome) = self.outcome_rx.recv() => self.manager.handle_outcome(outcome),
                browser = next_browser_event(&mut self.browser_rx) => match browser {
                    Some(event) => self.handle_browser_event(event),
                    None => self.handle_browser_closed(),
                },
            };
            self.forward(events).await;
            self.publish();
        }

        // Teardown: the handle is gone or shutdown was requested.
        self.discoverer.stop();
        self.manager.cancel_inflight();
        debug!("remote logger pump stopped");
    }

    async fn handle_msg(&mut self, msg: Msg) -> Vec<ConnectionEvent> {
        match msg {
            Msg::ApplyEnabled(enabled) => self.apply_enabled(enabled),
            Msg::Connect { endpoint, passcode } => self.handle_connect(endpoint, passcode).await,
            Msg::Disconnect => self.manager.disconnect(),
            Msg::Shutdown => unreachable!("handled by the event loop"),
        }
    }

    fn apply_enabled(&mut self, enabled: bool) -> Vec<ConnectionEvent> {
        if enabled == self.enabled {
            return Vec::new();
        }
        if enabled {
            info!("remote logging enabled; starting discovery");
            match self.discoverer.start() {
                Ok(rx) => {
                    self.browser_rx = Some(rx);
                    self.browser_error = None;
                }
                Err(e) => {
                    warn!("discovery failed to start: {e}");
                    self.browser_error = Some(e);
                }
            }
            self.enabled = true;
            Vec::new()
        } else {
            info!("remote logging disabled; tearing down");
            self.discoverer.stop();
            self.browser_rx = None;
            self.registry.clear();
            self.browser_error = None;
            self.enabled = false;
            self.manager.disconnect()
        }
    }

    fn handle_browser_event(&mut self, event: BrowserEvent) -> Vec<ConnectionEvent> {
        match event {
            BrowserEvent::PeerFound(peer) => {
                if self.enabled {
                    self.registry.upsert(peer);
                }
            }
            BrowserEvent::PeerLost(endpoint) => {
                self.registry.remove(&endpoint);
            }
            BrowserEvent::Failed(error) => {
                // The browse is dead; the registry would only go stale.
                warn!("discovery failed: {error}");
                self.browser_error = Some(error);
                self.registry.clear();
            }
        }
        Vec::new()
    }

    /// The discovery stream ended without an explicit failure event.  While
    /// enabled that is itself a failure: surface it and drop the now-stale
    /// peer list so the owner can prompt a restart.
    fn handle_browser_closed(&mut self) -> Vec<ConnectionEvent> {
        self.browser_rx = None;
        if self.enabled {
            warn!("discovery stream ended while enabled");
            if self.browser_error.is_none() {
                self.browser_error = Some(DiscoveryError::BrowseFailed {
                    service_type: self.service_type.clone(),
                    message: "event stream ended unexpectedly".to_string(),
                });
            }
            self.registry.clear();
        }
        Vec::new()
    }

    async fn handle_connect(
        &mut self,
        endpoint: PeerEndpoint,
        passcode: Option<String>,
    ) -> Vec<ConnectionEvent> {
        let Some(peer) = self.registry.get(&endpoint).cloned() else {
            // The peer vanished between the UI click and the command landing.
            let _ = self
                .event_tx
                .send(LoggerEvent::ConnectionResult(Err(
                    ConnectError::Unreachable(format!("{endpoint} is no longer visible")),
                )))
                .await;
            return Vec::new();
        };
        match passcode {
            Some(passcode) => self.manager.connect_with_passcode(&peer, passcode),
            None => self.manager.connect(&peer),
        }
    }

    /// Translates state-machine events into caller events, in order.
    async fn forward(&mut self, events: Vec<ConnectionEvent>) {
        for event in events {
            let out = match event {
                ConnectionEvent::NeedsPasscode { peer } => {
                    Some(LoggerEvent::NeedsPasscode { endpoint: peer })
                }
                ConnectionEvent::Connected { server_name, .. } => {
                    Some(LoggerEvent::ConnectionResult(Ok(server_name)))
                }
                ConnectionEvent::Failed { error, .. } => {
                    Some(LoggerEvent::ConnectionResult(Err(error)))
                }
                // Deselection shows up in the snapshot, not as a callback.
                ConnectionEvent::Disconnected { .. } => None,
            };
            if let Some(out) = out {
                let _ = self.event_tx.send(out).await;
            }
        }
    }

    /// Rebuilds the snapshot and notifies subscribers when it changed.
    fn publish(&mut self) {
        let next = self.build_snapshot();
        {
            let mut cached = match self.snapshot.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *cached == next {
                return;
            }
            *cached = next.clone();
        }
        // Invoke outside the lock so a callback may itself subscribe.
        let subs: Vec<Subscriber> = match self.subscribers.lock() {
            Ok(subs) => subs.clone(),
            Err(_) => return,
        };
        for sub in &subs {
            sub(&next);
        }
    }

    fn build_snapshot(&self) -> StateSnapshot {
        let servers = self
            .registry
            .list()
            .into_iter()
            .map(|peer| {
                let name = peer.display_name().to_string();
                ServerView {
                    is_selected: self.manager.is_selected(&peer.endpoint),
                    is_protected: peer.protected,
                    name,
                    endpoint: peer.endpoint,
                }
            })
            .collect();
        StateSnapshot {
            enabled: self.enabled,
            servers,
            selected_server_name: self.manager.selected_server_name().map(str::to_string),
            browser_error: self.browser_error.clone(),
        }
    }
}

/// Resolves to the next browser event, or never when browsing is inactive.
async fn next_browser_event(rx: &mut Option<mpsc::Receiver<BrowserEvent>>) -> Option<BrowserEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::network::mock::{MockDiscoverer, MockPairingTransport};
    use loglink_core::domain::peer::Peer;

    fn temp_passcodes(tag: &str) -> Arc<PasscodeStore> {
        let path = std::env::temp_dir().join(format!(
            "loglink_logger_{tag}_{}.toml",
            std::process::id()
        ));
        std::fs::remove_file(&path).ok();
        Arc::new(PasscodeStore::open(path))
    }

    fn fast_config() -> AgentConfig {
        AgentConfig {
            debounce_ms: 30,
            ..AgentConfig::default()
        }
    }

    fn make_peer(name: &str, port: u16, protected: bool) -> Peer {
        Peer {
            endpoint: PeerEndpoint::Service {
                fullname: format!("{name}._loglink._tcp.local."),
            },
            name: Some(name.to_string()),
            addr: format!("127.0.0.1:{port}").parse().unwrap(),
            protected,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(120)).await;
    }

    #[tokio::test]
    async fn test_enable_starts_discovery_after_quiet_window() {
        let (discoverer, handle) = MockDiscoverer::new();
        let (logger, _events) = RemoteLogger::new(
            &fast_config(),
            Box::new(discoverer),
            MockPairingTransport::new(),
            temp_passcodes("enable"),
        );

        logger.set_enabled(true);
        assert!(!logger.is_enabled(), "debounce window not elapsed yet");

        settle().await;
        assert!(logger.is_enabled());
        assert!(handle.is_browsing());
    }

    #[tokio::test]
    async fn test_rapid_toggles_collapse_to_last_value() {
        let (discoverer, handle) = MockDiscoverer::new();
        let (logger, _events) = RemoteLogger::new(
            &fast_config(),
            Box::new(discoverer),
            MockPairingTransport::new(),
            temp_passcodes("toggle"),
        );

        // Three flicks inside one quiet window; the last one wins.
        logger.set_enabled(true);
        logger.set_enabled(false);
        logger.set_enabled(true);
        settle().await;

        assert!(logger.is_enabled());
        assert_eq!(handle.starts(), 1, "exactly one lifecycle action");
    }

    #[tokio::test]
    async fn test_discovered_peers_appear_sorted_in_snapshot() {
        let (discoverer, handle) = MockDiscoverer::new();
        let (logger, _events) = RemoteLogger::new(
            &fast_config(),
            Box::new(discoverer),
            MockPairingTransport::new(),
            temp_passcodes("sorted"),
        );

        logger.set_enabled(true);
        settle().await;

        handle.emit(BrowserEvent::PeerFound(make_peer("Zed", 7441, false))).await;
        handle.emit(BrowserEvent::PeerFound(make_peer("alpha", 7442, true))).await;
        settle().await;

        let snapshot = logger.snapshot();
        let names: Vec<&str> = snapshot.servers.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "Zed"]);
        assert!(snapshot.servers[0].is_protected);
    }

    #[tokio::test]
    async fn test_lost_peer_leaves_snapshot() {
        let (discoverer, handle) = MockDiscoverer::new();
        let (logger, _events) = RemoteLogger::new(
            &fast_config(),
            Box::new(discoverer),
            MockPairingTransport::new(),
            temp_passcodes("lost"),
        );

        logger.set_enabled(true);
        settle().await;

        let peer = make_peer("ephemeral", 7443, false);
        handle.emit(BrowserEvent::PeerFound(peer.clone())).await;
        settle().await;
        assert_eq!(logger.snapshot().servers.len(), 1);

        handle.emit(BrowserEvent::PeerLost(peer.endpoint)).await;
        settle().await;
        assert!(logger.snapshot().servers.is_empty());
    }

    #[tokio::test]
    async fn test_connect_success_selects_exactly_one_server() {
        let (discoverer, handle) = MockDiscoverer::new();
        let transport = MockPairingTransport::new();
        let (logger, mut events) = RemoteLogger::new(
            &fast_config(),
            Box::new(discoverer),
            transport.clone(),
            temp_passcodes("select"),
        );

        logger.set_enabled(true);
        settle().await;

        let a = make_peer("aaa", 7444, false);
        let b = make_peer("bbb", 7445, false);
        transport.route(a.addr, Ok("aaa".to_string()));
        handle.emit(BrowserEvent::PeerFound(a.clone())).await;
        handle.emit(BrowserEvent::PeerFound(b.clone())).await;
        settle().await;

        logger.connect(a.endpoint.clone());
        let event = events.recv().await.expect("event");
        assert_eq!(event, LoggerEvent::ConnectionResult(Ok("aaa".to_string())));

        let snapshot = logger.snapshot();
        let selected: Vec<&ServerView> =
            snapshot.servers.iter().filter(|s| s.is_selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].endpoint, a.endpoint);
        assert_eq!(snapshot.selected_server_name, Some("aaa".to_string()));
        assert!(logger.is_selected(&a.endpoint));
        assert!(!logger.is_selected(&b.endpoint));
    }

    #[tokio::test]
    async fn test_protected_peer_without_passcode_raises_needs_passcode() {
        let (discoverer, handle) = MockDiscoverer::new();
        let transport = MockPairingTransport::new();
        let (logger, mut events) = RemoteLogger::new(
            &fast_config(),
            Box::new(discoverer),
            transport.clone(),
            temp_passcodes("needs"),
        );

        logger.set_enabled(true);
        settle().await;

        let peer = make_peer("locked", 7446, true);
        handle.emit(BrowserEvent::PeerFound(peer.clone())).await;
        settle().await;

        logger.connect(peer.endpoint.clone());
        let event = events.recv().await.expect("event");
        assert_eq!(
            event,
            LoggerEvent::NeedsPasscode {
                endpoint: peer.endpoint.clone()
            }
        );
        assert!(transport.calls().is_empty(), "no handshake may start");
    }

    #[tokio::test]
    async fn test_disable_tears_down_connection_and_servers() {
        let (discoverer, handle) = MockDiscoverer::new();
        let transport = MockPairingTransport::new();
        let (logger, mut events) = RemoteLogger::new(
            &fast_config(),
            Box::new(discoverer),
            transport.clone(),
            temp_passcodes("teardown"),
        );

        logger.set_enabled(true);
        settle().await;

        let peer = make_peer("gone", 7447, false);
        transport.route(peer.addr, Ok("gone".to_string()));
        handle.emit(BrowserEvent::PeerFound(peer.clone())).await;
        settle().await;
        logger.connect(peer.endpoint.clone());
        let _ = events.recv().await;

        logger.set_enabled(false);
        settle().await;

        let snapshot = logger.snapshot();
        assert!(!snapshot.enabled);
        assert!(snapshot.servers.is_empty());
        assert_eq!(snapshot.selected_server_name, None);
        assert!(!handle.is_browsing());
    }

    #[tokio::test]
    async fn test_browser_start_failure_surfaces_and_clears_on_restart() {
        let (discoverer, handle) = MockDiscoverer::new();
        let (logger, _events) = RemoteLogger::new(
            &fast_config(),
            Box::new(discoverer),
            MockPairingTransport::new(),
            temp_passcodes("error"),
        );

        handle.fail_next_start(DiscoveryError::DaemonUnavailable("no multicast".to_string()));
        logger.set_enabled(true);
        settle().await;
        assert!(logger.snapshot().browser_error.is_some());

        // Toggle off and on again: the retry succeeds and clears the error.
        logger.set_enabled(false);
        settle().await;
        logger.set_enabled(true);
        settle().await;
        assert_eq!(logger.snapshot().browser_error, None);
        assert!(handle.is_browsing());
    }

    #[tokio::test]
    async fn test_midflight_discovery_failure_surfaces_and_drops_stale_peers() {
        let (discoverer, handle) = MockDiscoverer::new();
        let (logger, _events) = RemoteLogger::new(
            &fast_config(),
            Box::new(discoverer),
            MockPairingTransport::new(),
            temp_passcodes("midflight"),
        );

        logger.set_enabled(true);
        settle().await;
        handle
            .emit(BrowserEvent::PeerFound(make_peer("doomed", 7449, false)))
            .await;
        settle().await;
        assert_eq!(logger.snapshot().servers.len(), 1);

        handle
            .emit(BrowserEvent::Failed(DiscoveryError::BrowseFailed {
                service_type: "_loglink._tcp.local.".to_string(),
                message: "search stopped by the daemon".to_string(),
            }))
            .await;
        settle().await;

        let snapshot = logger.snapshot();
        assert!(snapshot.enabled, "the toggle itself stays on");
        assert!(snapshot.browser_error.is_some());
        assert!(snapshot.servers.is_empty(), "stale peers must not linger");
    }

    #[tokio::test]
    async fn test_stream_death_while_enabled_surfaces_an_error() {
        let (discoverer, handle) = MockDiscoverer::new();
        let (logger, _events) = RemoteLogger::new(
            &fast_config(),
            Box::new(discoverer),
            MockPairingTransport::new(),
            temp_passcodes("death"),
        );

        logger.set_enabled(true);
        settle().await;
        handle
            .emit(BrowserEvent::PeerFound(make_peer("doomed", 7450, false)))
            .await;
        settle().await;

        // The sender vanishes without any terminal event.
        handle.kill_stream();
        settle().await;

        let snapshot = logger.snapshot();
        assert!(snapshot.enabled);
        assert!(snapshot.browser_error.is_some());
        assert!(snapshot.servers.is_empty());

        // Toggling off and on recovers: fresh browse, error cleared.
        logger.set_enabled(false);
        settle().await;
        logger.set_enabled(true);
        settle().await;
        assert_eq!(logger.snapshot().browser_error, None);
        assert!(handle.is_browsing());
    }

    #[tokio::test]
    async fn test_subscriber_sees_initial_and_updated_snapshots() {
        let (discoverer, handle) = MockDiscoverer::new();
        let (logger, _events) = RemoteLogger::new(
            &fast_config(),
            Box::new(discoverer),
            MockPairingTransport::new(),
            temp_passcodes("subscribe"),
        );

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        logger.subscribe(move |snapshot| {
            sink.lock().unwrap().push(snapshot.clone());
        });

        assert_eq!(seen.lock().unwrap().len(), 1, "initial snapshot delivered");

        logger.set_enabled(true);
        settle().await;
        handle
            .emit(BrowserEvent::PeerFound(make_peer("new", 7448, false)))
            .await;
        settle().await;

        let snapshots = seen.lock().unwrap();
        let last = snapshots.last().expect("updates");
        assert!(last.enabled);
        assert_eq!(last.servers.len(), 1);
    }

    #[tokio::test]
    async fn test_subscriber_may_subscribe_from_within_its_callback() {
        use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

        let (discoverer, _handle) = MockDiscoverer::new();
        let (logger, _events) = RemoteLogger::new(
            &fast_config(),
            Box::new(discoverer),
            MockPairingTransport::new(),
            temp_passcodes("reentrant"),
        );

        let inner_calls = Arc::new(AtomicUsize::new(0));
        let registered = Arc::new(AtomicBool::new(false));
        let reentrant_logger = logger.clone();
        let counter = Arc::clone(&inner_calls);
        logger.subscribe(move |snapshot| {
            // Register a second observer from inside the notification.
            if snapshot.enabled && !registered.swap(true, Ordering::SeqCst) {
                let counter = Arc::clone(&counter);
                reentrant_logger.subscribe(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        logger.set_enabled(true);
        settle().await;

        // Reaching here at all means no deadlock; the inner observer got
        // its immediate initial snapshot.
        assert!(inner_calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_connect_to_vanished_peer_fails_cleanly() {
        let (discoverer, _handle) = MockDiscoverer::new();
        let (logger, mut events) = RemoteLogger::new(
            &fast_config(),
            Box::new(discoverer),
            MockPairingTransport::new(),
            temp_passcodes("vanished"),
        );

        logger.set_enabled(true);
        settle().await;

        let ghost = PeerEndpoint::Service {
            fullname: "ghost._loglink._tcp.local.".to_string(),
        };
        logger.connect(ghost);
        let event = events.recv().await.expect("event");
        assert!(matches!(
            event,
            LoggerEvent::ConnectionResult(Err(ConnectError::Unreachable(_)))
        ));
    }
}
