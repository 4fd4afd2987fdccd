//! Scripted network doubles for tests and offline development.
//!
//! `MockDiscoverer` satisfies the [`Discoverer`] seam without touching the
//! network; the paired [`MockDiscoveryHandle`] injects events as if peers
//! were appearing and disappearing on the LAN.  `MockPairingTransport`
//! scripts handshake outcomes per target address.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::connection::{ConnectError, PairingTransport};

use super::{BrowserEvent, Discoverer, DiscoveryError};

#[derive(Default)]
struct Shared {
    /// Sender for the currently active browse, if any.
    tx: Option<mpsc::Sender<BrowserEvent>>,
    /// Scripted error returned by the next `start()` call.
    next_start_error: Option<DiscoveryError>,
    starts: usize,
    stops: usize,
}

/// A [`Discoverer`] whose events come from the test instead of the network.
pub struct MockDiscoverer {
    shared: Arc<Mutex<Shared>>,
}

/// Test-side controls for a [`MockDiscoverer`].
#[derive(Clone)]
pub struct MockDiscoveryHandle {
    shared: Arc<Mutex<Shared>>,
}

impl MockDiscoverer {
    pub fn new() -> (Self, MockDiscoveryHandle) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        (
            Self {
                shared: Arc::clone(&shared),
            },
            MockDiscoveryHandle { shared },
        )
    }
}

impl Discoverer for MockDiscoverer {
    fn start(&mut self) -> Result<mpsc::Receiver<BrowserEvent>, DiscoveryError> {
        let mut shared = self.shared.lock().unwrap();
        shared.starts += 1;
        if let Some(err) = shared.next_start_error.take() {
            return Err(err);
        }
        let (tx, rx) = mpsc::channel(64);
        shared.tx = Some(tx);
        Ok(rx)
    }

    fn stop(&mut self) {
        let mut shared = self.shared.lock().unwrap();
        shared.stops += 1;
        shared.tx = None;
    }
}

impl MockDiscoveryHandle {
    /// Injects a discovery event into the active browse.
    ///
    /// # Panics
    ///
    /// Panics if browsing is not active; a test injecting into a stopped
    /// browse is a test bug.
    pub async fn emit(&self, event: BrowserEvent) {
        let tx = self
            .shared
            .lock()
            .unwrap()
            .tx
            .clone()
            .expect("emit on a stopped browse");
        tx.send(event).await.expect("browse receiver dropped");
    }

    /// Scripts the next `start()` call to fail with `error`.
    pub fn fail_next_start(&self, error: DiscoveryError) {
        self.shared.lock().unwrap().next_start_error = Some(error);
    }

    /// Drops the event stream without a `stop()`, as if the daemon died
    /// mid-flight.
    pub fn kill_stream(&self) {
        self.shared.lock().unwrap().tx = None;
    }

    /// Whether a browse is currently active.
    pub fn is_browsing(&self) -> bool {
        self.shared.lock().unwrap().tx.is_some()
    }

    /// Number of `start()` calls observed.
    pub fn starts(&self) -> usize {
        self.shared.lock().unwrap().starts
    }

    /// Number of `stop()` calls observed.
    pub fn stops(&self) -> usize {
        self.shared.lock().unwrap().stops
    }
}

// ── Scripted transport ────────────────────────────────────────────────────────

struct Route {
    outcome: Result<String, ConnectError>,
    delay: Duration,
}

/// A [`PairingTransport`] whose outcomes are scripted per address.
///
/// Unrouted addresses resolve to `Unreachable`, like a real LAN would.
#[derive(Default)]
pub struct MockPairingTransport {
    routes: Mutex<HashMap<SocketAddr, Route>>,
    calls: Mutex<Vec<(SocketAddr, Option<String>)>>,
}

impl MockPairingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Scripts the outcome for handshakes against `addr`.
    pub fn route(&self, addr: SocketAddr, outcome: Result<String, ConnectError>) {
        self.route_with_delay(addr, outcome, Duration::ZERO);
    }

    /// Scripts an outcome that takes `delay` to resolve, for supersession
    /// and cancellation timing tests.
    pub fn route_with_delay(
        &self,
        addr: SocketAddr,
        outcome: Result<String, ConnectError>,
        delay: Duration,
    ) {
        self.routes
            .lock()
            .unwrap()
            .insert(addr, Route { outcome, delay });
    }

    /// Every handshake call observed, in order: (address, passcode).
    pub fn calls(&self) -> Vec<(SocketAddr, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PairingTransport for MockPairingTransport {
    async fn handshake(
        &self,
        addr: SocketAddr,
        passcode: Option<String>,
    ) -> Result<String, ConnectError> {
        self.calls.lock().unwrap().push((addr, passcode));
        let routed = {
            let routes = self.routes.lock().unwrap();
            routes.get(&addr).map(|r| (r.outcome.clone(), r.delay))
        };
        match routed {
            Some((outcome, delay)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                outcome
            }
            None => Err(ConnectError::Unreachable(format!("no route to {addr}"))),
        }
    }
}
