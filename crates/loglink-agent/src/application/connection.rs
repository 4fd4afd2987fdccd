//! ManageConnectionUseCase: the single-connection pairing state machine.
//!
//! At most one peer is connected at a time, and at most one handshake is in
//! flight at a time.  The machine moves
//!
//! ```text
//! Idle ──► Connecting ──► Connected
//!   ▲          │              │
//!   └──(fail)──┘   (disconnect/supersede)
//! ```
//!
//! A failed handshake is reported as a terminal [`ConnectionEvent::Failed`]
//! and the machine is immediately `Idle` again; failure is an event, not a
//! resting state, so a stale error can never be re-read later.
//!
//! The use case depends only on traits and domain types: the actual TCP
//! handshake is behind [`PairingTransport`], injected at construction, so the
//! whole state machine is unit-testable with scripted transports.
//!
//! # Supersession
//!
//! `connect` while another handshake is in flight aborts the old task and
//! starts a new attempt.  Every attempt carries a fresh [`AttemptId`]; an
//! outcome whose id does not match the current in-flight attempt is dropped
//! on the floor, so a superseded attempt can never deliver a stale success
//! or failure to the caller.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use loglink_core::domain::peer::{Peer, PeerEndpoint};
use loglink_core::protocol::ProtocolError;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::infrastructure::storage::PasscodeStore;

/// Identifier of one connect attempt, used to discard superseded outcomes.
pub type AttemptId = Uuid;

/// Terminal reason a connect attempt failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    /// The server rejected the submitted passcode.
    #[error("server rejected the passcode")]
    InvalidPasscode,
    /// The server already serves another agent.
    #[error("server is busy with another agent")]
    Busy,
    /// The handshake did not complete within the configured deadline.
    #[error("handshake timed out after {0} ms")]
    Timeout(u64),
    /// The peer could not be reached (connect refused, network down, ...).
    #[error("peer unreachable: {0}")]
    Unreachable(String),
    /// The peer spoke something that is not the pairing protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Seam to the wire: runs one connect handshake against a resolved address.
///
/// The production implementation opens a TCP stream and exchanges pairing
/// frames; test implementations script their outcomes.
#[async_trait]
pub trait PairingTransport: Send + Sync {
    /// Performs the handshake, returning the server's display name on accept.
    async fn handshake(
        &self,
        addr: SocketAddr,
        passcode: Option<String>,
    ) -> Result<String, ConnectError>;
}

/// Current position of the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection, no attempt in flight.
    Idle,
    /// A handshake task is running for this peer.
    Connecting { peer: PeerEndpoint },
    /// The handshake was accepted; this peer is the selection.
    Connected {
        peer: PeerEndpoint,
        server_name: String,
    },
}

/// Events emitted by the state machine, in occurrence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The target is protected and no passcode is stored; the caller must
    /// collect one and resubmit.  No handshake was started.
    NeedsPasscode { peer: PeerEndpoint },
    /// Handshake accepted; this peer is now the selection.
    Connected {
        peer: PeerEndpoint,
        server_name: String,
    },
    /// Handshake failed; the machine is `Idle` again.
    Failed {
        peer: PeerEndpoint,
        error: ConnectError,
    },
    /// A previously connected peer was deselected (disconnect or supersede).
    Disconnected { peer: PeerEndpoint },
}

/// Completed handshake result, delivered back by the spawned task.
#[derive(Debug)]
pub struct AttemptOutcome {
    pub id: AttemptId,
    pub peer: Peer,
    /// The passcode submitted with this attempt, persisted on success.
    pub passcode_used: Option<String>,
    pub result: Result<String, ConnectError>,
}

struct Inflight {
    id: AttemptId,
    handle: JoinHandle<()>,
}

/// The single-connection manager.
///
/// Owned by the orchestrator and driven from its event loop: command methods
/// mutate state and *return* the events they produced, and the spawned
/// handshake tasks report back through the outcome channel handed to `new`.
pub struct ConnectionManager {
    transport: Arc<dyn PairingTransport>,
    passcodes: Arc<PasscodeStore>,
    outcome_tx: mpsc::Sender<AttemptOutcome>,
    state: ConnectionState,
    inflight: Option<Inflight>,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn PairingTransport>,
        passcodes: Arc<PasscodeStore>,
        outcome_tx: mpsc::Sender<AttemptOutcome>,
    ) -> Self {
        Self {
            transport,
            passcodes,
            outcome_tx,
            state: ConnectionState::Idle,
            inflight: None,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Name of the connected server, or `None` when nothing is selected.
    pub fn selected_server_name(&self) -> Option<&str> {
        match &self.state {
            ConnectionState::Connected { server_name, .. } => Some(server_name),
            _ => None,
        }
    }

    /// Whether `endpoint` is the currently connected peer.
    pub fn is_selected(&self, endpoint: &PeerEndpoint) -> bool {
        matches!(&self.state, ConnectionState::Connected { peer, .. } if peer == endpoint)
    }

    /// Connect intent without an explicit passcode.
    ///
    /// Protected peers first consult the passcode store; with no stored
    /// record this emits exactly one [`ConnectionEvent::NeedsPasscode`] and
    /// starts nothing.
    pub fn connect(&mut self, peer: &Peer) -> Vec<ConnectionEvent> {
        if peer.protected {
            match self.passcodes.get(peer.display_name()) {
                Some(stored) => {
                    debug!("using stored passcode for {}", peer.display_name());
                    self.start_attempt(peer.clone(), Some(stored))
                }
                None => {
                    info!("{} is protected and no passcode is stored", peer.display_name());
                    vec![ConnectionEvent::NeedsPasscode {
                        peer: peer.endpoint.clone(),
                    }]
                }
            }
        } else {
            self.start_attempt(peer.clone(), None)
        }
    }

    /// Connect intent carrying a passcode collected from the user.
    pub fn connect_with_passcode(&mut self, peer: &Peer, passcode: String) -> Vec<ConnectionEvent> {
        self.start_attempt(peer.clone(), Some(passcode))
    }

    /// Deselects the current peer and cancels any in-flight attempt.
    pub fn disconnect(&mut self) -> Vec<ConnectionEvent> {
        self.cancel_inflight();
        match std::mem::replace(&mut self.state, ConnectionState::Idle) {
            ConnectionState::Connected { peer, .. } => {
                info!("disconnected from {peer}");
                vec![ConnectionEvent::Disconnected { peer }]
            }
            _ => Vec::new(),
        }
    }

    /// Applies a completed handshake outcome.
    ///
    /// Outcomes from superseded attempts are discarded without any event;
    /// the caller sees exactly one terminal outcome, for the newest attempt.
    pub fn handle_outcome(&mut self, outcome: AttemptOutcome) -> Vec<ConnectionEvent> {
        let current = match &self.inflight {
            Some(inflight) if inflight.id == outcome.id => true,
            _ => false,
        };
        if !current {
            debug!("dropping outcome of superseded attempt {}", outcome.id);
            return Vec::new();
        }
        self.inflight = None;

        match outcome.result {
            Ok(server_name) => {
                if let Some(passcode) = &outcome.passcode_used {
                    if let Err(e) = self.passcodes.set(outcome.peer.display_name(), passcode) {
                        warn!("accepted passcode could not be persisted: {e}");
                    }
                }

                let mut events = Vec::new();
                // Tear down a superseded selection before announcing the new one.
                if let ConnectionState::Connected { peer: old, .. } =
                    std::mem::replace(&mut self.state, ConnectionState::Idle)
                {
                    if old != outcome.peer.endpoint {
                        events.push(ConnectionEvent::Disconnected { peer: old });
                    }
                }

                info!("connected to {server_name}");
                self.state = ConnectionState::Connected {
                    peer: outcome.peer.endpoint.clone(),
                    server_name: server_name.clone(),
                };
                events.push(ConnectionEvent::Connected {
                    peer: outcome.peer.endpoint,
                    server_name,
                });
                events
            }
            Err(error) => {
                warn!("connect to {} failed: {error}", outcome.peer.display_name());
                // Surface the failure once, then rest at Idle, unless a
                // previous selection is still standing, which the failed
                // attempt must not destroy.
                if !matches!(self.state, ConnectionState::Connected { .. }) {
                    self.state = ConnectionState::Idle;
                }
                vec![ConnectionEvent::Failed {
                    peer: outcome.peer.endpoint,
                    error,
                }]
            }
        }
    }

    /// Aborts the in-flight handshake task, if any.
    pub fn cancel_inflight(&mut self) {
        if let Some(inflight) = self.inflight.take() {
            debug!("cancelling in-flight attempt {}", inflight.id);
            inflight.handle.abort();
        }
    }

    fn start_attempt(&mut self, peer: Peer, passcode: Option<String>) -> Vec<ConnectionEvent> {
        self.cancel_inflight();

        let id = Uuid::new_v4();
        info!("connecting to {} (attempt {id})", peer.display_name());

        // Keep an existing selection until the new handshake succeeds; only
        // a plain Idle/Connecting machine shows Connecting.
        if !matches!(self.state, ConnectionState::Connected { .. }) {
            self.state = ConnectionState::Connecting {
                peer: peer.endpoint.clone(),
            };
        }

        let transport = Arc::clone(&self.transport);
        let outcome_tx = self.outcome_tx.clone();
        let task_peer = peer.clone();
        let task_passcode = passcode.clone();
        let handle = tokio::spawn(async move {
            let result = transport
                .handshake(task_peer.addr, task_passcode.clone())
                .await;
            // Receiver dropped means the orchestrator is shutting down.
            let _ = outcome_tx
                .send(AttemptOutcome {
                    id,
                    peer: task_peer,
                    passcode_used: task_passcode,
                    result,
                })
                .await;
        });

        self.inflight = Some(Inflight { id, handle });
        Vec::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
