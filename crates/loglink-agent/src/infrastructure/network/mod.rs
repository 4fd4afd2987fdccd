//! Network-facing services: DNS-SD browsing and the TCP pairing handshake.

pub mod browser;
pub mod handshake;
pub mod mock;

use loglink_core::domain::peer::{Peer, PeerEndpoint};
use thiserror::Error;
use tokio::sync::mpsc;

/// Error type for discovery-layer failures.
///
/// These are reported to the owner, never fatal: browsing can be restarted
/// after the underlying condition (multicast disabled, no usable interface,
/// local-network permission denied) clears.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The mDNS daemon could not be started.
    #[error("mDNS daemon unavailable: {0}")]
    DaemonUnavailable(String),
    /// The browse request itself was refused.
    #[error("browse failed for {service_type}: {message}")]
    BrowseFailed {
        service_type: String,
        message: String,
    },
}

/// Continuous discovery updates delivered while browsing is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    /// A peer was resolved (first sight or advertisement refresh).
    PeerFound(Peer),
    /// A previously seen peer left the network.
    PeerLost(PeerEndpoint),
    /// The browse stopped working mid-flight; the owner may restart.
    Failed(DiscoveryError),
}

/// Seam over service browsing so the orchestrator can be driven by scripted
/// discovery in tests.
pub trait Discoverer: Send {
    /// Begins browsing.  Returns the event stream; events stop when the
    /// browse is stopped or the discoverer is dropped.
    fn start(&mut self) -> Result<mpsc::Receiver<BrowserEvent>, DiscoveryError>;

    /// Halts browsing and clears internal state.  Idempotent.
    fn stop(&mut self);
}
