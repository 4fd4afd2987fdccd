//! Peer entity and endpoint identity.
//!
//! A *peer* is a log-viewer server discovered on the local network (or added
//! manually by address).  Its identity is the [`PeerEndpoint`]: stable across
//! discovery refresh cycles, comparable, and hashable so the registry can
//! deduplicate on it.
//!
//! Everything here is pure data; no sockets, no I/O.  The agent's
//! infrastructure layer constructs `Peer` values from resolved DNS-SD service
//! records and feeds them to the registry.

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Display name used when a peer advertised no usable name.
pub const UNNAMED_PEER: &str = "Unknown server";

/// TXT metadata key that marks a peer as passcode-protected.
pub const PROTECTED_KEY: &str = "protected";

// ── Endpoint identity ─────────────────────────────────────────────────────────

/// Network identity of a peer.
///
/// Discovery produces `Service` endpoints (the DNS-SD instance fullname is
/// unique on the LAN and survives re-resolution).  Manually entered peers are
/// `Direct` endpoints identified by their socket address.
///
/// Each kind has an explicit accessor; the accessor for every *other* kind
/// returns `None`; callers must not assume a particular kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerEndpoint {
    /// A DNS-SD service instance, e.g. `office-mac._loglink._tcp.local.`.
    Service { fullname: String },
    /// A directly addressed peer added without discovery.
    Direct { addr: SocketAddr },
}

impl PeerEndpoint {
    /// The DNS-SD instance fullname, or `None` for non-service endpoints.
    pub fn service_fullname(&self) -> Option<&str> {
        match self {
            PeerEndpoint::Service { fullname } => Some(fullname),
            _ => None,
        }
    }

    /// The direct socket address, or `None` for non-direct endpoints.
    pub fn direct_addr(&self) -> Option<SocketAddr> {
        match self {
            PeerEndpoint::Direct { addr } => Some(*addr),
            _ => None,
        }
    }

    /// The instance label of a service fullname (everything before the first
    /// dot), used as a display-name fallback.  `None` for direct endpoints.
    pub fn instance_label(&self) -> Option<&str> {
        self.service_fullname()
            .and_then(|f| f.split('.').next())
            .filter(|s| !s.is_empty())
    }
}

impl fmt::Display for PeerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerEndpoint::Service { fullname } => write!(f, "{fullname}"),
            PeerEndpoint::Direct { addr } => write!(f, "{addr}"),
        }
    }
}

// ── Peer entity ───────────────────────────────────────────────────────────────

/// A discovered (or manually added) log-viewer peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Stable identity; see [`PeerEndpoint`].
    pub endpoint: PeerEndpoint,
    /// Advertised display name, if any.  Use [`Peer::display_name`] to read it.
    pub name: Option<String>,
    /// Resolved address the handshake connects to.
    pub addr: SocketAddr,
    /// Whether the peer requires a passcode before accepting a connection.
    ///
    /// Derived once per advertisement from the `"protected"` TXT key; a later
    /// re-advertisement replaces the whole entry via registry upsert.
    pub protected: bool,
}

impl Peer {
    /// The name to show in a server list: the advertised name, then the
    /// service instance label, then [`UNNAMED_PEER`].
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(n) if !n.is_empty() => n,
            _ => self.endpoint.instance_label().unwrap_or(UNNAMED_PEER),
        }
    }
}

/// Interprets the value of the `"protected"` TXT key.
///
/// Only `"true"` (any case) and `"1"` mean protected.  An absent key, an
/// empty value, or anything unparseable means *not* protected; discovery
/// metadata from unknown peers must never make this fail.
pub fn protected_from_metadata(value: Option<&str>) -> bool {
    match value {
        Some(v) => v.eq_ignore_ascii_case("true") || v == "1",
        None => false,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
