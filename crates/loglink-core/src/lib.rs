//! # loglink-core
//!
//! Shared library for LogLink containing the peer domain model, the peer
//! registry, and the pairing handshake protocol.
//!
//! LogLink lets an application stream its logs to a viewer elsewhere on the
//! local network.  Viewers advertise a `_loglink._tcp` DNS-SD service; the
//! embedded agent browses for them, optionally submits a passcode, and keeps
//! a single active connection.  This crate is the agent's foundation:
//!
//! - **`domain`** – the [`Peer`] entity (endpoint identity, display name,
//!   protection flag) and the [`PeerRegistry`] that deduplicates and orders
//!   discovered peers for presentation.
//!
//! - **`protocol`** – the connect handshake surface: `Hello` →
//!   `HelloAck`/`Reject` messages and their framed binary codec.  The logging
//!   stream that follows a successful handshake is owned by the transport
//!   layer, not this crate.
//!
//! It has zero dependencies on OS APIs, UI frameworks, or network sockets.

pub mod domain;
pub mod protocol;

pub use domain::peer::{protected_from_metadata, Peer, PeerEndpoint, PROTECTED_KEY, UNNAMED_PEER};
pub use domain::registry::PeerRegistry;
pub use protocol::codec::{decode_frame, encode_frame, ProtocolError};
pub use protocol::messages::{PairingMessage, RejectReason};
