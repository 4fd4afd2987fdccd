//! Pure domain entities: the peer model and the peer registry.
//!
//! Nothing in this module performs I/O; the agent's infrastructure layer
//! feeds it resolved discovery data.

pub mod peer;
pub mod registry;

pub use peer::{protected_from_metadata, Peer, PeerEndpoint, PROTECTED_KEY, UNNAMED_PEER};
pub use registry::PeerRegistry;
