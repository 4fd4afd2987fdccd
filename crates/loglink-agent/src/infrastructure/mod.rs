//! Infrastructure layer: mDNS discovery, the TCP pairing transport, and
//! durable storage (configuration and the passcode store).

pub mod network;
pub mod storage;
