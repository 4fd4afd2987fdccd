//! Pairing handshake wire protocol: message types and the frame codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_frame, encode_frame, ProtocolError};
pub use messages::{
    HelloAckMessage, HelloMessage, MessageType, PairingMessage, RejectMessage, RejectReason,
};
