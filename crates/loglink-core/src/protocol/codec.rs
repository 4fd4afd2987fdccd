//! Binary codec for the pairing handshake frames.
//!
//! Wire format:
//! ```text
//! [version:1][msg_type:1][payload_len:4][payload:N]
//! ```
//! Header is 6 bytes, `payload_len` is big-endian, payload is bincode.

use thiserror::Error;

use crate::protocol::messages::{
    HelloAckMessage, HelloMessage, MessageType, PairingMessage, RejectMessage, HEADER_SIZE,
    MAX_PAYLOAD_LEN, PROTOCOL_VERSION,
};

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the declared frame length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The message type byte in the header is not a recognized value.
    #[error("unknown message type: 0x{0:02X}")]
    UnknownMessageType(u8),

    /// The protocol version in the header is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The declared payload length exceeds the handshake maximum.
    #[error("payload length {0} exceeds maximum {MAX_PAYLOAD_LEN}")]
    PayloadTooLarge(usize),

    /// The payload bytes could not be deserialized into the declared type.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`PairingMessage`] into a byte vector including the 6-byte header.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if bincode serialization fails
/// (practically impossible for these types, but never panics).
pub fn encode_frame(msg: &PairingMessage) -> Result<Vec<u8>, ProtocolError> {
    let payload = match msg {
        PairingMessage::Hello(m) => bincode::serialize(m),
        PairingMessage::HelloAck(m) => bincode::serialize(m),
        PairingMessage::Reject(m) => bincode::serialize(m),
    }
    .map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.push(PROTOCOL_VERSION);
    buf.push(msg.message_type() as u8);
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decodes one [`PairingMessage`] from the beginning of `bytes`.
///
/// Returns the decoded message and the total number of bytes consumed
/// (header + payload) so the caller can advance its read cursor.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are truncated or malformed.
pub fn decode_frame(bytes: &[u8]) -> Result<(PairingMessage, usize), ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let version = bytes[0];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let msg_type =
        MessageType::try_from(bytes[1]).map_err(|_| ProtocolError::UnknownMessageType(bytes[1]))?;

    let payload_len = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]) as usize;
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge(payload_len));
    }

    let total = HEADER_SIZE + payload_len;
    if bytes.len() < total {
        return Err(ProtocolError::InsufficientData {
            needed: total,
            available: bytes.len(),
        });
    }

    let payload = &bytes[HEADER_SIZE..total];
    let msg = match msg_type {
        MessageType::Hello => bincode::deserialize::<HelloMessage>(payload)
            .map(PairingMessage::Hello)
            .map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?,
        MessageType::HelloAck => bincode::deserialize::<HelloAckMessage>(payload)
            .map(PairingMessage::HelloAck)
            .map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?,
        MessageType::Reject => bincode::deserialize::<RejectMessage>(payload)
            .map(PairingMessage::Reject)
            .map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?,
    };

    Ok((msg, total))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
