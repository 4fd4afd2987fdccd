//! Pairing handshake message types.
//!
//! The handshake is the only wire surface this crate owns; once a peer sends
//! [`PairingMessage::HelloAck`] the connection is handed to the logging
//! transport, whose stream format lives elsewhere.
//!
//! ```text
//! Agent                               Server
//! ─────                               ──────
//! Hello { agent_name, passcode? } ──►
//!                                 ◄── HelloAck { server_name }
//!                                  or Reject { reason }
//! ```

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Current handshake protocol version byte.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Total size of the frame header in bytes:
/// `[version:1][msg_type:1][payload_len:4]`.
pub const HEADER_SIZE: usize = 6;

/// Upper bound on a handshake payload.  Hello/HelloAck/Reject are tiny; a
/// larger declared length means a corrupt or hostile frame.
pub const MAX_PAYLOAD_LEN: usize = 4096;

// ── Message type codes ────────────────────────────────────────────────────────

/// Frame type codes carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    Hello = 0x01,
    HelloAck = 0x02,
    Reject = 0x03,
}

impl TryFrom<u8> for MessageType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MessageType::Hello),
            0x02 => Ok(MessageType::HelloAck),
            0x03 => Ok(MessageType::Reject),
            _ => Err(()),
        }
    }
}

// ── Payload types ─────────────────────────────────────────────────────────────

/// First message of every connection, sent by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloMessage {
    /// Human-readable name of the connecting application.
    pub agent_name: String,
    /// Shared secret for passcode-protected servers; `None` for plain peers.
    pub passcode: Option<String>,
}

/// Positive handshake reply: the server accepts the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloAckMessage {
    /// The server's display name, echoed back so the agent can show what it
    /// actually connected to.
    pub server_name: String,
}

/// Why a server refused the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// The submitted passcode was missing or wrong.
    InvalidPasscode,
    /// The server already has an active agent and accepts one at a time.
    Busy,
}

/// Negative handshake reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectMessage {
    pub reason: RejectReason,
}

/// All handshake messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairingMessage {
    Hello(HelloMessage),
    HelloAck(HelloAckMessage),
    Reject(RejectMessage),
}

impl PairingMessage {
    /// The frame type code for this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            PairingMessage::Hello(_) => MessageType::Hello,
            PairingMessage::HelloAck(_) => MessageType::HelloAck,
            PairingMessage::Reject(_) => MessageType::Reject,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_round_trips_through_u8() {
        for ty in [MessageType::Hello, MessageType::HelloAck, MessageType::Reject] {
            assert_eq!(MessageType::try_from(ty as u8), Ok(ty));
        }
    }

    #[test]
    fn test_unknown_message_type_is_rejected() {
        assert!(MessageType::try_from(0x7F).is_err());
        assert!(MessageType::try_from(0x00).is_err());
    }

    #[test]
    fn test_message_type_matches_variant() {
        let hello = PairingMessage::Hello(HelloMessage {
            agent_name: "app".to_string(),
            passcode: None,
        });
        assert_eq!(hello.message_type(), MessageType::Hello);

        let reject = PairingMessage::Reject(RejectMessage {
            reason: RejectReason::Busy,
        });
        assert_eq!(reject.message_type(), MessageType::Reject);
    }
}
