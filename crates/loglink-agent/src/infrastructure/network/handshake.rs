//! TCP implementation of the pairing handshake.
//!
//! One short-lived exchange per connect attempt: open a TCP stream to the
//! peer's resolved address, send `Hello` (optionally carrying a passcode),
//! read exactly one reply frame, classify it.  The whole exchange runs under
//! a single deadline.
//!
//! On accept the stream is handed to the logging transport in the full
//! system; that stream format is out of this crate's scope, so the transport
//! here only reports the accepted server's name.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use loglink_core::protocol::messages::{
    HelloMessage, PairingMessage, RejectReason, HEADER_SIZE, MAX_PAYLOAD_LEN,
};
use loglink_core::protocol::{decode_frame, encode_frame, ProtocolError};

use crate::application::connection::{ConnectError, PairingTransport};

/// Production [`PairingTransport`] speaking the framed pairing protocol.
pub struct TcpPairingTransport {
    agent_name: String,
    timeout: Duration,
}

impl TcpPairingTransport {
    pub fn new(agent_name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent_name: agent_name.into(),
            timeout,
        }
    }

    async fn exchange(
        &self,
        addr: SocketAddr,
        passcode: Option<String>,
    ) -> Result<String, ConnectError> {
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ConnectError::Unreachable(e.to_string()))?;
        debug!("handshake stream open to {addr}");

        let hello = PairingMessage::Hello(HelloMessage {
            agent_name: self.agent_name.clone(),
            passcode,
        });
        let frame = encode_frame(&hello)?;
        stream
            .write_all(&frame)
            .await
            .map_err(|e| ConnectError::Unreachable(e.to_string()))?;

        let reply = read_frame(&mut stream).await?;
        match reply {
            PairingMessage::HelloAck(ack) => Ok(ack.server_name),
            PairingMessage::Reject(reject) => Err(match reject.reason {
                RejectReason::InvalidPasscode => ConnectError::InvalidPasscode,
                RejectReason::Busy => ConnectError::Busy,
            }),
            PairingMessage::Hello(_) => Err(ConnectError::Protocol(
                ProtocolError::MalformedPayload("unexpected Hello from server".to_string()),
            )),
        }
    }
}

#[async_trait]
impl PairingTransport for TcpPairingTransport {
    async fn handshake(
        &self,
        addr: SocketAddr,
        passcode: Option<String>,
    ) -> Result<String, ConnectError> {
        let deadline_ms = self.timeout.as_millis() as u64;
        tokio::time::timeout(self.timeout, self.exchange(addr, passcode))
            .await
            .map_err(|_| ConnectError::Timeout(deadline_ms))?
    }
}

/// Reads exactly one pairing frame from the stream.
async fn read_frame(stream: &mut TcpStream) -> Result<PairingMessage, ConnectError> {
    let mut header = [0u8; HEADER_SIZE];
    stream
        .read_exact(&mut header)
        .await
        .map_err(|e| ConnectError::Unreachable(e.to_string()))?;

    let payload_len = u32::from_be_bytes([header[2], header[3], header[4], header[5]]) as usize;
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(ConnectError::Protocol(ProtocolError::PayloadTooLarge(
            payload_len,
        )));
    }

    let mut frame = vec![0u8; HEADER_SIZE + payload_len];
    frame[..HEADER_SIZE].copy_from_slice(&header);
    stream
        .read_exact(&mut frame[HEADER_SIZE..])
        .await
        .map_err(|e| ConnectError::Unreachable(e.to_string()))?;

    let (msg, _) = decode_frame(&frame)?;
    Ok(msg)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
