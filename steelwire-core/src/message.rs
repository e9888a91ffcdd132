/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Gateway message model and trailer wire format.
//!
//! The gateway exchanges a small set of structured messages with the
//! counterparty. Every frame on the wire is the JSON-encoded message body
//! followed by an integrity trailer of the form `{MAC:<hex>}{CHK:<hex>}`.
//!
//! Field-level content of business payloads is opaque to this crate; the
//! payload travels as raw bytes.

use crate::error::{IntegrityError, Result};
use crate::types::{CounterpartyId, MsgRef};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Hex length of the HMAC-SHA256 trailer field.
pub const MAC_HEX_LEN: usize = 64;

/// Hex length of the SHA-256 checksum trailer field.
pub const CHK_HEX_LEN: usize = 64;

/// Total byte length of an encoded trailer: `{MAC:<64>}{CHK:<64>}`.
pub const TRAILER_LEN: usize = 5 + MAC_HEX_LEN + 1 + 5 + CHK_HEX_LEN + 1;

/// Integrity trailer carried at the end of every frame.
///
/// The checksum is a structure-sensitive hash of the frame content; the MAC
/// is a keyed hash over the same content using the bilateral shared secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    /// Hex-encoded HMAC-SHA256 over the content.
    pub mac: String,
    /// Hex-encoded SHA-256 of the content.
    pub checksum: String,
}

impl Trailer {
    /// Encodes the trailer in wire format: `{MAC:<hex>}{CHK:<hex>}`.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{{MAC:{}}}{{CHK:{}}}", self.mac, self.checksum)
    }

    /// Splits a frame into its content and trailer.
    ///
    /// Validation works on raw bytes; the frame is attacker-controlled and
    /// must never be indexed as a string before its structure is proven.
    ///
    /// # Arguments
    /// * `frame` - The full frame, content followed by the trailer
    ///
    /// # Errors
    /// Returns [`IntegrityError::MalformedTrailer`] if the frame is shorter
    /// than a trailer or the trailer structure is invalid.
    pub fn split_frame(frame: &[u8]) -> std::result::Result<(&[u8], Self), IntegrityError> {
        if frame.len() < TRAILER_LEN {
            return Err(IntegrityError::MalformedTrailer(
                "frame shorter than trailer".to_string(),
            ));
        }

        let (content, tail) = frame.split_at(frame.len() - TRAILER_LEN);

        let mac_end = 5 + MAC_HEX_LEN;
        if !tail.starts_with(b"{MAC:") || tail[mac_end] != b'}' {
            return Err(IntegrityError::MalformedTrailer(
                "missing MAC field".to_string(),
            ));
        }
        let chk = &tail[mac_end + 1..];
        if !chk.starts_with(b"{CHK:") || chk[chk.len() - 1] != b'}' {
            return Err(IntegrityError::MalformedTrailer(
                "missing CHK field".to_string(),
            ));
        }

        let mac = &tail[5..mac_end];
        let checksum = &chk[5..5 + CHK_HEX_LEN];
        if !is_lower_hex(mac) || !is_lower_hex(checksum) {
            return Err(IntegrityError::MalformedTrailer(
                "trailer fields are not hex".to_string(),
            ));
        }

        // Hex bytes are ASCII, so the conversion cannot fail past this point.
        let mac = std::str::from_utf8(mac)
            .map_err(|_| IntegrityError::MalformedTrailer("mac is not utf-8".to_string()))?;
        let checksum = std::str::from_utf8(checksum)
            .map_err(|_| IntegrityError::MalformedTrailer("checksum is not utf-8".to_string()))?;

        Ok((
            content,
            Self {
                mac: mac.to_string(),
                checksum: checksum.to_string(),
            },
        ))
    }
}

fn is_lower_hex(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(b))
}

/// Resolution delivered for a registered acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckResolution {
    /// Positive confirmation.
    Ack,
    /// Negative confirmation with a counterparty reason code.
    Nack {
        /// Counterparty reason code.
        code: String,
        /// Human-readable rejection details.
        text: String,
    },
}

/// A structured gateway message.
///
/// The `kind` tag drives routing in the inbound pipeline; only `Business`
/// messages carry a protocol sequence number and a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GatewayMessage {
    /// Handshake request carrying credentials and the sender's last accepted
    /// input sequence.
    Handshake {
        /// Unique message reference.
        reference: MsgRef,
        /// The initiating party.
        counterparty_id: CounterpartyId,
        /// Last input sequence the initiator accepted.
        last_input_sequence: u64,
        /// Opaque credential material.
        credentials: String,
    },
    /// Handshake response. The signature is an HMAC over the canonical
    /// response content, verified against the trusted key registered for the
    /// counterparty.
    HandshakeAck {
        /// Unique message reference.
        reference: MsgRef,
        /// The responding party.
        counterparty_id: CounterpartyId,
        /// Last sequence the responder received from us.
        last_received_sequence: u64,
        /// Hex-encoded signature over the canonical content.
        signature: String,
    },
    /// Sequence-numbered business message with an opaque payload.
    Business {
        /// Business message reference (idempotency key).
        reference: MsgRef,
        /// Protocol sequence number.
        sequence: u64,
        /// Opaque business payload.
        payload: Bytes,
    },
    /// Keep-alive probe with a unique reference and no business payload.
    KeepAlive {
        /// Unique probe reference, echoed by the response.
        reference: MsgRef,
    },
    /// Response to a keep-alive probe, echoing its reference.
    KeepAliveResponse {
        /// Reference of the probe being answered.
        reference: MsgRef,
    },
    /// Request for retransmission of a missing sequence range.
    RecoveryRequest {
        /// Unique message reference.
        reference: MsgRef,
        /// First missing sequence (inclusive).
        begin: u64,
        /// Last missing sequence (inclusive).
        end: u64,
    },
    /// Positive acknowledgment of a previously sent business message.
    Ack {
        /// Unique message reference.
        reference: MsgRef,
        /// Reference of the message being acknowledged.
        message_id: MsgRef,
    },
    /// Negative acknowledgment with a reason code.
    Nack {
        /// Unique message reference.
        reference: MsgRef,
        /// Reference of the message being rejected.
        message_id: MsgRef,
        /// Counterparty reason code.
        code: String,
        /// Human-readable rejection details.
        text: String,
    },
    /// Orderly session termination.
    Logout {
        /// Unique message reference.
        reference: MsgRef,
    },
}

impl GatewayMessage {
    /// Creates a keep-alive probe with a fresh unique reference.
    #[must_use]
    pub fn keep_alive() -> Self {
        Self::KeepAlive {
            reference: MsgRef::generate(),
        }
    }

    /// Creates a recovery request for the missing range `[begin, end]`.
    #[must_use]
    pub fn recovery_request(begin: u64, end: u64) -> Self {
        Self::RecoveryRequest {
            reference: MsgRef::generate(),
            begin,
            end,
        }
    }

    /// Returns the unique reference of this message.
    #[must_use]
    pub fn reference(&self) -> &MsgRef {
        match self {
            Self::Handshake { reference, .. }
            | Self::HandshakeAck { reference, .. }
            | Self::Business { reference, .. }
            | Self::KeepAlive { reference }
            | Self::KeepAliveResponse { reference }
            | Self::RecoveryRequest { reference, .. }
            | Self::Ack { reference, .. }
            | Self::Nack { reference, .. }
            | Self::Logout { reference } => reference,
        }
    }

    /// Encodes the message body as JSON bytes (without trailer).
    ///
    /// # Errors
    /// Returns [`GatewayError::Codec`] if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a message body from JSON bytes (without trailer).
    ///
    /// # Errors
    /// Returns [`GatewayError::Codec`] if the bytes are not a valid message.
    pub fn decode(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }
}

impl From<&GatewayMessage> for Option<AckResolution> {
    fn from(message: &GatewayMessage) -> Self {
        match message {
            GatewayMessage::Ack { .. } => Some(AckResolution::Ack),
            GatewayMessage::Nack { code, text, .. } => Some(AckResolution::Nack {
                code: code.clone(),
                text: text.clone(),
            }),
            _ => None,
        }
    }
}
