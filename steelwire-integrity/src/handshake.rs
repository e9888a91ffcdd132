/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Handshake signature verification.
//!
//! A handshake response must carry a signature over its canonical content,
//! verified against the trusted key registered for the counterparty. Merely
//! recognizing a literal success token is insufficient: a response with a
//! missing or invalid signature is a fatal handshake failure.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use steelwire_core::types::{CounterpartyId, MsgRef};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Counterparty identity to verification key lookup.
///
/// External collaborator: implementations typically back onto a key vault or
/// bilateral key exchange records.
pub trait TrustedKeyProvider: Send + Sync {
    /// Returns the verification key registered for `counterparty`, or `None`
    /// if the counterparty is unknown.
    fn verification_key(&self, counterparty: &CounterpartyId) -> Option<Vec<u8>>;
}

/// Canonical content of a handshake response, the bytes the signature
/// covers. Both sides must derive this identically.
#[must_use]
fn canonical_content(
    reference: &MsgRef,
    counterparty: &CounterpartyId,
    last_received_sequence: u64,
) -> String {
    format!("{reference}|{counterparty}|{last_received_sequence}")
}

/// Signs a handshake response's canonical content.
///
/// # Arguments
/// * `reference` - The response message reference
/// * `counterparty` - The responding party
/// * `last_received_sequence` - The sequence value the responder reports
/// * `key` - The signing key
///
/// # Returns
/// The hex-encoded signature.
#[must_use]
pub fn sign_handshake_ack(
    reference: &MsgRef,
    counterparty: &CounterpartyId,
    last_received_sequence: u64,
    key: &[u8],
) -> String {
    let content = canonical_content(reference, counterparty, last_received_sequence);
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(content.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a handshake response signature in constant time.
///
/// # Arguments
/// * `reference` - The response message reference
/// * `counterparty` - The responding party
/// * `last_received_sequence` - The sequence value the responder reports
/// * `signature` - The hex-encoded signature from the response
/// * `key` - The trusted verification key for the counterparty
#[must_use]
pub fn verify_handshake_ack(
    reference: &MsgRef,
    counterparty: &CounterpartyId,
    last_received_sequence: u64,
    signature: &str,
    key: &[u8],
) -> bool {
    let expected = sign_handshake_ack(reference, counterparty, last_received_sequence, key);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}
