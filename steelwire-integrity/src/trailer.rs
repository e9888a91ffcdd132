/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Trailer computation and verification.
//!
//! The checksum is a structure-sensitive SHA-256 of the frame content; the
//! MAC is HMAC-SHA256 over the same content using the bilateral shared
//! secret. Verification recomputes both and compares in constant time.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use steelwire_core::error::IntegrityError;
use steelwire_core::message::Trailer;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Computes the trailer for `content` under `key`.
///
/// # Arguments
/// * `content` - The frame content to protect
/// * `key` - The bilateral shared secret
#[must_use]
pub fn compute(content: &[u8], key: &[u8]) -> Trailer {
    let checksum = Sha256::digest(content);

    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(content);
    let mac = mac.finalize().into_bytes();

    Trailer {
        mac: hex::encode(mac),
        checksum: hex::encode(checksum),
    }
}

/// Verifies `trailer` against `content` under `key`.
///
/// Recomputes both fields and compares via constant-time equality. Returns
/// true only if both match.
#[must_use]
pub fn verify(content: &[u8], trailer: &Trailer, key: &[u8]) -> bool {
    let expected = compute(content, key);

    let mac_ok: bool = expected
        .mac
        .as_bytes()
        .ct_eq(trailer.mac.as_bytes())
        .into();
    let chk_ok: bool = expected
        .checksum
        .as_bytes()
        .ct_eq(trailer.checksum.as_bytes())
        .into();

    mac_ok & chk_ok
}

/// Seals `content` into a wire frame: content followed by its trailer.
///
/// # Arguments
/// * `content` - The frame content
/// * `key` - The bilateral shared secret
#[must_use]
pub fn seal(content: &[u8], key: &[u8]) -> Vec<u8> {
    let trailer = compute(content, key);
    let mut frame = Vec::with_capacity(content.len() + steelwire_core::message::TRAILER_LEN);
    frame.extend_from_slice(content);
    frame.extend_from_slice(trailer.encode().as_bytes());
    frame
}

/// Opens a wire frame: splits off the trailer, verifies it, and returns the
/// content.
///
/// # Errors
/// Returns [`IntegrityError::MalformedTrailer`] if the trailer is missing or
/// structurally invalid, [`IntegrityError::ChecksumMismatch`] or
/// [`IntegrityError::MacMismatch`] if verification fails. Checksum and MAC
/// failures are reported distinctly; both reject the message outright.
pub fn open<'a>(frame: &'a [u8], key: &[u8]) -> Result<&'a [u8], IntegrityError> {
    let (content, trailer) = Trailer::split_frame(frame)?;
    let expected = compute(content, key);

    let chk_ok: bool = expected
        .checksum
        .as_bytes()
        .ct_eq(trailer.checksum.as_bytes())
        .into();
    if !chk_ok {
        return Err(IntegrityError::ChecksumMismatch);
    }

    let mac_ok: bool = expected
        .mac
        .as_bytes()
        .ct_eq(trailer.mac.as_bytes())
        .into();
    if !mac_ok {
        return Err(IntegrityError::MacMismatch);
    }

    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"bilateral-shared-secret";

    #[test]
    fn test_compute_is_deterministic() {
        let a = compute(b"content", KEY);
        let b = compute(b"content", KEY);
        assert_eq!(a, b);
    }

    #[test]
    fn test_verify_accepts_valid_trailer() {
        let trailer = compute(b"content", KEY);
        assert!(verify(b"content", &trailer, KEY));
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let trailer = compute(b"content", KEY);
        assert!(!verify(b"content", &trailer, b"other-key"));
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let frame = seal(b"payment instruction", KEY);
        let content = open(&frame, KEY).unwrap();
        assert_eq!(content, b"payment instruction");
    }

    #[test]
    fn test_single_bit_flip_fails_open() {
        let frame = seal(b"payment instruction", KEY);

        // Flip one bit in every content byte position in turn.
        let content_len = frame.len() - steelwire_core::message::TRAILER_LEN;
        for i in 0..content_len {
            let mut tampered = frame.clone();
            tampered[i] ^= 0x01;
            assert!(open(&tampered, KEY).is_err(), "bit flip at {i} not caught");
        }
    }

    #[test]
    fn test_open_wrong_key_is_mac_mismatch() {
        let frame = seal(b"content", KEY);
        let err = open(&frame, b"other-key").unwrap_err();
        assert_eq!(err, IntegrityError::MacMismatch);
    }

    #[test]
    fn test_open_tampered_checksum_field() {
        let mut frame = seal(b"content", KEY);
        // The checksum hex sits at the very end, before the closing brace.
        let idx = frame.len() - 2;
        frame[idx] = if frame[idx] == b'0' { b'1' } else { b'0' };
        let err = open(&frame, KEY).unwrap_err();
        assert_eq!(err, IntegrityError::ChecksumMismatch);
    }
}
