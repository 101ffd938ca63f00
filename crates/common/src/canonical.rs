//! The byte sequence that is hashed and signed.
//!
//! ```text
//! content || "\n" || assertion_1 || "\n" || ... || assertion_n || "\n" || timestamp || "\n"
//! ```
//!
//! The signer uses the whole content it was given. The verifier uses the
//! content up to the located block and the assertion and timestamp lines read
//! back out of that block, so both sides arrive at the same bytes.

use sha2::{Digest, Sha256};

use crate::frame::BlockLocation;

/// Message signed for `content`, `assertions` and `timestamp`.
#[must_use]
pub fn message_for_signing(content: &[u8], assertions: &[String], timestamp: &str) -> Vec<u8> {
    let mut message = content.to_vec();
    message.push(b'\n');
    for assertion in assertions {
        message.extend_from_slice(assertion.as_bytes());
        message.push(b'\n');
    }
    message.extend_from_slice(timestamp.as_bytes());
    message.push(b'\n');
    message
}

/// Message a located block claims to have signed.
///
/// `block` must have been located in `content`.
#[must_use]
pub fn message_for_verification(content: &[u8], block: &BlockLocation) -> Vec<u8> {
    message_for_signing(&content[..block.offset], &block.assertions, &block.timestamp)
}

/// SHA-256 digest of a canonical message.
#[must_use]
pub fn digest(message: &[u8]) -> [u8; 32] {
    Sha256::digest(message).into()
}
