//! Checking signature blocks.
//!
//! Verification locates the last block, rebuilds the canonical message from
//! the content before it and the assertion lines inside it, checks the RSA
//! signature against the public key embedded in the block, and only then asks
//! the trust store whether that key belongs to a trusted signer.

use std::fmt;
use std::path::Path;

use base64::{engine::general_purpose, Engine};
use error_stack::Report;
use rsa::Pkcs1v15Sign;
use serde::Serialize;
use sha2::Sha256;

use crate::canonical::{digest, message_for_verification};
use crate::error::{
    AttestError, IntoExitCode, EXIT_SIGNATURE_MISMATCH, EXIT_SUCCESS, EXIT_UNTRUSTED_KEY,
};
use crate::frame::{locate, BlockLocation};
use crate::keys::parse_public_key;
use crate::trust::TrustStore;

/// Outcome of verifying a located block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The signature matches and the key is trusted.
    Success,
    /// The signature does not match the content, assertions or key.
    SignatureMismatch,
    /// The signature matches but the key is not in the trust store.
    UntrustedKey,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "verify success"),
            Self::SignatureMismatch => write!(f, "{}", AttestError::SignatureMismatch),
            Self::UntrustedKey => write!(f, "{}", AttestError::UntrustedKey),
        }
    }
}

impl IntoExitCode for Verdict {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Success => EXIT_SUCCESS,
            Self::SignatureMismatch => EXIT_SIGNATURE_MISMATCH,
            Self::UntrustedKey => EXIT_UNTRUSTED_KEY,
        }
    }
}

/// A verdict together with the block it was reached for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub verdict: Verdict,
    pub block: BlockLocation,
    /// Bytes after the block. They are not covered by any signature.
    pub trailing_bytes: usize,
}

/// Verifies blocks against an in-memory trust store.
#[derive(Debug, Clone, Default)]
pub struct Verifier {
    trust_store: TrustStore,
}

impl Verifier {
    #[must_use]
    pub fn new(trust_store: TrustStore) -> Self {
        Self { trust_store }
    }

    /// Build a verifier from the trust store file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AttestError::Configuration`] if the file exists but cannot
    /// be read.
    pub fn from_path(path: &Path) -> Result<Self, Report<AttestError>> {
        TrustStore::load(path).map(Self::new)
    }

    /// Verify the last block in `content`.
    ///
    /// # Errors
    ///
    /// Returns [`AttestError::BlockNotFound`] if there is no block and
    /// [`AttestError::KeyParse`] if its embedded key cannot be decoded.
    pub fn verify(&self, content: &[u8]) -> Result<Verification, Report<AttestError>> {
        let block = locate(content)?;
        evaluate(content, block, |key| Ok(self.trust_store.is_trusted(key)))
    }

    /// Verify a block previously located in `content`.
    ///
    /// # Errors
    ///
    /// Returns [`AttestError::KeyParse`] if the block's key cannot be decoded.
    pub fn verify_block(
        &self,
        content: &[u8],
        block: BlockLocation,
    ) -> Result<Verification, Report<AttestError>> {
        evaluate(content, block, |key| Ok(self.trust_store.is_trusted(key)))
    }
}

/// Verify the last block in `content`, reading the trust store at
/// `trust_store_path` only once the signature itself has checked out.
///
/// # Errors
///
/// Returns [`AttestError::BlockNotFound`] if there is no block,
/// [`AttestError::KeyParse`] if its embedded key cannot be decoded, and
/// [`AttestError::Configuration`] if the trust store cannot be read.
pub fn verify(
    content: &[u8],
    trust_store_path: &Path,
) -> Result<Verification, Report<AttestError>> {
    let block = locate(content)?;
    evaluate(content, block, |key| {
        TrustStore::load(trust_store_path).map(|store| store.is_trusted(key))
    })
}

/// Return the public key text embedded in the last block without checking
/// anything.
///
/// # Errors
///
/// Returns [`AttestError::BlockNotFound`] if there is no block.
pub fn extract_key(content: &[u8]) -> Result<String, Report<AttestError>> {
    locate(content).map(|block| block.public_key)
}

fn evaluate<F>(
    content: &[u8],
    block: BlockLocation,
    is_trusted: F,
) -> Result<Verification, Report<AttestError>>
where
    F: FnOnce(&str) -> Result<bool, Report<AttestError>>,
{
    let verdict = if !signature_matches(content, &block)? {
        Verdict::SignatureMismatch
    } else if is_trusted(&block.public_key)? {
        Verdict::Success
    } else {
        Verdict::UntrustedKey
    };

    let trailing_bytes = content.len().saturating_sub(block.end);
    if trailing_bytes > 0 {
        log::warn!("{trailing_bytes} byte(s) after the signature block are not covered by it");
    }
    log::info!("{verdict}: {} signed {}", block.public_key, block.timestamp);

    Ok(Verification {
        verdict,
        block,
        trailing_bytes,
    })
}

fn signature_matches(content: &[u8], block: &BlockLocation) -> Result<bool, Report<AttestError>> {
    let message = message_for_verification(content, block);
    let hashed = digest(&message);
    log::debug!(
        "verifying {} byte message, sha256:{}",
        message.len(),
        hex::encode(hashed)
    );

    let public_key = parse_public_key(&block.public_key)?;

    let signature = match general_purpose::STANDARD.decode(&block.signature) {
        Ok(signature) => signature,
        Err(e) => {
            log::warn!("signature text is not valid base64: {e}");
            return Ok(false);
        }
    };

    Ok(public_key
        .verify(Pkcs1v15Sign::new::<Sha256>(), &hashed, &signature)
        .is_ok())
}
