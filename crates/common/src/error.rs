//! Error types for signing and verification.
//!
//! Errors travel inside [`error_stack::Report`] so call sites can attach the
//! file path or offset they were working on, while the variant alone decides
//! the process exit status.

use derive_more::{Display, Error};

/// Exit status for a successful run.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit status when the signature does not match the content.
pub const EXIT_SIGNATURE_MISMATCH: u8 = 1;
/// Exit status when the signing key is absent from the trust store.
pub const EXIT_UNTRUSTED_KEY: u8 = 2;
/// Exit status when no signature block could be located.
pub const EXIT_BLOCK_NOT_FOUND: u8 = 3;
/// Exit status when a key could not be decoded.
pub const EXIT_KEY_PARSE: u8 = 4;
/// Exit status for configuration problems (key files, format names, settings).
pub const EXIT_CONFIGURATION: u8 = 5;
/// Exit status when the RSA primitive itself fails.
pub const EXIT_CRYPTO: u8 = 6;

/// Errors raised while framing, signing or verifying a signature block.
#[derive(Debug, Display, Error)]
pub enum AttestError {
    /// No well-formed signature block was found in the content.
    #[display("Signature not found")]
    BlockNotFound,

    /// A public or private key could not be decoded.
    #[display("Key parse error: {message}")]
    KeyParse { message: String },

    /// The signature does not match the content and assertions.
    #[display("Signature verification failed")]
    SignatureMismatch,

    /// The signature is valid but its public key is not trusted.
    #[display("Public key of signature not found in trust store")]
    UntrustedKey,

    /// Unreadable key files, unknown format names, invalid settings.
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    /// The RSA signing primitive failed.
    #[display("Cryptographic error: {message}")]
    Crypto { message: String },
}

/// Maps an outcome to the process exit status downstream tooling branches on.
pub trait IntoExitCode {
    /// The exit status for this outcome.
    fn exit_code(&self) -> u8;
}

impl IntoExitCode for AttestError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::BlockNotFound => EXIT_BLOCK_NOT_FOUND,
            Self::KeyParse { .. } => EXIT_KEY_PARSE,
            Self::SignatureMismatch => EXIT_SIGNATURE_MISMATCH,
            Self::UntrustedKey => EXIT_UNTRUSTED_KEY,
            Self::Configuration { .. } => EXIT_CONFIGURATION,
            Self::Crypto { .. } => EXIT_CRYPTO,
        }
    }
}

impl AttestError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn key_parse(message: impl Into<String>) -> Self {
        Self::KeyParse {
            message: message.into(),
        }
    }
}
