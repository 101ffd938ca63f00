//! Producing signature blocks.

use std::fmt;
use std::path::Path;

use base64::{engine::general_purpose, Engine};
use error_stack::{Report, ResultExt};
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::Sha256;

use crate::canonical::{digest, message_for_signing};
use crate::comments::{self, Delimiters};
use crate::error::AttestError;
use crate::frame::{check_cell, render, SignaturePayload};
use crate::keys::{load_private_key, load_public_key_text, parse_public_key};

/// `chrono` format of the timestamp line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time, second precision, as written into new blocks.
#[must_use]
pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Split a comma separated assertion list. Entries are trimmed; empty entries
/// are kept.
#[must_use]
pub fn parse_assertions(csv: &str) -> Vec<String> {
    csv.split(',').map(|a| a.trim().to_string()).collect()
}

/// An RSA private key paired with the public key text it embeds.
pub struct Signer {
    key: RsaPrivateKey,
    public_key: String,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl Signer {
    /// Pair `key` with the public key text that will be embedded in blocks.
    ///
    /// # Errors
    ///
    /// Returns [`AttestError::KeyParse`] if the text is not an RSA public key
    /// and [`AttestError::Configuration`] if it is not the public half of
    /// `key`.
    pub fn new(key: RsaPrivateKey, public_key: &str) -> Result<Self, Report<AttestError>> {
        let public_key = public_key.trim().to_string();
        let parsed = parse_public_key(&public_key).attach("while checking the public key file")?;

        if parsed != key.to_public_key() {
            return Err(Report::new(AttestError::configuration(
                "public key does not belong to the private key",
            ))
            .attach(format!("public key: {public_key}")));
        }

        Ok(Self { key, public_key })
    }

    /// Load the private key and public key text from disk.
    ///
    /// # Errors
    ///
    /// Returns [`AttestError::Configuration`] if either file is unreadable or
    /// the keys do not form a pair, and [`AttestError::KeyParse`] if the
    /// public key text cannot be decoded.
    pub fn from_files(
        private_key_path: &Path,
        public_key_path: &Path,
    ) -> Result<Self, Report<AttestError>> {
        let key = load_private_key(private_key_path)?;
        let public_key = load_public_key_text(public_key_path)?;
        Self::new(key, &public_key).attach(format!(
            "public key file: {}",
            public_key_path.display()
        ))
    }

    /// The public key text embedded in every block this signer renders.
    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Sign `content` and `assertions` as of now and render the block.
    ///
    /// # Errors
    ///
    /// See [`Signer::sign_at`].
    pub fn sign(
        &self,
        content: &[u8],
        assertions: &[String],
        delimiters: &Delimiters,
    ) -> Result<String, Report<AttestError>> {
        self.sign_at(content, assertions, delimiters, &timestamp_now())
    }

    /// Sign `content` and `assertions` with an explicit timestamp line and
    /// render the block. The result is meant to be appended to `content`.
    ///
    /// # Errors
    ///
    /// Returns [`AttestError::Configuration`] if an assertion does not fit on
    /// a line and [`AttestError::Crypto`] if the RSA operation fails.
    pub fn sign_at(
        &self,
        content: &[u8],
        assertions: &[String],
        delimiters: &Delimiters,
        timestamp: &str,
    ) -> Result<String, Report<AttestError>> {
        for line in assertions.iter().map(String::as_str).chain([timestamp]) {
            check_cell(line)?;
        }

        let message = message_for_signing(content, assertions, timestamp);
        let hashed = digest(&message);
        log::debug!(
            "signing {} byte message, sha256:{}",
            message.len(),
            hex::encode(hashed)
        );

        let signature = self
            .key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &hashed)
            .map_err(|e| {
                Report::new(AttestError::Crypto {
                    message: e.to_string(),
                })
            })?;
        let signature = general_purpose::STANDARD.encode(signature);

        render(
            &SignaturePayload {
                assertions,
                timestamp,
                signature: &signature,
                public_key: &self.public_key,
            },
            delimiters,
        )
    }
}

/// Sign `content` with the key pair at the given paths and render a block in
/// the comment style `format_name`.
///
/// # Errors
///
/// Returns [`AttestError::Configuration`] for an unknown format or unusable
/// key files, plus anything [`Signer::sign`] returns.
pub fn sign(
    content: &[u8],
    assertions_csv: &str,
    format_name: &str,
    private_key_path: &Path,
    public_key_path: &Path,
) -> Result<String, Report<AttestError>> {
    let delimiters = comments::find(format_name).ok_or_else(|| {
        Report::new(AttestError::configuration(format!(
            "unknown comment format: {format_name}"
        )))
    })?;
    let signer = Signer::from_files(private_key_path, public_key_path)?;
    let block = signer.sign(content, &parse_assertions(assertions_csv), &delimiters)?;

    log::info!(
        "signed {} bytes as {format_name} with {}",
        content.len(),
        signer.public_key()
    );
    Ok(block)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;

    use super::*;
    use crate::comments::lookup;
    use crate::keys::parse_private_key;
    use crate::test_support::tests::{
        alice_signer, fixture_path, ALICE_PRIVATE_PEM, GOLDEN_PYTHON_BLOCK, MALLORY_PUBLIC,
    };

    #[test]
    fn test_parse_assertions() {
        assert_eq!(parse_assertions("signed"), vec!["signed"]);
        assert_eq!(
            parse_assertions("signed, reviewed ,tested"),
            vec!["signed", "reviewed", "tested"]
        );
        assert_eq!(parse_assertions("a,,b"), vec!["a", "", "b"]);
        assert_eq!(parse_assertions(""), vec![""]);
    }

    #[test]
    fn test_timestamp_now_format() {
        let now = timestamp_now();
        assert_eq!(now.len(), 19);
        assert!(NaiveDateTime::parse_from_str(&now, TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn test_sign_at_matches_reference_output() {
        let signer = alice_signer();
        let block = signer
            .sign_at(
                b"hello\n",
                &parse_assertions("signed"),
                &lookup("python"),
                "2024-01-02 03:04:05",
            )
            .expect("should sign");

        assert_eq!(block, GOLDEN_PYTHON_BLOCK);
    }

    #[test]
    fn test_sign_embeds_public_key_verbatim() {
        let signer = alice_signer();
        let block = signer
            .sign(b"hello\n", &parse_assertions("signed"), &lookup("c"))
            .expect("should sign");

        let located = crate::frame::locate(block.as_bytes()).expect("should locate");
        assert_eq!(located.public_key, signer.public_key());
        assert_eq!(located.assertions, vec!["signed"]);
    }

    #[test]
    fn test_new_rejects_mismatched_public_key() {
        let key = parse_private_key(ALICE_PRIVATE_PEM).expect("parse");
        let err = Signer::new(key, MALLORY_PUBLIC).expect_err("wrong public key");
        assert!(matches!(
            err.current_context(),
            AttestError::Configuration { .. }
        ));
    }

    #[test]
    fn test_new_rejects_unparseable_public_key() {
        let key = parse_private_key(ALICE_PRIVATE_PEM).expect("parse");
        let err = Signer::new(key, "ssh-rsa garbage").expect_err("bad public key");
        assert!(matches!(err.current_context(), AttestError::KeyParse { .. }));
    }

    #[test]
    fn test_sign_rejects_wide_assertion() {
        let signer = alice_signer();
        let err = signer
            .sign(b"x", &["y".repeat(87)], &lookup("c"))
            .expect_err("too wide");
        assert!(matches!(
            err.current_context(),
            AttestError::Configuration { .. }
        ));
    }

    #[test]
    fn test_sign_rejects_untrimmed_assertions() {
        let signer = alice_signer();
        for assertion in [" lead", "tab\t"] {
            let err = signer
                .sign(b"hello\n", &[assertion.to_string()], &lookup("c"))
                .expect_err("would not verify");
            assert!(matches!(
                err.current_context(),
                AttestError::Configuration { .. }
            ));
        }
    }

    #[test]
    fn test_sign_from_files() {
        let block = sign(
            b"hello\n",
            "signed",
            "oberon",
            &fixture_path("alice.pem"),
            &fixture_path("alice.pub"),
        )
        .expect("should sign");
        assert!(block.starts_with("\n(*----Attest-0.1.0"));
    }

    #[test]
    fn test_sign_unknown_format() {
        let err = sign(
            b"hello\n",
            "signed",
            "cobol",
            &fixture_path("alice.pem"),
            &fixture_path("alice.pub"),
        )
        .expect_err("unknown format");
        assert!(matches!(
            err.current_context(),
            AttestError::Configuration { .. }
        ));
    }

    #[test]
    fn test_sign_missing_private_key() {
        let err = sign(
            b"hello\n",
            "signed",
            "oberon",
            &fixture_path("missing.pem"),
            &fixture_path("alice.pub"),
        )
        .expect_err("missing key");
        assert!(matches!(
            err.current_context(),
            AttestError::Configuration { .. }
        ));
    }
}
