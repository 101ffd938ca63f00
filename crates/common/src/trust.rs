//! Trusted signer keys.
//!
//! A trust store is a plain text file with one public key per line, in the
//! same text form that signers embed in their blocks (typically the contents
//! of an `id_rsa.pub`). A key is trusted only if some line matches it exactly.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use error_stack::{Report, ResultExt};

use crate::error::AttestError;

/// Allowlist of public key lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustStore {
    entries: Vec<String>,
}

impl TrustStore {
    /// Load the trust store at `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`AttestError::Configuration`] if the file exists but cannot
    /// be read.
    pub fn load(path: &Path) -> Result<Self, Report<AttestError>> {
        match fs::read_to_string(path) {
            Ok(text) => {
                let store = Self::from_lines(&text);
                log::debug!(
                    "loaded {} trusted key(s) from {}",
                    store.len(),
                    path.display()
                );
                Ok(store)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::warn!("trust store {} does not exist, no keys are trusted", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e)
                .change_context(AttestError::configuration("failed to read trust store"))
                .attach(format!("path: {}", path.display())),
        }
    }

    /// Build a store from newline separated key lines. Blank lines are skipped.
    #[must_use]
    pub fn from_lines(text: &str) -> Self {
        let entries = text
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self { entries }
    }

    /// Whether `key` exactly matches one of the trusted lines.
    #[must_use]
    pub fn is_trusted(&self, key: &str) -> bool {
        self.entries.iter().any(|entry| entry == key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
