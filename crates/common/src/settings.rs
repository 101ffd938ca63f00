//! Layered configuration.
//!
//! Sources are applied in order, later ones winning:
//!
//! 1. defaults derived from the caller's home directory
//! 2. an optional TOML file
//! 3. `ATTEST__<SECTION>__<KEY>` environment variables
//!
//! ```toml
//! [keys]
//! private_key = "/home/dev/.ssh/id_rsa"
//! public_key = "/home/dev/.ssh/id_rsa.pub"
//! trusted_keys = "/etc/attest/trusted_devs"
//!
//! [signing]
//! format = "go"
//! assertions = "signed,reviewed"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, ConfigError, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::comments::{self, DEFAULT_FORMAT};
use crate::error::AttestError;

pub const ENVIRONMENT_PREFIX: &str = "ATTEST";
pub const DEFAULT_ASSERTIONS: &str = "signed";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
pub struct KeyPaths {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
    /// One trusted public key per line.
    pub trusted_keys: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
pub struct SigningDefaults {
    #[validate(custom(function = "validate_format"))]
    pub format: String,
    /// Comma separated.
    pub assertions: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub keys: KeyPaths,
    #[validate(nested)]
    pub signing: SigningDefaults,
}

impl Settings {
    /// Settings for a user whose home directory is `home`, optionally
    /// overlaid with the TOML file at `config_file`.
    ///
    /// # Errors
    ///
    /// Returns [`AttestError::Configuration`] if the file cannot be read or
    /// parsed, or if the merged settings are invalid.
    pub fn load(home: &Path, config_file: Option<&Path>) -> Result<Self, Report<AttestError>> {
        let Some(path) = config_file else {
            return Self::build(defaults(home));
        };

        let toml_str = fs::read_to_string(path)
            .change_context(AttestError::configuration("failed to read config file"))
            .attach(format!("path: {}", path.display()))?;
        log::debug!("loading settings from {}", path.display());

        Self::from_toml(home, &toml_str).attach(format!("path: {}", path.display()))
    }

    /// Settings for a user whose home directory is `home`, overlaid with
    /// `toml_str`.
    ///
    /// # Errors
    ///
    /// Returns [`AttestError::Configuration`] if the TOML is malformed or the
    /// merged settings are invalid.
    pub fn from_toml(home: &Path, toml_str: &str) -> Result<Self, Report<AttestError>> {
        let toml = File::from_str(toml_str, FileFormat::Toml);
        Self::build(defaults(home).map(|builder| builder.add_source(toml)))
    }

    fn build(
        builder: Result<ConfigBuilder<DefaultState>, ConfigError>,
    ) -> Result<Self, Report<AttestError>> {
        let environment = Environment::default()
            .prefix(ENVIRONMENT_PREFIX)
            .separator("__");

        let settings: Self = builder
            .and_then(|builder| builder.add_source(environment).build())
            .and_then(Config::try_deserialize)
            .change_context(AttestError::configuration("failed to load settings"))?;

        settings
            .validate()
            .change_context(AttestError::configuration("settings validation failed"))?;

        Ok(settings)
    }
}

fn defaults(home: &Path) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let ssh = home.join(".ssh");
    let path = |name: &str| ssh.join(name).to_string_lossy().into_owned();

    Config::builder()
        .set_default("keys.private_key", path("id_rsa"))?
        .set_default("keys.public_key", path("id_rsa.pub"))?
        .set_default("keys.trusted_keys", path("trusted_devs"))?
        .set_default("signing.format", DEFAULT_FORMAT)?
        .set_default("signing.assertions", DEFAULT_ASSERTIONS)
}

fn validate_format(format: &str) -> Result<(), ValidationError> {
    if comments::is_known(format) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_format")
            .with_message(format!("unknown comment format: {format}").into()))
    }
}
