//! CLI error types.

use std::fmt;

use attest_common::error::{AttestError, IntoExitCode, EXIT_CONFIGURATION};
use error_stack::Report;

#[derive(Debug)]
pub enum CliError {
    /// Signing, verification or configuration failure
    Attest(Report<AttestError>),
    /// IO error
    Io(std::io::Error),
    /// JSON serialization error
    Json(serde_json::Error),
}

impl CliError {
    /// Exit status for this error. Failures outside the signing library are
    /// reported as configuration errors.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Attest(report) => report.current_context().exit_code(),
            CliError::Io(_) | CliError::Json(_) => EXIT_CONFIGURATION,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Attest(report) => write!(f, "{}", report.current_context()),
            CliError::Io(err) => write!(f, "IO error: {}", err),
            CliError::Json(err) => write!(f, "JSON error: {}", err),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Io(err) => Some(err),
            CliError::Json(err) => Some(err),
            CliError::Attest(_) => None,
        }
    }
}

impl From<Report<AttestError>> for CliError {
    fn from(report: Report<AttestError>) -> Self {
        CliError::Attest(report)
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Json(err)
    }
}
