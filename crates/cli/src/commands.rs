//! The tool's modes of operation.
//!
//! Each mode writes its report to `out` and returns the exit status for the
//! outcome. Failures that prevent an outcome come back as [`CliError`].

use std::io::Write;
use std::path::Path;

use attest_common::comments;
use attest_common::error::{AttestError, IntoExitCode, EXIT_SUCCESS};
use attest_common::frame::{locate_all, BlockLocation};
use attest_common::settings::Settings;
use attest_common::signer;
use attest_common::verifier::{self, Verdict};
use clap::ValueEnum;
use error_stack::Report;
use serde::Serialize;

use crate::error::CliError;

#[derive(Clone, Copy, ValueEnum, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Serialize)]
struct BlockReport<'a> {
    assertions: &'a [String],
    timestamp: &'a str,
    public_key: &'a str,
}

impl<'a> From<&'a BlockLocation> for BlockReport<'a> {
    fn from(block: &'a BlockLocation) -> Self {
        Self {
            assertions: &block.assertions,
            timestamp: &block.timestamp,
            public_key: &block.public_key,
        }
    }
}

#[derive(Serialize)]
struct VerificationReport<'a> {
    verdict: Verdict,
    #[serde(flatten)]
    block: BlockReport<'a>,
    trailing_bytes: usize,
}

#[derive(Serialize)]
struct FormatReport<'a> {
    name: &'a str,
    left: &'a str,
    right: &'a str,
}

/// Render a signature block for `content` with the configured keys, format
/// and assertions.
pub fn sign(content: &[u8], settings: &Settings) -> Result<String, CliError> {
    let block = signer::sign(
        content,
        &settings.signing.assertions,
        &settings.signing.format,
        &settings.keys.private_key,
        &settings.keys.public_key,
    )?;
    Ok(block)
}

/// Verify the last block in `content` against the trust store at
/// `trusted_keys`.
pub fn check(
    content: &[u8],
    trusted_keys: &Path,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<u8, CliError> {
    let verification = verifier::verify(content, trusted_keys)?;
    let block = &verification.block;

    match format {
        OutputFormat::Text => {
            writeln!(out, "{}", verification.verdict)?;
            if verification.verdict == Verdict::Success {
                writeln!(out, "assertions: {}", block.assertions.join(", "))?;
                writeln!(out, "timestamp: {}", block.timestamp)?;
            }
        }
        OutputFormat::Json => {
            let report = VerificationReport {
                verdict: verification.verdict,
                block: block.into(),
                trailing_bytes: verification.trailing_bytes,
            };
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
    }

    Ok(verification.verdict.exit_code())
}

/// Print the public key embedded in the last block, without checking it.
pub fn extract_key(content: &[u8], out: &mut impl Write) -> Result<u8, CliError> {
    let key = verifier::extract_key(content)?;
    writeln!(out, "{key}")?;
    Ok(EXIT_SUCCESS)
}

/// Print the timestamp, assertions and key of every block, oldest first.
/// Nothing is verified.
pub fn list(content: &[u8], format: OutputFormat, out: &mut impl Write) -> Result<u8, CliError> {
    let blocks = locate_all(content);
    if blocks.is_empty() {
        return Err(Report::new(AttestError::BlockNotFound).into());
    }

    match format {
        OutputFormat::Text => {
            for block in &blocks {
                writeln!(
                    out,
                    "{}\t{}\t{}",
                    block.timestamp,
                    block.assertions.join(","),
                    block.public_key
                )?;
            }
        }
        OutputFormat::Json => {
            let reports: Vec<BlockReport<'_>> = blocks.iter().map(BlockReport::from).collect();
            serde_json::to_writer_pretty(&mut *out, &reports)?;
            writeln!(out)?;
        }
    }

    Ok(EXIT_SUCCESS)
}

/// Print every known comment format and its delimiters.
pub fn list_formats(format: OutputFormat, out: &mut impl Write) -> Result<u8, CliError> {
    let styles: Vec<_> = comments::names()
        .map(|name| (name, comments::lookup(name)))
        .collect();

    match format {
        OutputFormat::Text => {
            for (name, delimiters) in &styles {
                writeln!(out, "{name:<14}{} {}", delimiters.left, delimiters.right)?;
            }
        }
        OutputFormat::Json => {
            let reports: Vec<FormatReport<'_>> = styles
                .iter()
                .map(|(name, delimiters)| FormatReport {
                    name,
                    left: &delimiters.left,
                    right: &delimiters.right,
                })
                .collect();
            serde_json::to_writer_pretty(&mut *out, &reports)?;
            writeln!(out)?;
        }
    }

    Ok(EXIT_SUCCESS)
}
