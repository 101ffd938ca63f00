//! Comment-embedded signatures for arbitrary text files.
//!
//! A signature block is appended to a file inside that file's own comment
//! syntax, so the signed file still compiles, runs or renders as before. The
//! block carries free-text assertions, a timestamp, an RSA PKCS#1 v1.5
//! signature over SHA-256 and the signer's public key. Verification finds the
//! last block without being told the comment syntax, recomputes the signed
//! message and checks the key against a trust store.
//!
//! # Modules
//!
//! - [`canonical`]: The exact bytes that are hashed and signed
//! - [`comments`]: Comment delimiters per file format
//! - [`error`]: Error types and exit status mapping
//! - [`frame`]: Rendering and locating signature blocks
//! - [`keys`]: RSA private key and public key text parsing
//! - [`settings`]: Layered configuration of key paths and signing defaults
//! - [`signer`]: Producing signature blocks
//! - [`test_support`]: Fixture keys and files shared by tests
//! - [`trust`]: The trusted signer allowlist
//! - [`verifier`]: Checking signature blocks

pub mod canonical;
pub mod comments;
pub mod error;
pub mod frame;
pub mod keys;
pub mod settings;
pub mod signer;
pub mod trust;
pub mod verifier;
