use std::io;
use thiserror::Error;

/// Result type for snappak operations
pub type Result<T> = std::result::Result<T, PakError>;

/// Unified error type for all snappak operations
#[derive(Debug, Error)]
pub enum PakError {
    /// Requested logical path is absent from the archive TOC or from every
    /// mounted source.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad magic, unsupported version, or a truncated/malformed TOC.
    #[error("Invalid package format: {0}")]
    Format(String),

    /// Missing/invalid key, authentication-tag mismatch, or a sealed
    /// payload too short to contain nonce and tag.
    #[error("Cryptographic failure: {0}")]
    Crypto(String),

    /// Resolved path escapes the configured filesystem root.
    #[error("Path security violation: {0}")]
    PathSecurity(String),

    /// Malformed invocation: bad hex, wrong key length, conflicting flags.
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
