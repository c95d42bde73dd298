use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy for filecrypt operations.
///
/// Every failed operation maps to exactly one of these kinds; none of them
/// is retried automatically, and there is no partial-success signal.
#[derive(Debug, Error)]
pub enum FileCryptError {
    /// Invalid or contradictory configuration, or a source/artifact file
    /// that must exist before the operation can start
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Encryption never overwrites an existing file at the destination
    #[error("destination already exists: {0}")]
    Collision(PathBuf),

    /// The authentication challenge did not end in a grant
    #[error("authentication failed: {0}")]
    Authentication(AuthFailure),

    /// Key creation or retrieval failure in the key vault
    #[error("key error: {0}")]
    Key(String),

    /// Read/write failure during the transform or cleanup step
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// AEAD encrypt/decrypt failure (bad key, tampered ciphertext)
    #[error("crypto error: {0}")]
    Crypto(String),
}

impl FileCryptError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn key(msg: impl Into<String>) -> Self {
        Self::Key(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }
}

/// Why an authentication-gated operation did not proceed.
///
/// Cancellation is a normal abort path, not a system fault, but it still
/// surfaces as an error so the caller gets exactly one terminal outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    Denied(DenialReason),
    Cancelled,
    /// A second challenge was issued while one was still pending
    ChallengeInProgress,
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Denied(reason) => write!(f, "denied: {reason}"),
            Self::Cancelled => write!(f, "cancelled by user"),
            Self::ChallengeInProgress => write!(f, "another challenge is already pending"),
        }
    }
}

/// Sub-reason for a denial, so "no factor to authenticate with" can be
/// reported distinctly from an ordinary rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    NoEnrolledFactors,
    Rejected(String),
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoEnrolledFactors => write!(f, "no enrolled authentication factors"),
            Self::Rejected(msg) => write!(f, "{msg}"),
        }
    }
}
