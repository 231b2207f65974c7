//! Error types for the archive agent.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Reason a single entry failed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyFailure {
    FailedStat,
    SizeMismatch { expected: String, actual: u64 },
    MetadataFetchFailed,
    MetadataMismatch,
}

impl fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyFailure::FailedStat => f.write_str("failed stat"),
            VerifyFailure::SizeMismatch { .. } => f.write_str("size mismatch"),
            VerifyFailure::MetadataFetchFailed => f.write_str("metadata fetch failed"),
            VerifyFailure::MetadataMismatch => f.write_str("metadata mismatch"),
        }
    }
}

/// Reason the destination root is not in the state a transfer expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootStateFailure {
    DestinationExists,
    DestinationMissing,
    CountFailed,
    UnexpectedResidualContent { nfiles: u64, ndirectories: u64 },
}

impl fmt::Display for RootStateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootStateFailure::DestinationExists => f.write_str("destination exists"),
            RootStateFailure::DestinationMissing => f.write_str("destination missing"),
            RootStateFailure::CountFailed => f.write_str("recursive count failed"),
            RootStateFailure::UnexpectedResidualContent { .. } => {
                f.write_str("unexpected residual content")
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to open manifest {path}: {source}")]
    ManifestOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed manifest at line {line}: {reason}")]
    ManifestFormat { line: usize, reason: String },

    #[error("Error removing entry {0}")]
    Deletion(String),

    #[error("Failed mkdir for {0}")]
    DirectoryCreate(String),

    #[error("Failed setting metadata for {url}: {reason}")]
    MetadataApply { url: String, reason: String },

    #[error("Verification failed for {url}: {reason}")]
    Verification { url: String, reason: VerifyFailure },

    #[error("Root {url} in unexpected state: {reason}")]
    RootState { url: String, reason: RootStateFailure },

    #[error("Failed making {url} mutable: {reason}")]
    Mutability { url: String, reason: String },

    #[error("No storage handle serves {0}")]
    UnknownEndpoint(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ArchiveError {
    /// Verification reason, if this is a verification failure.
    pub fn verify_failure(&self) -> Option<&VerifyFailure> {
        match self {
            ArchiveError::Verification { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Root-state reason, if this is a root check failure.
    pub fn root_state_failure(&self) -> Option<&RootStateFailure> {
        match self {
            ArchiveError::RootState { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
