//! Archive Agent Library
//!
//! Manifest-driven transfer helpers for moving a directory subtree between a
//! disk namespace and a tape namespace: manifest reading, endpoint
//! resolution, idempotent delete and mkdir, verification, the destination
//! root pre-flight check and the post-transfer mutability toggle.

pub mod archive;
pub mod backend;
pub mod config;
pub mod manifest;
pub mod utils;

// Re-export commonly used types
pub use archive::{ArchiveSession, DeleteTarget, Direction, VerifyOutcome};
pub use config::Config;
pub use utils::errors::ArchiveError;
pub type Result<T> = std::result::Result<T, ArchiveError>;
