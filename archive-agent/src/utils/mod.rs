//! Utility modules for the archive agent.

pub mod errors;
pub mod logger;

pub use errors::{ArchiveError, Result, RootStateFailure, VerifyFailure};
