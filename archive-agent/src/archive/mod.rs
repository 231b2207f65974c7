//! Archive transfer session.
//!
//! An [`ArchiveSession`] owns the parsed manifest, the transfer direction
//! and one long-lived backend handle per storage side. The per-entry
//! operations (mkdir, delete, verify), the root pre-flight check and the
//! mutability toggle are implemented as session methods in the submodules.
//!
//! All operations are blocking and sequential. A session does not lock its
//! handles; callers that parallelize entries must give each worker its own
//! session.

pub mod delete;
pub mod endpoint;
pub mod mkdir;
pub mod mutable;
pub mod root_check;
pub mod verify;

pub use delete::DeleteTarget;
pub use endpoint::{resolve_endpoints, select_connection, Direction};
pub use mutable::AclRules;
pub use verify::VerifyOutcome;

use crate::backend::StorageBackend;
use crate::config::ArchiveConfig;
use crate::manifest::{ArchiveHeader, ManifestReader};
use crate::utils::errors::{ArchiveError, Result};
use std::path::Path;
use tracing::{error, info_span, Span};
use uuid::Uuid;

pub struct ArchiveSession<B> {
    manifest: ManifestReader,
    direction: Direction,
    disk: B,
    tape: B,
    options: ArchiveConfig,
    span: Span,
}

impl<B: StorageBackend> ArchiveSession<B> {
    /// Open the manifest at `path` and bind the disk and tape handles.
    pub fn open(path: impl AsRef<Path>, direction: Direction, disk: B, tape: B) -> Result<Self> {
        Ok(Self::from_manifest(
            ManifestReader::open(path)?,
            direction,
            disk,
            tape,
        ))
    }

    /// Bind an already opened manifest, e.g. when the handles are built from
    /// its header.
    pub fn from_manifest(manifest: ManifestReader, direction: Direction, disk: B, tape: B) -> Self {
        let span = info_span!(
            "archive",
            session = %Uuid::new_v4(),
            manifest = %manifest.path().display(),
            direction = %direction,
        );

        Self {
            manifest,
            direction,
            disk,
            tape,
            options: ArchiveConfig::default(),
            span,
        }
    }

    /// Replace the default tunables (ACL attribute, marker, root limits).
    pub fn with_options(mut self, options: ArchiveConfig) -> Self {
        self.options = options;
        self
    }

    pub fn header(&self) -> &ArchiveHeader {
        self.manifest.header()
    }

    pub fn manifest(&self) -> &ManifestReader {
        &self.manifest
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn options(&self) -> &ArchiveConfig {
        &self.options
    }

    /// `(origin, destination)` URLs of a relative path for this session's direction.
    pub fn endpoints(&self, rel_path: &str) -> (String, String) {
        resolve_endpoints(rel_path, self.direction, self.header())
    }

    /// Handle serving `url`. A URL under neither root is a configuration
    /// error and is never retried.
    pub(crate) fn connection(&self, url: &str) -> Result<&B> {
        select_connection(url, self.header(), &self.disk, &self.tape).ok_or_else(|| {
            error!(
                "URL {} matches neither src {} nor dst {}",
                url,
                self.header().src,
                self.header().dst
            );
            ArchiveError::UnknownEndpoint(url.to_string())
        })
    }
}
