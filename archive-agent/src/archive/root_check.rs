//! Pre-flight check of the destination root.

use super::ArchiveSession;
use crate::backend::StorageBackend;
use crate::utils::errors::{ArchiveError, Result, RootStateFailure};
use tracing::{debug, error};

impl<B: StorageBackend> ArchiveSession<B> {
    /// Check the destination root before a transfer starts.
    ///
    /// Disk-to-tape: the tape root must not exist yet. Tape-to-disk: the disk
    /// root must exist and hold exactly one directory (itself) and between
    /// one and `max_root_files` files (the manifest, optionally a progress
    /// marker).
    pub fn check_root_dir(&self) -> Result<()> {
        let _enter = self.span.enter();
        let header = self.header();
        let root = if self.direction.is_forward() {
            header.dst.as_str()
        } else {
            header.src.as_str()
        };
        let fs = self.connection(root)?;
        let exists = fs.stat(root).is_ok();

        if self.direction.is_forward() {
            if exists {
                error!("Root put dir {} exists, expected absent", root);
                return Err(root_state(root, RootStateFailure::DestinationExists));
            }
            return Ok(());
        }

        if !exists {
            error!("Root get dir {} does not exist", root);
            return Err(root_state(root, RootStateFailure::DestinationMissing));
        }

        let count = fs.recursive_count(root).map_err(|e| {
            error!("Error doing find count on get destination {}: {}", root, e);
            root_state(root, RootStateFailure::CountFailed)
        })?;
        debug!(
            "Root {} holds nfiles={} ndirectories={}",
            root, count.nfiles, count.ndirectories
        );

        let max_files = self.options.max_root_files;
        if count.ndirectories != 1 || count.nfiles == 0 || count.nfiles > max_files {
            error!(
                "Root get dir {} should hold 1 directory and 1 to {} files, found {} and {}; clean up and try again",
                root, max_files, count.ndirectories, count.nfiles
            );
            return Err(root_state(
                root,
                RootStateFailure::UnexpectedResidualContent {
                    nfiles: count.nfiles,
                    ndirectories: count.ndirectories,
                },
            ));
        }

        Ok(())
    }
}

fn root_state(url: &str, reason: RootStateFailure) -> ArchiveError {
    ArchiveError::RootState {
        url: url.to_string(),
        reason,
    }
}
