//! Post-transfer verification of manifest entries.
//!
//! Disk-to-tape sessions only check that every destination exists and that
//! file sizes match. Tape-to-disk sessions compare the full live metadata of
//! every destination with the manifest record.

use super::ArchiveSession;
use crate::backend::StorageBackend;
use crate::manifest::{value_as_u64, value_text, Entry, EntryKind};
use crate::utils::errors::{ArchiveError, Result, VerifyFailure};
use serde_json::Value;
use tracing::{debug, error, info};

/// Attributes fetched for a directory in tape-to-disk verification
pub const DIR_VERIFY_ATTRS: [&str; 3] = ["uid", "gid", "attr"];

/// Attributes fetched for a file in tape-to-disk verification
pub const FILE_VERIFY_ATTRS: [&str; 7] = ["size", "mtime", "ctime", "uid", "gid", "xstype", "xs"];

/// Result of verifying a whole archive.
#[derive(Debug)]
pub enum VerifyOutcome {
    /// Every entry matched
    Verified { entries: usize },
    /// Verification stopped at the first failing entry
    Failed { entry: Entry, error: ArchiveError },
}

impl VerifyOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerifyOutcome::Verified { .. })
    }
}

impl<B: StorageBackend> ArchiveSession<B> {
    /// Check one entry against its destination.
    pub fn verify_entry(&self, entry: &Entry) -> Result<()> {
        let _enter = self.span.enter();
        let (_, dest) = self.endpoints(&entry.path);
        let fs = self.connection(&dest)?;

        if self.direction.is_forward() {
            self.verify_presence(fs, entry, &dest)?;
        } else {
            self.verify_metadata(fs, entry, &dest)?;
        }

        debug!("Check {}, status ok", dest);
        Ok(())
    }

    /// Verify every directory and then every file, stopping at the first
    /// failure. Manifest read errors are returned as `Err`.
    pub fn verify_archive(&self) -> Result<VerifyOutcome> {
        let mut checked = 0;
        for entry in self.manifest.entries()? {
            let entry = entry?;
            if let Err(error) = self.verify_entry(&entry) {
                let _enter = self.span.enter();
                error!("Archive verification failed at entry {}", entry);
                return Ok(VerifyOutcome::Failed { entry, error });
            }
            checked += 1;
        }

        let _enter = self.span.enter();
        info!("Archive verified, {} entries", checked);
        Ok(VerifyOutcome::Verified { entries: checked })
    }

    fn verify_presence(&self, fs: &B, entry: &Entry, dest: &str) -> Result<()> {
        let info = fs.stat(dest).map_err(|e| {
            error!("Entry {} failed stat: {}", dest, e);
            verification(dest, VerifyFailure::FailedStat)
        })?;

        if entry.is_dir() {
            return Ok(());
        }

        let index = self
            .header()
            .entry_index(EntryKind::File, "size")
            .ok_or_else(|| ArchiveError::ManifestFormat {
                line: 1,
                reason: "file_meta has no size attribute".to_string(),
            })?;
        let recorded = entry.attrs.get(index - 2).cloned().unwrap_or(Value::Null);

        if value_as_u64(&recorded) != Some(info.size) {
            error!(
                "Verify file {}, size {}, expected size {}",
                dest, info.size, recorded
            );
            return Err(verification(
                dest,
                VerifyFailure::SizeMismatch {
                    expected: value_text(&recorded),
                    actual: info.size,
                },
            ));
        }

        Ok(())
    }

    fn verify_metadata(&self, fs: &B, entry: &Entry, dest: &str) -> Result<()> {
        let names: &[&str] = if entry.is_dir() {
            &DIR_VERIFY_ATTRS
        } else {
            &FILE_VERIFY_ATTRS
        };

        let mut live = fs
            .fetch_metadata(dest, &entry.path, names, entry.is_dir())
            .map_err(|e| {
                error!("Failed getting metadata for entry {}: {}", dest, e);
                verification(dest, VerifyFailure::MetadataFetchFailed)
            })?;

        if live.attrs.len() != names.len() || live.is_dir() != entry.is_dir() {
            error!(
                "Malformed metadata for entry {}, requested {:?}, got {}",
                dest, names, live
            );
            return Err(verification(dest, VerifyFailure::MetadataFetchFailed));
        }

        // mtime is not enforced when files are written back, so it is left
        // out of the comparison on both sides.
        let mut expected = entry.clone();
        if !entry.is_dir() {
            if let Some(index) = names.iter().position(|n| *n == "mtime") {
                live.remove_field(index + 2);
            }
            if let Some(index) = self.header().entry_index(EntryKind::File, "mtime") {
                expected.remove_field(index);
            }
        }

        if !entries_match(&live, &expected) {
            error!(
                "Verify failed for entry {}, expected {}, got {}",
                dest, expected, live
            );
            return Err(verification(dest, VerifyFailure::MetadataMismatch));
        }

        Ok(())
    }
}

fn verification(url: &str, reason: VerifyFailure) -> ArchiveError {
    ArchiveError::Verification {
        url: url.to_string(),
        reason,
    }
}

/// Same tag, same path and the same values in the same order. A number and
/// its decimal string form count as equal.
fn entries_match(live: &Entry, expected: &Entry) -> bool {
    live.kind == expected.kind
        && live.path == expected.path
        && live.attrs.len() == expected.attrs.len()
        && live
            .attrs
            .iter()
            .zip(&expected.attrs)
            .all(|(a, b)| values_match(a, b))
}

fn values_match(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.to_string() == *s
        }
        _ => a == b,
    }
}
