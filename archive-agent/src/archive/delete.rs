//! Idempotent entry deletion.

use super::ArchiveSession;
use crate::backend::StorageBackend;
use crate::manifest::Entry;
use crate::utils::errors::{ArchiveError, Result};
use tracing::{debug, error, info, warn};

/// Which side of an entry a delete removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteTarget {
    /// The destination implied by the session direction (put/get cleanup)
    #[default]
    FollowDirection,
    /// The origin side (tape data when deleting an archive)
    ForceOrigin,
    /// The destination side (purge)
    ForceDestination,
}

impl<B: StorageBackend> ArchiveSession<B> {
    /// Remove one file or directory.
    ///
    /// A failed remove is followed by a stat of the same URL: if the entry is
    /// gone the delete counts as done, otherwise it is a [`ArchiveError::Deletion`].
    pub fn delete_entry(&self, rel_path: &str, is_dir: bool, target: DeleteTarget) -> Result<()> {
        let _enter = self.span.enter();
        let (origin, destination) = self.endpoints(rel_path);
        let url = match target {
            DeleteTarget::FollowDirection | DeleteTarget::ForceDestination => destination,
            DeleteTarget::ForceOrigin => origin,
        };
        let fs = self.connection(&url)?;
        debug!("Delete entry {}", url);

        let removed = if is_dir {
            fs.remove_directory(&url)
        } else {
            fs.remove_file(&url)
        };

        if let Err(rm_err) = removed {
            // Any stat failure is read as absence, which can hide an
            // unrelated remove failure.
            match fs.stat(&url) {
                Ok(_) => {
                    error!(
                        "Error removing entry {}: {} (expected absent, still exists)",
                        url, rm_err
                    );
                    return Err(ArchiveError::Deletion(url));
                }
                Err(_) => warn!("Entry {} already removed", url),
            }
        }

        Ok(())
    }

    /// Delete every manifest entry on the chosen side: files first, then
    /// directories children before parents.
    pub fn delete_all(&self, target: DeleteTarget) -> Result<usize> {
        let files = self.manifest.files()?.collect::<Result<Vec<Entry>>>()?;
        let mut dirs = self.manifest.directories()?.collect::<Result<Vec<Entry>>>()?;
        dirs.reverse();

        for entry in files.iter().chain(dirs.iter()) {
            self.delete_entry(&entry.path, entry.is_dir(), target)?;
        }

        let _enter = self.span.enter();
        info!("Deleted {} files and {} directories", files.len(), dirs.len());
        Ok(files.len() + dirs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::testing::*;
    use crate::archive::Direction;
    use crate::backend::memory::MemoryBackend;

    #[test]
    fn test_delete_follows_direction() {
        let file = manifest(&[HEADER]);
        let (disk, tape) = (MemoryBackend::new(), MemoryBackend::new());
        disk.add_file("eos:/disk/x/./a.txt", 1);
        tape.add_file("eos:/tape/x/./a.txt", 1);

        let put = session(&file, Direction::DiskToTape, &disk, &tape);
        put.delete_entry("./a.txt", false, DeleteTarget::FollowDirection)
            .unwrap();

        assert!(tape.node("eos:/tape/x/./a.txt").is_none());
        assert!(disk.node("eos:/disk/x/./a.txt").is_some());
    }

    #[test]
    fn test_delete_forced_sides() {
        let file = manifest(&[HEADER]);
        let (disk, tape) = (MemoryBackend::new(), MemoryBackend::new());
        disk.add_dir("eos:/disk/x/./sub/");
        tape.add_dir("eos:/tape/x/./sub/");

        let get = session(&file, Direction::TapeToDisk, &disk, &tape);
        get.delete_entry("./sub/", true, DeleteTarget::ForceOrigin)
            .unwrap();
        assert!(tape.node("eos:/tape/x/./sub/").is_none());
        assert!(disk.node("eos:/disk/x/./sub/").is_some());

        get.delete_entry("./sub/", true, DeleteTarget::ForceDestination)
            .unwrap();
        assert!(disk.node("eos:/disk/x/./sub/").is_none());
        assert_eq!(disk.calls(), vec!["rmdir eos:/disk/x/./sub/"]);
    }

    #[test]
    fn test_delete_twice_is_idempotent() {
        let file = manifest(&[HEADER]);
        let (disk, tape) = (MemoryBackend::new(), MemoryBackend::new());
        tape.add_file("eos:/tape/x/./a.txt", 1);
        let put = session(&file, Direction::DiskToTape, &disk, &tape);

        put.delete_entry("./a.txt", false, DeleteTarget::FollowDirection)
            .unwrap();
        put.delete_entry("./a.txt", false, DeleteTarget::FollowDirection)
            .unwrap();

        assert_eq!(
            tape.calls(),
            vec![
                "rm eos:/tape/x/./a.txt",
                "rm eos:/tape/x/./a.txt",
                "stat eos:/tape/x/./a.txt",
            ]
        );
    }

    #[test]
    fn test_delete_failure_when_entry_remains() {
        let file = manifest(&[HEADER]);
        let (disk, tape) = (MemoryBackend::new(), MemoryBackend::new());
        tape.add_file("eos:/tape/x/./a.txt", 1);
        tape.fail("rm");
        let put = session(&file, Direction::DiskToTape, &disk, &tape);

        let err = put
            .delete_entry("./a.txt", false, DeleteTarget::FollowDirection)
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Deletion(url) if url == "eos:/tape/x/./a.txt"));
    }

    #[test]
    fn test_delete_all_order() {
        let file = manifest(&[
            HEADER,
            r#"["d", "./", "0", "0", {}]"#,
            r#"["d", "./sub/", "0", "0", {}]"#,
            r#"["f", "./sub/a.txt", "1", "0", "0", "0", "0", "crc32", "0"]"#,
        ]);
        let (disk, tape) = (MemoryBackend::new(), MemoryBackend::new());
        tape.add_dir("eos:/tape/x/");
        tape.add_dir("eos:/tape/x/./sub/");
        tape.add_file("eos:/tape/x/./sub/a.txt", 1);
        let put = session(&file, Direction::DiskToTape, &disk, &tape);

        assert_eq!(put.delete_all(DeleteTarget::FollowDirection).unwrap(), 3);
        assert_eq!(
            tape.calls(),
            vec![
                "rm eos:/tape/x/./sub/a.txt",
                "rmdir eos:/tape/x/./sub/",
                "rmdir eos:/tape/x/",
            ]
        );
    }
}
