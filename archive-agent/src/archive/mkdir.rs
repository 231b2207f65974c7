//! Directory creation on the destination side.

use super::ArchiveSession;
use crate::backend::StorageBackend;
use crate::manifest::Entry;
use crate::utils::errors::{ArchiveError, Result};
use tracing::{debug, error, info};

impl<B: StorageBackend> ArchiveSession<B> {
    /// Create the destination directory of a directory entry, parents
    /// included. For tape-to-disk sessions the recorded directory metadata
    /// is applied afterwards.
    ///
    /// A [`ArchiveError::MetadataApply`] leaves the directory in place;
    /// retry with [`ArchiveSession::apply_directory_metadata`].
    pub fn make_directory(&self, entry: &Entry) -> Result<()> {
        let _enter = self.span.enter();
        let (_, dest) = self.endpoints(&entry.path);
        let fs = self.connection(&dest)?;

        if let Err(e) = fs.mkdir(&dest, true) {
            error!("Dir {}, failed mkdir: {}", dest, e);
            return Err(ArchiveError::DirectoryCreate(dest));
        }
        debug!("Created dir {}", dest);

        if !self.direction.is_forward() {
            self.apply_directory_metadata(entry)?;
        }

        Ok(())
    }

    /// Set the recorded metadata of a directory entry on its destination.
    pub fn apply_directory_metadata(&self, entry: &Entry) -> Result<()> {
        let _enter = self.span.enter();
        let (_, dest) = self.endpoints(&entry.path);
        let fs = self.connection(&dest)?;
        let meta = entry.attr_map(self.header());

        fs.apply_metadata(&dest, &meta).map_err(|e| {
            error!("Dir {}, failed setting metadata {:?}: {}", dest, meta, e);
            ArchiveError::MetadataApply {
                url: dest.clone(),
                reason: e.to_string(),
            }
        })
    }

    /// Create every directory of the manifest in manifest order.
    pub fn make_directories(&self) -> Result<usize> {
        let mut created = 0;
        for entry in self.manifest.directories()? {
            self.make_directory(&entry?)?;
            created += 1;
        }

        let _enter = self.span.enter();
        info!("Created {} directories", created);
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::testing::*;
    use crate::archive::Direction;
    use crate::backend::memory::MemoryBackend;
    use serde_json::json;

    #[test]
    fn test_mkdir_forward_skips_metadata() {
        let file = manifest(&[HEADER]);
        let (disk, tape) = (MemoryBackend::new(), MemoryBackend::new());
        let put = session(&file, Direction::DiskToTape, &disk, &tape);

        let entry = Entry::parse(r#"["d", "./sub/", "10", "20", {}]"#, 2).unwrap();
        put.make_directory(&entry).unwrap();

        assert!(tape.node("eos:/tape/x/./sub/").unwrap().is_dir);
        assert_eq!(tape.calls(), vec!["mkdir eos:/tape/x/./sub/"]);
        assert!(disk.calls().is_empty());
    }

    #[test]
    fn test_mkdir_reverse_applies_metadata() {
        let file = manifest(&[HEADER]);
        let (disk, tape) = (MemoryBackend::new(), MemoryBackend::new());
        let get = session(&file, Direction::TapeToDisk, &disk, &tape);

        let entry =
            Entry::parse(r#"["d", "./", "10", "20", {"sys.acl": "z:i"}]"#, 2).unwrap();
        get.make_directory(&entry).unwrap();

        let node = disk.node("eos:/disk/x/").unwrap();
        assert_eq!(node.meta.get("uid"), Some(&json!("10")));
        assert_eq!(node.meta.get("gid"), Some(&json!("20")));
        assert_eq!(node.meta.get("attr"), Some(&json!({"sys.acl": "z:i"})));
        assert_eq!(disk.calls(), vec!["mkdir eos:/disk/x/", "setmeta eos:/disk/x/"]);
    }

    #[test]
    fn test_mkdir_failure() {
        let file = manifest(&[HEADER]);
        let (disk, tape) = (MemoryBackend::new(), MemoryBackend::new());
        tape.fail("mkdir");
        let put = session(&file, Direction::DiskToTape, &disk, &tape);

        let entry = Entry::parse(r#"["d", "./sub/", "10", "20", {}]"#, 2).unwrap();
        assert!(matches!(
            put.make_directory(&entry),
            Err(ArchiveError::DirectoryCreate(url)) if url == "eos:/tape/x/./sub/"
        ));
    }

    #[test]
    fn test_metadata_failure_is_retryable() {
        let file = manifest(&[HEADER]);
        let (disk, tape) = (MemoryBackend::new(), MemoryBackend::new());
        disk.fail("setmeta");
        let get = session(&file, Direction::TapeToDisk, &disk, &tape);

        let entry = Entry::parse(r#"["d", "./sub/", "10", "20", {}]"#, 2).unwrap();
        let err = get.make_directory(&entry).unwrap_err();
        assert!(matches!(err, ArchiveError::MetadataApply { .. }));

        // The directory itself was created
        assert!(disk.node("eos:/disk/x/./sub/").is_some());
        assert!(disk.node("eos:/disk/x/./sub/").unwrap().meta.is_empty());

        disk.recover("setmeta");
        get.apply_directory_metadata(&entry).unwrap();
        assert_eq!(
            disk.node("eos:/disk/x/./sub/").unwrap().meta.get("uid"),
            Some(&json!("10"))
        );
    }

    #[test]
    fn test_make_directories_in_order() {
        let file = manifest(&[
            HEADER,
            r#"["d", "./", "0", "0", {}]"#,
            r#"["d", "./sub/", "0", "0", {}]"#,
            r#"["d", "./sub/deep/", "0", "0", {}]"#,
            r#"["f", "./sub/a.txt", "1", "0", "0", "0", "0", "crc32", "0"]"#,
        ]);
        let (disk, tape) = (MemoryBackend::new(), MemoryBackend::new());
        let put = session(&file, Direction::DiskToTape, &disk, &tape);

        assert_eq!(put.make_directories().unwrap(), 3);
        assert_eq!(
            tape.calls(),
            vec![
                "mkdir eos:/tape/x/",
                "mkdir eos:/tape/x/./sub/",
                "mkdir eos:/tape/x/./sub/deep/",
            ]
        );
    }
}
