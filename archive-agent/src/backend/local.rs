//! Storage backend over a local directory tree.
//!
//! Maps every URL below `base_url` onto `base_dir`, so a manifest whose
//! `src`/`dst` roots point at two local trees can be created, verified and
//! cleaned up without a remote service. Named attributes are kept as
//! `user.<name>` extended attributes.

use super::{BackendError, BackendResult, EntryCount, StatInfo, StorageBackend};
use crate::manifest::{value_text, Entry, EntryKind};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::os::unix::fs::MetadataExt;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const XATTR_PREFIX: &str = "user.";

/// Checksum algorithm reported in `xstype`
pub const CHECKSUM_TYPE: &str = "crc32";

#[derive(Debug, Clone)]
pub struct LocalBackend {
    base_url: String,
    base_dir: PathBuf,
}

impl LocalBackend {
    pub fn new(base_url: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            base_dir: base_dir.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Translate a URL served by this backend into a local path.
    pub fn local_path(&self, url: &str) -> BackendResult<PathBuf> {
        let rest = url
            .strip_prefix(&self.base_url)
            .ok_or_else(|| BackendError::ForeignUrl(url.to_string()))?;
        // Opaque query strings (e.g. privilege hints) mean nothing locally
        let rest = rest.split_once('?').map_or(rest, |(path, _)| path);
        let rest = Path::new(rest.trim_start_matches('/'));

        if rest
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir))
        {
            return Err(BackendError::Rejected(format!(
                "{} escapes {}",
                url, self.base_url
            )));
        }

        Ok(self.base_dir.join(rest))
    }

    fn metadata(&self, url: &str) -> BackendResult<(PathBuf, fs::Metadata)> {
        let path = self.local_path(url)?;
        match fs::symlink_metadata(&path) {
            Ok(meta) => Ok((path, meta)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(BackendError::NotFound(url.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl StorageBackend for LocalBackend {
    fn stat(&self, url: &str) -> BackendResult<StatInfo> {
        let (_, meta) = self.metadata(url)?;
        Ok(StatInfo {
            size: meta.len(),
            is_dir: meta.is_dir(),
        })
    }

    fn mkdir(&self, url: &str, create_parents: bool) -> BackendResult<()> {
        let path = self.local_path(url)?;
        debug!("mkdir {} (parents: {})", path.display(), create_parents);
        if create_parents {
            fs::create_dir_all(&path)?;
        } else {
            fs::create_dir(&path)?;
        }
        Ok(())
    }

    fn remove_file(&self, url: &str) -> BackendResult<()> {
        fs::remove_file(self.local_path(url)?)?;
        Ok(())
    }

    fn remove_directory(&self, url: &str) -> BackendResult<()> {
        fs::remove_dir(self.local_path(url)?)?;
        Ok(())
    }

    fn get_attribute(&self, url: &str, name: &str) -> BackendResult<String> {
        let (path, _) = self.metadata(url)?;
        match xattr::get(&path, xattr_name(name))? {
            Some(raw) => Ok(String::from_utf8_lossy(&raw).into_owned()),
            None => Err(BackendError::MissingAttribute {
                url: url.to_string(),
                name: name.to_string(),
            }),
        }
    }

    fn set_attribute(&self, url: &str, name: &str, value: &str) -> BackendResult<()> {
        let (path, _) = self.metadata(url)?;
        xattr::set(&path, xattr_name(name), value.as_bytes())?;
        Ok(())
    }

    fn remove_attribute(&self, url: &str, name: &str) -> BackendResult<()> {
        let (path, _) = self.metadata(url)?;
        xattr::remove(&path, xattr_name(name))?;
        Ok(())
    }

    fn recursive_count(&self, url: &str) -> BackendResult<EntryCount> {
        let (path, meta) = self.metadata(url)?;
        if !meta.is_dir() {
            return Err(BackendError::Rejected(format!("{} is not a directory", url)));
        }

        let mut count = EntryCount::default();
        for entry in WalkDir::new(&path).follow_links(false) {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_dir() {
                count.ndirectories += 1;
            } else {
                count.nfiles += 1;
            }
        }

        Ok(count)
    }

    fn fetch_metadata(
        &self,
        url: &str,
        rel_path: &str,
        names: &[&str],
        is_dir: bool,
    ) -> BackendResult<Entry> {
        let (path, meta) = self.metadata(url)?;
        if meta.is_dir() != is_dir {
            return Err(BackendError::Rejected(format!(
                "{} is not a {}",
                url,
                if is_dir { "directory" } else { "file" }
            )));
        }

        let mut attrs = Vec::with_capacity(names.len());
        for name in names {
            let value = match *name {
                "size" => meta.len().to_string(),
                "mtime" => format_time(meta.mtime(), meta.mtime_nsec()),
                "ctime" => format_time(meta.ctime(), meta.ctime_nsec()),
                "uid" => meta.uid().to_string(),
                "gid" => meta.gid().to_string(),
                "xstype" if !is_dir => CHECKSUM_TYPE.to_string(),
                "xs" if !is_dir => file_checksum(&path)?,
                "attr" => {
                    attrs.push(Value::Object(user_attributes(&path)?));
                    continue;
                }
                other => return Err(BackendError::UnsupportedAttribute(other.to_string())),
            };
            attrs.push(Value::String(value));
        }

        let kind = if is_dir {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        Ok(Entry::new(kind, rel_path, attrs))
    }

    fn apply_metadata(&self, url: &str, meta: &BTreeMap<String, Value>) -> BackendResult<()> {
        let (path, _) = self.metadata(url)?;
        let mut uid = None;
        let mut gid = None;

        for (name, value) in meta {
            match name.as_str() {
                "uid" => uid = Some(parse_id(name, value)?),
                "gid" => gid = Some(parse_id(name, value)?),
                "attr" => {
                    let Value::Object(attrs) = value else {
                        return Err(BackendError::Rejected(format!(
                            "attr must be an object, got {}",
                            value
                        )));
                    };
                    for (key, val) in attrs {
                        xattr::set(&path, xattr_name(key), value_text(val).as_bytes())?;
                    }
                }
                other => return Err(BackendError::UnsupportedAttribute(other.to_string())),
            }
        }

        if uid.is_some() || gid.is_some() {
            std::os::unix::fs::chown(&path, uid, gid)?;
        }

        Ok(())
    }
}

fn xattr_name(name: &str) -> String {
    format!("{}{}", XATTR_PREFIX, name)
}

fn format_time(secs: i64, nanos: i64) -> String {
    format!("{}.{:09}", secs, nanos)
}

fn parse_id(name: &str, value: &Value) -> BackendResult<u32> {
    value_text(value)
        .parse()
        .map_err(|_| BackendError::Rejected(format!("invalid {} value {}", name, value)))
}

/// All `user.*` extended attributes, prefix stripped.
fn user_attributes(path: &Path) -> BackendResult<Map<String, Value>> {
    let mut attrs = Map::new();
    for name in xattr::list(path)? {
        let name = name.to_string_lossy();
        let Some(key) = name.strip_prefix(XATTR_PREFIX) else {
            continue;
        };
        if let Some(raw) = xattr::get(path, &*name)? {
            attrs.insert(
                key.to_string(),
                Value::String(String::from_utf8_lossy(&raw).into_owned()),
            );
        }
    }
    Ok(attrs)
}

/// Lowercase hex CRC-32 of the file contents.
fn file_checksum(path: &Path) -> BackendResult<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:08x}", hasher.finalize()))
}
