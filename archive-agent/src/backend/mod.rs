//! Storage backend capability interface.
//!
//! The archive operations never talk to storage directly. Each side of a
//! transfer (disk and tape) is served by one long-lived handle implementing
//! [`StorageBackend`]; all calls are blocking and addressed by full URL.

pub mod local;
#[cfg(test)]
pub(crate) mod memory;

pub use local::LocalBackend;

use crate::manifest::Entry;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("No such entry: {0}")]
    NotFound(String),

    #[error("Attribute {name} not set on {url}")]
    MissingAttribute { url: String, name: String },

    #[error("Unsupported metadata attribute {0}")]
    UnsupportedAttribute(String),

    #[error("URL {0} is outside this backend")]
    ForeignUrl(String),

    #[error("Operation rejected: {0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Result of a successful stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatInfo {
    pub size: u64,
    pub is_dir: bool,
}

/// Result of a recursive count below a directory (the directory itself included).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryCount {
    pub nfiles: u64,
    pub ndirectories: u64,
}

/// Blocking operations one storage side has to provide.
pub trait StorageBackend {
    fn stat(&self, url: &str) -> BackendResult<StatInfo>;

    fn mkdir(&self, url: &str, create_parents: bool) -> BackendResult<()>;

    fn remove_file(&self, url: &str) -> BackendResult<()>;

    fn remove_directory(&self, url: &str) -> BackendResult<()>;

    fn get_attribute(&self, url: &str, name: &str) -> BackendResult<String>;

    fn set_attribute(&self, url: &str, name: &str, value: &str) -> BackendResult<()>;

    fn remove_attribute(&self, url: &str, name: &str) -> BackendResult<()>;

    fn recursive_count(&self, url: &str) -> BackendResult<EntryCount>;

    /// Read the live metadata of `url` as an entry-shaped record whose
    /// attribute values are aligned with `names`. `rel_path` becomes the
    /// record path so the result can be compared to a manifest entry.
    fn fetch_metadata(
        &self,
        url: &str,
        rel_path: &str,
        names: &[&str],
        is_dir: bool,
    ) -> BackendResult<Entry>;

    /// Apply named metadata values (ownership, attributes) to `url`.
    fn apply_metadata(&self, url: &str, meta: &BTreeMap<String, Value>) -> BackendResult<()>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for &B {
    fn stat(&self, url: &str) -> BackendResult<StatInfo> {
        (**self).stat(url)
    }

    fn mkdir(&self, url: &str, create_parents: bool) -> BackendResult<()> {
        (**self).mkdir(url, create_parents)
    }

    fn remove_file(&self, url: &str) -> BackendResult<()> {
        (**self).remove_file(url)
    }

    fn remove_directory(&self, url: &str) -> BackendResult<()> {
        (**self).remove_directory(url)
    }

    fn get_attribute(&self, url: &str, name: &str) -> BackendResult<String> {
        (**self).get_attribute(url, name)
    }

    fn set_attribute(&self, url: &str, name: &str, value: &str) -> BackendResult<()> {
        (**self).set_attribute(url, name, value)
    }

    fn remove_attribute(&self, url: &str, name: &str) -> BackendResult<()> {
        (**self).remove_attribute(url, name)
    }

    fn recursive_count(&self, url: &str) -> BackendResult<EntryCount> {
        (**self).recursive_count(url)
    }

    fn fetch_metadata(
        &self,
        url: &str,
        rel_path: &str,
        names: &[&str],
        is_dir: bool,
    ) -> BackendResult<Entry> {
        (**self).fetch_metadata(url, rel_path, names, is_dir)
    }

    fn apply_metadata(&self, url: &str, meta: &BTreeMap<String, Value>) -> BackendResult<()> {
        (**self).apply_metadata(url, meta)
    }
}
