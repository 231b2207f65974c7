//! Manifest header and entry records.
//!
//! Every manifest line is a JSON document. The first line is the header
//! object, every following line is an array shaped like
//! `["d", "./rel/path/", <dir_meta values>...]` or
//! `["f", "./rel/path/file", <file_meta values>...]`.

use crate::utils::errors::{ArchiveError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::error;

/// Manifest header, the first line of the archive file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveHeader {
    /// Base URL of the disk side root
    pub src: String,

    /// Base URL of the tape side root
    pub dst: String,

    /// Attribute names carried by every directory entry, in order
    pub dir_meta: Vec<String>,

    /// Attribute names carried by every file entry, in order
    pub file_meta: Vec<String>,

    /// Any other header keys written by the manifest producer
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ArchiveHeader {
    /// Parse the header line.
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line.trim_end())
            .map_err(|e| format_error(1, format!("invalid header: {}", e)))
    }

    /// Attribute names for entries of the given kind.
    pub fn meta_for(&self, kind: EntryKind) -> &[String] {
        match kind {
            EntryKind::Directory => &self.dir_meta,
            EntryKind::File => &self.file_meta,
        }
    }

    /// Position of attribute `name` inside a full entry record (tag and path included).
    pub fn entry_index(&self, kind: EntryKind, name: &str) -> Option<usize> {
        self.meta_for(kind)
            .iter()
            .position(|m| m == name)
            .map(|i| i + 2)
    }
}

/// Entry tag, the first element of every entry line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Directory,
    File,
}

impl EntryKind {
    pub fn tag(self) -> &'static str {
        match self {
            EntryKind::Directory => "d",
            EntryKind::File => "f",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "d" => Some(EntryKind::Directory),
            "f" => Some(EntryKind::File),
            _ => None,
        }
    }
}

/// One directory or file record.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub kind: EntryKind,

    /// Relative path, always starting with `./`
    pub path: String,

    /// Attribute values positionally aligned with the header meta list
    pub attrs: Vec<Value>,
}

impl Entry {
    pub fn new(kind: EntryKind, path: impl Into<String>, attrs: Vec<Value>) -> Self {
        Self {
            kind,
            path: path.into(),
            attrs,
        }
    }

    /// Parse one entry line. `line` is the 1-based line number used in errors.
    pub fn parse(text: &str, line: usize) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text.trim_end()).map_err(|e| format_error(line, e.to_string()))?;

        Self::from_value(value).map_err(|reason| format_error(line, reason))
    }

    /// Build an entry from an already decoded JSON array.
    pub fn from_value(value: Value) -> std::result::Result<Self, String> {
        let Value::Array(items) = value else {
            return Err("entry is not a list".to_string());
        };

        let mut items = items.into_iter();
        let kind = match items.next() {
            Some(Value::String(tag)) => {
                EntryKind::from_tag(&tag).ok_or_else(|| format!("unknown entry tag {:?}", tag))?
            }
            _ => return Err("missing entry tag".to_string()),
        };
        let path = match items.next() {
            Some(Value::String(path)) => path,
            _ => return Err("missing entry path".to_string()),
        };

        Ok(Self {
            kind,
            path,
            attrs: items.collect(),
        })
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Number of elements in the full record (tag and path included).
    pub fn field_count(&self) -> usize {
        self.attrs.len() + 2
    }

    /// Look up an attribute by name using the header meta list for this kind.
    pub fn attr(&self, header: &ArchiveHeader, name: &str) -> Option<&Value> {
        header
            .meta_for(self.kind)
            .iter()
            .position(|m| m == name)
            .and_then(|i| self.attrs.get(i))
    }

    /// Attributes zipped with the header meta names.
    pub fn attr_map(&self, header: &ArchiveHeader) -> BTreeMap<String, Value> {
        header
            .meta_for(self.kind)
            .iter()
            .cloned()
            .zip(self.attrs.iter().cloned())
            .collect()
    }

    /// Remove the element at `index` of the full record. Returns false when
    /// the index does not address an attribute.
    pub fn remove_field(&mut self, index: usize) -> bool {
        if index < 2 || index - 2 >= self.attrs.len() {
            return false;
        }
        self.attrs.remove(index - 2);
        true
    }

    pub fn to_value(&self) -> Value {
        let mut items = Vec::with_capacity(self.field_count());
        items.push(Value::String(self.kind.tag().to_string()));
        items.push(Value::String(self.path.clone()));
        items.extend(self.attrs.iter().cloned());
        Value::Array(items)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

fn format_error(line: usize, reason: String) -> ArchiveError {
    error!("Malformed manifest line {}: {}", line, reason);
    ArchiveError::ManifestFormat { line, reason }
}

/// Interpret a manifest or backend value as an unsigned integer.
///
/// Manifests written by different producers carry numbers either as JSON
/// numbers or as decimal strings.
pub fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text form of a value: strings unquoted, everything else as JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
