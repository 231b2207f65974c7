//! In-memory backend used by the unit tests.
//!
//! Keeps a flat map of URL to node, records every mutating call and lets a
//! test force individual operations to fail.

use super::{BackendError, BackendResult, EntryCount, StatInfo, StorageBackend};
use crate::manifest::{Entry, EntryKind};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub is_dir: bool,
    pub size: u64,
    /// Values returned by `fetch_metadata`
    pub meta: BTreeMap<String, Value>,
    pub attrs: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    nodes: RefCell<BTreeMap<String, Node>>,
    failing: RefCell<HashSet<&'static str>>,
    count: RefCell<Option<EntryCount>>,
    fetched: RefCell<Option<Entry>>,
    calls: RefCell<Vec<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir(&self, url: &str) {
        self.insert(
            url,
            Node {
                is_dir: true,
                ..Node::default()
            },
        );
    }

    pub fn add_file(&self, url: &str, size: u64) {
        self.insert(
            url,
            Node {
                size,
                ..Node::default()
            },
        );
    }

    pub fn insert(&self, url: &str, node: Node) {
        self.nodes.borrow_mut().insert(url.to_string(), node);
    }

    pub fn set_meta(&self, url: &str, name: &str, value: Value) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(url) {
            node.meta.insert(name.to_string(), value);
        }
    }

    pub fn node(&self, url: &str) -> Option<Node> {
        self.nodes.borrow().get(url).cloned()
    }

    pub fn attr(&self, url: &str, name: &str) -> Option<String> {
        self.node(url).and_then(|n| n.attrs.get(name).cloned())
    }

    pub fn set_attr(&self, url: &str, name: &str, value: &str) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(url) {
            node.attrs.insert(name.to_string(), value.to_string());
        }
    }

    /// Make every call of operation `op` fail (e.g. "rm", "rmdir", "stat").
    pub fn fail(&self, op: &'static str) {
        self.failing.borrow_mut().insert(op);
    }

    /// Undo a previous [`MemoryBackend::fail`].
    pub fn recover(&self, op: &'static str) {
        self.failing.borrow_mut().remove(op);
    }

    pub fn set_count(&self, count: EntryCount) {
        *self.count.borrow_mut() = Some(count);
    }

    /// Return `record` verbatim from every later `fetch_metadata`.
    pub fn set_fetch_response(&self, record: Entry) {
        *self.fetched.borrow_mut() = Some(record);
    }

    /// Calls in the form `op url`, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, op: &'static str, url: &str) -> BackendResult<()> {
        self.calls.borrow_mut().push(format!("{} {}", op, url));
        if self.failing.borrow().contains(op) {
            return Err(BackendError::Rejected(format!("{} {} forced to fail", op, url)));
        }
        Ok(())
    }

    fn with_node<T>(&self, url: &str, f: impl FnOnce(&mut Node) -> T) -> BackendResult<T> {
        let mut nodes = self.nodes.borrow_mut();
        let node = nodes
            .get_mut(url)
            .ok_or_else(|| BackendError::NotFound(url.to_string()))?;
        Ok(f(node))
    }
}

impl StorageBackend for MemoryBackend {
    fn stat(&self, url: &str) -> BackendResult<StatInfo> {
        self.record("stat", url)?;
        self.with_node(url, |n| StatInfo {
            size: n.size,
            is_dir: n.is_dir,
        })
    }

    fn mkdir(&self, url: &str, _create_parents: bool) -> BackendResult<()> {
        self.record("mkdir", url)?;
        if !self.nodes.borrow().contains_key(url) {
            self.add_dir(url);
        }
        Ok(())
    }

    fn remove_file(&self, url: &str) -> BackendResult<()> {
        self.record("rm", url)?;
        self.nodes
            .borrow_mut()
            .remove(url)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(url.to_string()))
    }

    fn remove_directory(&self, url: &str) -> BackendResult<()> {
        self.record("rmdir", url)?;
        self.nodes
            .borrow_mut()
            .remove(url)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(url.to_string()))
    }

    fn get_attribute(&self, url: &str, name: &str) -> BackendResult<String> {
        self.record("getattr", url)?;
        self.with_node(url, |n| n.attrs.get(name).cloned())?
            .ok_or_else(|| BackendError::MissingAttribute {
                url: url.to_string(),
                name: name.to_string(),
            })
    }

    fn set_attribute(&self, url: &str, name: &str, value: &str) -> BackendResult<()> {
        self.record("setattr", url)?;
        self.with_node(url, |n| {
            n.attrs.insert(name.to_string(), value.to_string());
        })
    }

    fn remove_attribute(&self, url: &str, name: &str) -> BackendResult<()> {
        self.record("rmattr", url)?;
        self.with_node(url, |n| {
            n.attrs.remove(name);
        })
    }

    fn recursive_count(&self, url: &str) -> BackendResult<EntryCount> {
        self.record("count", url)?;
        if let Some(count) = *self.count.borrow() {
            return Ok(count);
        }
        let nodes = self.nodes.borrow();
        let mut count = EntryCount::default();
        for (_, node) in nodes.range(url.to_string()..).take_while(|(k, _)| k.starts_with(url)) {
            if node.is_dir {
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
        self.record("fetch", url)?;
        if let Some(record) = self.fetched.borrow().clone() {
            return Ok(record);
        }
        let node = self
            .node(url)
            .ok_or_else(|| BackendError::NotFound(url.to_string()))?;
        let attrs = names
            .iter()
            .map(|name| {
                node.meta.get(*name).cloned().ok_or_else(|| BackendError::MissingAttribute {
                    url: url.to_string(),
                    name: name.to_string(),
                })
            })
            .collect::<BackendResult<Vec<_>>>()?;
        let kind = if is_dir {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        Ok(Entry::new(kind, rel_path, attrs))
    }

    fn apply_metadata(&self, url: &str, meta: &BTreeMap<String, Value>) -> BackendResult<()> {
        self.record("setmeta", url)?;
        self.with_node(url, |n| n.meta.extend(meta.clone()))
    }
}
