//! Dropping the immutability marker from the disk side ACLs.

use super::{resolve_endpoints, ArchiveSession, Direction};
use crate::backend::StorageBackend;
use crate::utils::errors::{ArchiveError, Result};
use std::fmt;
use tracing::{debug, error, info, warn};

/// Ordered, comma separated list of ACL rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclRules {
    rules: Vec<String>,
}

impl AclRules {
    pub fn parse(value: &str) -> Self {
        let rules = if value.is_empty() {
            Vec::new()
        } else {
            value.split(',').map(str::to_string).collect()
        };
        Self { rules }
    }

    /// Remove the first rule equal to `rule`. Returns whether one was found.
    pub fn remove(&mut self, rule: &str) -> bool {
        match self.rules.iter().position(|r| r == rule) {
            Some(index) => {
                self.rules.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[String] {
        &self.rules
    }
}

impl fmt::Display for AclRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rules.join(","))
    }
}

impl<B: StorageBackend> ArchiveSession<B> {
    /// Remove the immutability marker from the ACL of every directory on the
    /// disk side, whatever the session direction. An ACL left without rules
    /// is removed rather than set empty.
    ///
    /// Returns the number of directories whose ACL changed.
    pub fn make_mutable(&self) -> Result<usize> {
        let attr = self.options.acl_attribute.as_str();
        let marker = self.options.immutable_marker.as_str();
        let mut changed = 0;

        for entry in self.manifest.directories()? {
            let entry = entry?;
            let _enter = self.span.enter();
            let (url, _) = resolve_endpoints(&entry.path, Direction::DiskToTape, self.header());
            let fs = self.connection(&url)?;

            let value = match fs.get_attribute(&url, attr) {
                Ok(value) => value,
                Err(e) => {
                    warn!("No xattr {} found for dir {}: {}", attr, url, e);
                    continue;
                }
            };

            let mut rules = AclRules::parse(&value);
            if !rules.remove(marker) {
                debug!("Dir {} has no {} rule in {}", url, marker, value);
                continue;
            }

            if rules.is_empty() {
                fs.remove_attribute(&url, attr).map_err(|e| {
                    error!("Error removing xattr {} for dir {}: {}", attr, url, e);
                    ArchiveError::Mutability {
                        url: url.clone(),
                        reason: e.to_string(),
                    }
                })?;
            } else {
                let new_value = rules.to_string();
                fs.set_attribute(&url, attr, &new_value).map_err(|e| {
                    error!(
                        "Error making dir {} mutable, {} {} -> {}: {}",
                        url, attr, value, new_value, e
                    );
                    ArchiveError::Mutability {
                        url: url.clone(),
                        reason: e.to_string(),
                    }
                })?;
            }
            changed += 1;
        }

        let _enter = self.span.enter();
        info!("Made {} directories mutable", changed);
        Ok(changed)
    }
}
