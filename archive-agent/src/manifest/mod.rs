//! Manifest reader.
//!
//! A manifest is line oriented: one header line followed by the directory
//! section and then the file section. The reader remembers the byte offset
//! where each section starts and every call to [`ManifestReader::directories`]
//! or [`ManifestReader::files`] opens its own handle and seeks there, so the
//! sequences are restartable and independent of each other.

pub mod entry;

pub use entry::{value_as_u64, value_text, ArchiveHeader, Entry, EntryKind};

use crate::utils::errors::{ArchiveError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Start of one manifest section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SectionStart {
    /// Byte offset of the first line of the section
    offset: u64,

    /// 1-based line number at `offset`
    line: usize,
}

/// Parsed manifest header plus the section offsets of one archive file.
#[derive(Debug, Clone)]
pub struct ManifestReader {
    path: PathBuf,
    header: ArchiveHeader,
    dirs_start: SectionStart,
    files_start: SectionStart,
}

impl ManifestReader {
    /// Open a manifest, parse its header and locate both sections.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut reader = open_at(&path, 0)?;

        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .map_err(|source| manifest_read_error(&path, 1, source))?;
        if read == 0 {
            return Err(ArchiveError::ManifestFormat {
                line: 1,
                reason: "empty manifest".to_string(),
            });
        }
        let header = ArchiveHeader::parse(&line)?;

        let dirs_start = SectionStart {
            offset: read as u64,
            line: 2,
        };

        // Scan for the first file entry. When there is none the file
        // section starts at end of input and is empty.
        let mut pos = dirs_start;
        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .map_err(|source| manifest_read_error(&path, pos.line, source))?;
            if read == 0 {
                break;
            }
            if !line.trim().is_empty() && Entry::parse(&line, pos.line)?.kind == EntryKind::File {
                break;
            }
            pos.offset += read as u64;
            pos.line += 1;
        }

        debug!(
            "Opened manifest {} (src: {}, dst: {}, dirs at {}, files at {})",
            path.display(),
            header.src,
            header.dst,
            dirs_start.offset,
            pos.offset
        );

        Ok(Self {
            path,
            header,
            dirs_start,
            files_start: pos,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Directory entries in manifest order.
    pub fn directories(&self) -> Result<SectionEntries> {
        self.section(EntryKind::Directory, self.dirs_start)
    }

    /// File entries in manifest order.
    pub fn files(&self) -> Result<SectionEntries> {
        self.section(EntryKind::File, self.files_start)
    }

    /// All directory entries followed by all file entries.
    pub fn entries(&self) -> Result<std::iter::Chain<SectionEntries, SectionEntries>> {
        Ok(self.directories()?.chain(self.files()?))
    }

    fn section(&self, kind: EntryKind, start: SectionStart) -> Result<SectionEntries> {
        Ok(SectionEntries {
            reader: Some(open_at(&self.path, start.offset)?),
            kind,
            arity: self.header.meta_for(kind).len() + 2,
            line: start.line,
            buf: String::new(),
        })
    }
}

/// Lazy sequence over one manifest section.
///
/// Stops at end of input or at the first entry of another kind. A malformed
/// line is yielded as an error and ends the sequence.
#[derive(Debug)]
pub struct SectionEntries {
    reader: Option<BufReader<File>>,
    kind: EntryKind,
    arity: usize,
    line: usize,
    buf: String,
}

impl SectionEntries {
    fn next_entry(&mut self) -> Result<Option<Entry>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        loop {
            self.buf.clear();
            let read = reader
                .read_line(&mut self.buf)
                .map_err(|e| ArchiveError::ManifestFormat {
                    line: self.line,
                    reason: format!("read failed: {}", e),
                })?;
            if read == 0 {
                return Ok(None);
            }

            let line = self.line;
            self.line += 1;
            if self.buf.trim().is_empty() {
                continue;
            }

            let entry = Entry::parse(&self.buf, line)?;
            if entry.kind != self.kind {
                return Ok(None);
            }
            if entry.field_count() != self.arity {
                error!(
                    "Manifest line {} has {} fields, expected {}",
                    line,
                    entry.field_count(),
                    self.arity
                );
                return Err(ArchiveError::ManifestFormat {
                    line,
                    reason: format!("expected {} fields, got {}", self.arity, entry.field_count()),
                });
            }
            return Ok(Some(entry));
        }
    }
}

impl Iterator for SectionEntries {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.reader = None;
                None
            }
            Err(e) => {
                self.reader = None;
                Some(Err(e))
            }
        }
    }
}

fn open_at(path: &Path, offset: u64) -> Result<BufReader<File>> {
    let mut file = File::open(path).map_err(|source| manifest_open_error(path, source))?;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset))
            .map_err(|source| manifest_open_error(path, source))?;
    }
    Ok(BufReader::new(file))
}

/// A readable manifest with undecodable content is a format error, anything
/// else means the resource itself could not be read.
fn manifest_read_error(path: &Path, line: usize, source: std::io::Error) -> ArchiveError {
    if source.kind() == std::io::ErrorKind::InvalidData {
        error!(
            "Manifest {} line {} is not valid UTF-8",
            path.display(),
            line
        );
        return ArchiveError::ManifestFormat {
            line,
            reason: source.to_string(),
        };
    }
    manifest_open_error(path, source)
}

fn manifest_open_error(path: &Path, source: std::io::Error) -> ArchiveError {
    error!("Failed to open manifest {}: {}", path.display(), source);
    ArchiveError::ManifestOpen {
        path: path.to_path_buf(),
        source,
    }
}
