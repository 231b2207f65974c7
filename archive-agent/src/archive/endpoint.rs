//! Endpoint resolution.
//!
//! The header `src` is always the disk side and `dst` always the tape side;
//! the transfer direction decides which of them is the origin.

use crate::manifest::ArchiveHeader;
use std::fmt;

/// Transfer direction of an archive session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Disk to tape (archive put)
    DiskToTape,
    /// Tape to disk (archive get)
    TapeToDisk,
}

impl Direction {
    pub fn is_forward(self) -> bool {
        self == Direction::DiskToTape
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::DiskToTape => Direction::TapeToDisk,
            Direction::TapeToDisk => Direction::DiskToTape,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::DiskToTape => "disk-to-tape",
            Direction::TapeToDisk => "tape-to-disk",
        })
    }
}

/// Full `(origin, destination)` URLs of a manifest relative path.
pub fn resolve_endpoints(
    rel_path: &str,
    direction: Direction,
    header: &ArchiveHeader,
) -> (String, String) {
    let rel_path = if rel_path == "./" { "" } else { rel_path };
    let disk = format!("{}{}", header.src, rel_path);
    let tape = format!("{}{}", header.dst, rel_path);

    match direction {
        Direction::DiskToTape => (disk, tape),
        Direction::TapeToDisk => (tape, disk),
    }
}

/// Pick the handle serving `url`: the disk handle for URLs below the header
/// `src`, the tape handle for URLs below `dst`.
pub fn select_connection<'a, B: ?Sized>(
    url: &str,
    header: &ArchiveHeader,
    disk: &'a B,
    tape: &'a B,
) -> Option<&'a B> {
    if url.starts_with(&header.src) {
        Some(disk)
    } else if url.starts_with(&header.dst) {
        Some(tape)
    } else {
        None
    }
}
