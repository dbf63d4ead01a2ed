//! Read-position tracking for the watched file.
//!
//! The store holds the byte offset already consumed, the bytes of an
//! unterminated trailing line, and the identity of the file the offset refers
//! to. It lives only as long as the process; nothing is persisted.

use std::fmt;
use std::fs::Metadata;
use std::str::FromStr;
use std::time::SystemTime;

/// Where the engine starts reading when it first attaches to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPosition {
    /// Offset 0: content already in the file is scanned too.
    #[default]
    Beginning,
    /// Current file size: only content appended after startup is scanned.
    End,
}

impl FromStr for StartPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginning" | "start" => Ok(StartPosition::Beginning),
            "end" => Ok(StartPosition::End),
            other => Err(format!("expected 'beginning' or 'end', got '{other}'")),
        }
    }
}

impl fmt::Display for StartPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartPosition::Beginning => f.write_str("beginning"),
            StartPosition::End => f.write_str("end"),
        }
    }
}

/// Identity of a file on disk, independent of its path.
///
/// On Unix this is the device and inode pair plus the creation time when the
/// filesystem reports one. Inode numbers can be reused as soon as a file is
/// deleted; the creation time still tells the recreated file apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    dev: u64,
    ino: u64,
    created: Option<SystemTime>,
}

impl FileIdentity {
    /// Extracts the identity from file metadata, if the platform exposes one.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(meta: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;

        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
            created: meta.created().ok(),
        })
    }

    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(_meta: &Metadata) -> Option<Self> {
        None
    }
}

/// Last consumed offset plus the pending partial line.
#[derive(Debug, Default)]
pub struct PositionStore {
    last_offset: u64,
    pending_partial: Vec<u8>,
    identity: Option<FileIdentity>,
}

impl PositionStore {
    /// Creates a store positioned at offset 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store positioned at `offset` for the given file.
    #[must_use]
    pub fn at(offset: u64, identity: Option<FileIdentity>) -> Self {
        Self {
            last_offset: offset,
            pending_partial: Vec::new(),
            identity,
        }
    }

    /// Byte offset already read from the file.
    #[must_use]
    pub fn last_offset(&self) -> u64 {
        self.last_offset
    }

    /// Moves the read position forward to `new_offset`.
    ///
    /// Only [`reset`](Self::reset) may move the position backwards.
    pub fn advance(&mut self, new_offset: u64) {
        debug_assert!(
            new_offset >= self.last_offset,
            "read position moved backwards: {} -> {new_offset}",
            self.last_offset
        );
        self.last_offset = new_offset;
    }

    /// Rewinds to offset 0 and drops the pending partial line.
    ///
    /// Used when the file was truncated or replaced underneath the watcher.
    pub fn reset(&mut self) {
        self.last_offset = 0;
        self.pending_partial.clear();
        self.identity = None;
    }

    /// Bytes of the incomplete trailing line from the previous read.
    #[must_use]
    pub fn pending_partial(&self) -> &[u8] {
        &self.pending_partial
    }

    pub(crate) fn take_pending(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending_partial)
    }

    pub(crate) fn set_pending(&mut self, bytes: Vec<u8>) {
        debug_assert!(!bytes.contains(&b'\n'), "pending partial holds a terminator");
        self.pending_partial = bytes;
    }

    /// Identity of the file the offset refers to, if known.
    #[must_use]
    pub fn identity(&self) -> Option<FileIdentity> {
        self.identity
    }

    pub(crate) fn set_identity(&mut self, identity: Option<FileIdentity>) {
        self.identity = identity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_starts_at_zero() {
        let store = PositionStore::new();
        assert_eq!(store.last_offset(), 0);
        assert!(store.pending_partial().is_empty());
        assert!(store.identity().is_none());
    }

    #[test]
    fn advance_moves_forward() {
        let mut store = PositionStore::new();
        store.advance(42);
        assert_eq!(store.last_offset(), 42);
        store.advance(42);
        assert_eq!(store.last_offset(), 42);
        store.advance(100);
        assert_eq!(store.last_offset(), 100);
    }

    #[test]
    fn reset_clears_offset_and_partial() {
        let mut store = PositionStore::at(128, None);
        store.set_pending(b"ERRO".to_vec());

        store.reset();

        assert_eq!(store.last_offset(), 0);
        assert!(store.pending_partial().is_empty());
    }

    #[test]
    fn take_pending_leaves_buffer_empty() {
        let mut store = PositionStore::new();
        store.set_pending(b"partial".to_vec());

        assert_eq!(store.take_pending(), b"partial".to_vec());
        assert!(store.pending_partial().is_empty());
    }

    #[test]
    fn start_position_parsing() {
        assert_eq!("beginning".parse(), Ok(StartPosition::Beginning));
        assert_eq!("START".parse(), Ok(StartPosition::Beginning));
        assert_eq!(" end ".parse(), Ok(StartPosition::End));
        assert!("middle".parse::<StartPosition>().is_err());
        assert_eq!(StartPosition::default(), StartPosition::Beginning);
    }

    #[cfg(unix)]
    #[test]
    fn identity_differs_for_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.log");
        let b = dir.path().join("b.log");
        std::fs::write(&a, "x").unwrap();
        std::fs::write(&b, "x").unwrap();

        let id_a = FileIdentity::from_metadata(&std::fs::metadata(&a).unwrap());
        let id_a_again = FileIdentity::from_metadata(&std::fs::metadata(&a).unwrap());
        let id_b = FileIdentity::from_metadata(&std::fs::metadata(&b).unwrap());

        assert!(id_a.is_some());
        assert_eq!(id_a, id_a_again);
        assert_ne!(id_a, id_b);
    }
}
