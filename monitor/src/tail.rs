//! Incremental tailing of the watched file.
//!
//! [`WatchState`] owns the read position for one file and turns the bytes
//! appended since the previous read into complete lines. Each read opens the
//! file, seeks to the last offset, reads up to the current size and closes it
//! again, so a rotated file is never read through a stale handle.
//!
//! # Partial lines
//!
//! A read that does not end in `\n` leaves a trailing fragment. The fragment
//! is kept as raw bytes and prepended to the next read, so a line written in
//! several pieces is delivered exactly once. The offset always advances past
//! every byte read; fragments are carried forward in memory, never by
//! rewinding the offset.
//!
//! # Rotation
//!
//! The position is reset to 0 when the file shrinks below the last offset,
//! when its [`FileIdentity`] changes, or when it reappears after a read found
//! it missing. The last rule matters on filesystems that hand a freed inode
//! number straight to the next file created in the directory.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};

use crate::position::{FileIdentity, PositionStore, StartPosition};

/// Default cap on an unterminated line before it is emitted as-is.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Result of one tailing pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReadBatch {
    /// Complete lines, in file order, without their terminators.
    pub lines: Vec<String>,

    /// Number of bytes read from the file during this pass.
    pub bytes_read: u64,

    /// Whether the position was reset because of truncation or replacement.
    pub rotated: bool,
}

/// Tailing state for the watched file.
#[derive(Debug)]
pub struct WatchState {
    path: PathBuf,
    position: PositionStore,
    max_line_bytes: usize,
    vanished: bool,
}

impl WatchState {
    /// Attaches to `path`, starting at the beginning or the end of the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub fn new(path: PathBuf, start: StartPosition) -> io::Result<Self> {
        let meta = fs::metadata(&path)?;
        let offset = match start {
            StartPosition::Beginning => 0,
            StartPosition::End => meta.len(),
        };

        debug!(
            path = %path.display(),
            offset,
            start = %start,
            "Initialized watch state"
        );

        Ok(Self {
            path,
            position: PositionStore::at(offset, FileIdentity::from_metadata(&meta)),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            vanished: false,
        })
    }

    /// Sets the size above which an unterminated line is force-emitted.
    #[must_use]
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes.max(1);
        self
    }

    /// Path of the watched file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current read position.
    #[must_use]
    pub fn position(&self) -> &PositionStore {
        &self.position
    }

    /// Reads every byte appended since the last call and returns the
    /// complete lines they finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, inspected, or read. The
    /// position is left untouched in that case; a `NotFound` error only
    /// remembers that the next successful open must start from offset 0.
    pub fn read_new_lines(&mut self) -> io::Result<ReadBatch> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                if e.kind() == io::ErrorKind::NotFound {
                    self.vanished = true;
                }
                return Err(e);
            }
        };
        let metadata = file.metadata()?;
        let file_size = metadata.len();
        let identity = FileIdentity::from_metadata(&metadata);

        let mut rotated = false;

        if self.vanished {
            info!(
                path = %self.path.display(),
                old_pos = self.position.last_offset(),
                new_size = file_size,
                "File reappeared, resetting position to 0"
            );
            self.position.reset();
            self.vanished = false;
            rotated = true;
        }

        let replaced = matches!(
            (self.position.identity(), identity),
            (Some(known), Some(current)) if known != current
        );
        if !rotated && replaced {
            info!(
                path = %self.path.display(),
                old_pos = self.position.last_offset(),
                new_size = file_size,
                "File replaced, resetting position to 0"
            );
            self.position.reset();
            rotated = true;
        }

        if !rotated && file_size < self.position.last_offset() {
            info!(
                path = %self.path.display(),
                old_pos = self.position.last_offset(),
                new_size = file_size,
                "File truncated, resetting position to 0"
            );
            self.position.reset();
            rotated = true;
        }

        self.position.set_identity(identity);

        let read_position = self.position.last_offset();
        if file_size <= read_position {
            trace!(path = %self.path.display(), offset = read_position, "No new data");
            return Ok(ReadBatch {
                rotated,
                ..ReadBatch::default()
            });
        }

        file.seek(SeekFrom::Start(read_position))?;

        // Only read up to the size observed above; bytes appended after the
        // metadata call are picked up by the next pass.
        let expected = file_size - read_position;
        let mut chunk = Vec::with_capacity(usize::try_from(expected).unwrap_or(0));
        let bytes_read = (&mut file).take(expected).read_to_end(&mut chunk)? as u64;

        self.position.advance(read_position + bytes_read);
        let lines = self.reconstruct(&chunk);

        debug!(
            path = %self.path.display(),
            from = read_position,
            to = self.position.last_offset(),
            line_count = lines.len(),
            pending = self.position.pending_partial().len(),
            "Read new data"
        );

        Ok(ReadBatch {
            lines,
            bytes_read,
            rotated,
        })
    }

    /// Joins the pending fragment with `chunk` and splits complete lines.
    fn reconstruct(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut buffer = self.position.take_pending();
        buffer.extend_from_slice(chunk);

        let (mut lines, rest) = split_lines(&buffer);

        if rest.len() > self.max_line_bytes {
            warn!(
                path = %self.path.display(),
                length = rest.len(),
                limit = self.max_line_bytes,
                "Unterminated line exceeds limit, emitting it as a complete line"
            );
            lines.push(decode_line(rest));
            self.position.set_pending(Vec::new());
        } else {
            self.position.set_pending(rest.to_vec());
        }

        lines
    }
}

/// Splits `buffer` on `\n`.
///
/// Returns the complete lines (with any trailing `\r` removed, decoded as
/// lossy UTF-8) and the unterminated remainder, which is empty when the
/// buffer ends in a terminator.
#[must_use]
pub fn split_lines(buffer: &[u8]) -> (Vec<String>, &[u8]) {
    let mut segments: Vec<&[u8]> = buffer.split(|byte| *byte == b'\n').collect();
    // `split` always yields at least one segment: the remainder after the last terminator.
    let rest = segments.pop().unwrap_or_default();
    let lines = segments.into_iter().map(decode_line).collect();
    (lines, rest)
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
