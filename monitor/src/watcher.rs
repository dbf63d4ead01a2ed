//! File-change notifications for the watched log file.
//!
//! # Architecture
//!
//! The [`notify`] crate delivers events on its own thread. The callback does
//! no I/O and takes no locks: it keeps only events whose path resolves to the
//! watched file and pushes a [`ChangeNotice`] onto a bounded channel. The
//! supervisor is the single consumer of that channel and performs all reads,
//! so two notifications can never race on the read position.
//!
//! The subscription is placed on the parent directory (non-recursive) rather
//! than on the file itself, which keeps it alive across deletion, recreation
//! and rename-based rotation of the file.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use tokio::sync::mpsc;
//! use logsentinel_monitor::watcher::FileWatcher;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (tx, mut rx) = mpsc::channel(100);
//!     let _watcher = FileWatcher::subscribe(PathBuf::from("/var/log/app.log"), tx)?;
//!
//!     while let Some(notice) = rx.recv().await {
//!         println!("{:?}", notice.kind);
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, trace};

/// What kind of change a notification reported.
///
/// The engine re-reads the file for every kind; the kind is kept for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
    Other,
}

impl From<&EventKind> for ChangeKind {
    fn from(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Modify(_) => ChangeKind::Modified,
            EventKind::Remove(_) => ChangeKind::Removed,
            _ => ChangeKind::Other,
        }
    }
}

/// A "the watched file changed" signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeNotice {
    pub kind: ChangeKind,
}

/// Errors that can occur while subscribing to file-change notifications.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to initialize the file system watcher.
    #[error("failed to create watcher: {0}")]
    WatcherInit(#[from] notify::Error),

    /// The watched path has no parent directory to subscribe to.
    #[error("watched path has no parent directory: {0}")]
    NoParentDirectory(PathBuf),
}

/// Result type for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Subscription to changes of a single file.
///
/// Dropping the value (or calling [`unsubscribe`](Self::unsubscribe)) ends
/// the subscription and closes the notice channel from the producer side.
#[derive(Debug)]
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    target: PathBuf,
    watch_dir: PathBuf,
}

impl FileWatcher {
    /// Subscribes to changes of `target`.
    ///
    /// `target` should be absolute and canonical; event paths are compared
    /// against it after resolving their parent directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `target` has no parent directory or the underlying
    /// watcher cannot be created.
    pub fn subscribe(target: PathBuf, notices: mpsc::Sender<ChangeNotice>) -> Result<Self> {
        let watch_dir = target
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .ok_or_else(|| WatcherError::NoParentDirectory(target.clone()))?;

        let filter_target = target.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| {
                handle_notify_event(res, &filter_target, &notices);
            },
            Config::default(),
        )?;

        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

        debug!(
            watch_dir = %watch_dir.display(),
            target = %target.display(),
            "Subscribed to file changes"
        );

        Ok(Self {
            watcher,
            target,
            watch_dir,
        })
    }

    /// The file this subscription reports on.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Directory the underlying watcher is attached to.
    #[must_use]
    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }

    /// Releases the subscription.
    pub fn unsubscribe(mut self) {
        if let Err(e) = self.watcher.unwatch(&self.watch_dir) {
            debug!(error = %e, "Failed to unwatch directory, dropping watcher anyway");
        }
        debug!(watch_dir = %self.watch_dir.display(), "Released file change subscription");
    }
}

/// Filters a raw notify event down to notices about `target`.
fn handle_notify_event(
    res: std::result::Result<Event, notify::Error>,
    target: &Path,
    notices: &mpsc::Sender<ChangeNotice>,
) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "File watcher error");
            return;
        }
    };

    trace!(kind = ?event.kind, paths = ?event.paths, "Received notify event");

    if matches!(event.kind, EventKind::Access(_)) {
        return;
    }

    if !event.paths.iter().any(|path| is_same_file(path, target)) {
        return;
    }

    let notice = ChangeNotice {
        kind: ChangeKind::from(&event.kind),
    };

    // Never block the notify thread. A full queue already holds a pending
    // notice, and each pass reads everything up to the current size.
    match notices.try_send(notice) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            trace!("Notice queue full, coalescing with pending notice");
        }
        Err(TrySendError::Closed(_)) => {
            trace!("Notice queue closed, dropping event");
        }
    }
}

/// Compares an event path with the canonical target path.
///
/// The parent directory is canonicalized instead of the path itself so that
/// events for a file that no longer exists still resolve.
fn is_same_file(path: &Path, target: &Path) -> bool {
    if path == target {
        return true;
    }

    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if Some(name) == target.file_name() => parent
            .canonicalize()
            .map(|dir| dir.join(name) == target)
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind, RemoveKind};
    use std::fs;

    fn canonical_target(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "").unwrap();
        path.canonicalize().unwrap()
    }

    fn event(kind: EventKind, path: &Path) -> Event {
        Event::new(kind).add_path(path.to_path_buf())
    }

    #[test]
    fn change_kind_mapping() {
        assert_eq!(
            ChangeKind::from(&EventKind::Create(CreateKind::File)),
            ChangeKind::Created
        );
        assert_eq!(
            ChangeKind::from(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            ChangeKind::Modified
        );
        assert_eq!(
            ChangeKind::from(&EventKind::Remove(RemoveKind::File)),
            ChangeKind::Removed
        );
        assert_eq!(ChangeKind::from(&EventKind::Any), ChangeKind::Other);
    }

    #[test]
    fn events_for_target_are_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let target = canonical_target(dir.path(), "app.log");
        let (tx, mut rx) = mpsc::channel(10);

        handle_notify_event(
            Ok(event(EventKind::Modify(ModifyKind::Any), &target)),
            &target,
            &tx,
        );

        assert_eq!(
            rx.try_recv().unwrap(),
            ChangeNotice {
                kind: ChangeKind::Modified
            }
        );
    }

    #[test]
    fn sibling_events_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let target = canonical_target(dir.path(), "app.log");
        let sibling = canonical_target(dir.path(), "other.log");
        let (tx, mut rx) = mpsc::channel(10);

        handle_notify_event(
            Ok(event(EventKind::Modify(ModifyKind::Any), &sibling)),
            &target,
            &tx,
        );

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn access_events_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let target = canonical_target(dir.path(), "app.log");
        let (tx, mut rx) = mpsc::channel(10);

        handle_notify_event(
            Ok(event(EventKind::Access(AccessKind::Any), &target)),
            &target,
            &tx,
        );

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let target = canonical_target(dir.path(), "app.log");
        let (tx, mut rx) = mpsc::channel(1);

        for _ in 0..5 {
            handle_notify_event(
                Ok(event(EventKind::Modify(ModifyKind::Any), &target)),
                &target,
                &tx,
            );
        }

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn removed_file_still_matches() {
        let dir = tempfile::tempdir().unwrap();
        let target = canonical_target(dir.path(), "app.log");
        fs::remove_file(&target).unwrap();

        // Same file reached through a non-canonical directory spelling.
        let indirect = dir.path().join(".").join("app.log");
        assert!(is_same_file(&indirect, &target));
        assert!(!is_same_file(&dir.path().join("app.log.1"), &target));
    }

    #[tokio::test]
    async fn subscribe_and_unsubscribe() {
        let dir = tempfile::tempdir().unwrap();
        let target = canonical_target(dir.path(), "app.log");
        let (tx, _rx) = mpsc::channel(10);

        let watcher = FileWatcher::subscribe(target.clone(), tx).expect("Should subscribe");
        assert_eq!(watcher.target(), target.as_path());
        assert_eq!(watcher.watch_dir(), target.parent().unwrap());

        watcher.unsubscribe();
    }

    #[tokio::test]
    async fn unsubscribe_closes_notice_channel() {
        let dir = tempfile::tempdir().unwrap();
        let target = canonical_target(dir.path(), "app.log");
        let (tx, mut rx) = mpsc::channel(10);

        let watcher = FileWatcher::subscribe(target.clone(), tx).expect("Should subscribe");
        fs::write(&target, "ERROR: seen while subscribed\n").unwrap();
        watcher.unsubscribe();

        // Drain whatever was queued; the channel must then report closed.
        let closed = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(closed.is_ok(), "notice sender outlived the subscription");

        fs::write(&target, "CRITICAL: after unsubscribe\n").unwrap();
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn subscribe_requires_parent_directory() {
        let (tx, _rx) = mpsc::channel(10);
        let result = FileWatcher::subscribe(PathBuf::from("app.log"), tx);

        assert!(matches!(
            result.unwrap_err(),
            WatcherError::NoParentDirectory(_)
        ));
    }

    #[test]
    fn watcher_error_display() {
        let err = WatcherError::NoParentDirectory(PathBuf::from("app.log"));
        assert_eq!(
            err.to_string(),
            "watched path has no parent directory: app.log"
        );
    }
}
