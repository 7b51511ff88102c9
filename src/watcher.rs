//! Per-category handling of newly created files.
//!
//! A [`CategoryWatcher`] is bound to one [`Category`], the watched downloads
//! directory and the category's destination directory. The coordinator only
//! routes it events whose extension the category claims.

use crate::file_category::Category;
use crate::file_organizer::{FileOrganizer, RelocationError, RelocationPlan, RelocationResult};
use crate::logging::NOTIFICATION_TARGET;
use crate::notifier::{Notification, Notifier};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A filesystem creation event, consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    /// Path as reported by the event source, normally absolute.
    pub path: PathBuf,
    pub is_directory: bool,
}

impl PendingEvent {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
        }
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
        }
    }
}

/// What happened to one event.
#[derive(Debug)]
pub enum Outcome {
    /// Directory events are never relocated.
    Ignored,
    Moved(RelocationPlan),
    Failed(RelocationError),
}

/// Moves files of one category out of the downloads directory.
pub struct CategoryWatcher {
    category: Category,
    watch_root: PathBuf,
    destination_root: PathBuf,
    notifier: Arc<dyn Notifier>,
    moved: AtomicUsize,
    failed: AtomicUsize,
}

impl CategoryWatcher {
    /// Binds `category` to `home/Downloads` and `home/<destination>`.
    pub fn new(category: Category, home: &Path, notifier: Arc<dyn Notifier>) -> Self {
        let watch_root = home.join("Downloads");
        let destination_root = home.join(category.destination());
        Self {
            category,
            watch_root,
            destination_root,
            notifier,
            moved: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn watch_root(&self) -> &Path {
        &self.watch_root
    }

    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }

    /// Returns true if this watcher's category claims `path`.
    pub fn accepts(&self, path: &Path) -> bool {
        self.category.matches(path)
    }

    /// Files moved so far.
    pub fn moved_count(&self) -> usize {
        self.moved.load(Ordering::Relaxed)
    }

    /// Events that failed so far.
    pub fn failed_count(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    /// Handles a creation event.
    ///
    /// Directories are ignored. Any error is reported through the notifier and
    /// the log and then dropped, so the watcher keeps running.
    pub fn on_created(&self, event: &PendingEvent) -> Outcome {
        if event.is_directory {
            return Outcome::Ignored;
        }

        match self.relocate(&event.path) {
            Ok(plan) => {
                self.moved.fetch_add(1, Ordering::Relaxed);
                self.report(Notification::moved(
                    plan.relative_destination.display(),
                    &self.category.destination_name(),
                ));
                Outcome::Moved(plan)
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("[{}] {} failed: {e}", self.category.name(), event.path.display());
                self.report(Notification::failed(&e));
                Outcome::Failed(e)
            }
        }
    }

    fn relocate(&self, path: &Path) -> RelocationResult<RelocationPlan> {
        let relative = path.strip_prefix(&self.watch_root).map_err(|_| {
            RelocationError::OutsideWatchRoot {
                path: path.to_path_buf(),
                root: self.watch_root.clone(),
            }
        })?;
        let source = self.watch_root.join(relative);
        let plan = FileOrganizer::resolve(&source, &self.destination_root, relative)?;
        plan.execute()?;
        Ok(plan)
    }

    fn report(&self, notification: Notification) {
        tracing::info!(target: NOTIFICATION_TARGET, "{notification}");
        self.notifier.notify(&notification);
    }
}
