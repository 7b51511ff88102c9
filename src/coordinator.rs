//! Lifecycle of the filesystem subscription and event routing.
//!
//! `notify` runs its own thread and pushes raw events into a channel. A single
//! dispatcher thread drains that channel, turns creation events (and files
//! renamed in from outside the watch root) into [`PendingEvent`]s and hands each one to every [`CategoryWatcher`] whose
//! category claims the file's extension. Stopping closes a second channel the
//! dispatcher selects on, drops the subscription and joins the thread.

use crate::config::{AppConfig, CompiledFilters, ConfigError};
use crate::file_category::CategoryRegistry;
use crate::notifier::Notifier;
use crate::watcher::{CategoryWatcher, Outcome, PendingEvent};
use crossbeam_channel::{Receiver, Sender, TryRecvError, select};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Errors that prevent watching from starting.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Watch root {} does not exist or is not a directory", .0.display())]
    MissingWatchRoot(PathBuf),

    #[error("Failed to initialize watcher: {0}")]
    Notify(#[from] notify::Error),

    #[error("Failed to start dispatcher thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Watcher is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Pairs the two halves of renames that happen inside the watch root.
///
/// A rename target with no matching source was moved in from elsewhere and
/// counts as a new file.
#[derive(Debug, Default)]
struct RenameTracker {
    sources: VecDeque<usize>,
    untracked_source: bool,
}

impl RenameTracker {
    const CAPACITY: usize = 64;

    /// Records `event`; true if it is a rename target without a source.
    fn moved_in(&mut self, event: &Event) -> bool {
        let EventKind::Modify(ModifyKind::Name(mode)) = event.kind else {
            self.untracked_source = false;
            return false;
        };
        match mode {
            RenameMode::From => {
                match event.tracker() {
                    Some(tracker) => {
                        if self.sources.len() == Self::CAPACITY {
                            self.sources.pop_front();
                        }
                        self.sources.push_back(tracker);
                        self.untracked_source = false;
                    }
                    // Backends without trackers report the halves back to back.
                    None => self.untracked_source = true,
                }
                false
            }
            RenameMode::To => {
                let paired = match event.tracker() {
                    Some(tracker) => match self.sources.iter().position(|&t| t == tracker) {
                        Some(index) => {
                            self.sources.remove(index);
                            true
                        }
                        None => false,
                    },
                    None => self.untracked_source,
                };
                self.untracked_source = false;
                !paired
            }
            _ => false,
        }
    }
}

/// Routes events to the category watchers.
pub struct Dispatcher {
    watchers: Vec<CategoryWatcher>,
    filters: CompiledFilters,
    renames: Mutex<RenameTracker>,
}

impl Dispatcher {
    /// Creates one watcher per registered category, all rooted at `home`.
    pub fn new(
        registry: &CategoryRegistry,
        home: &Path,
        notifier: Arc<dyn Notifier>,
        filters: CompiledFilters,
    ) -> Self {
        let watchers = registry
            .iter()
            .map(|category| CategoryWatcher::new(category.clone(), home, Arc::clone(&notifier)))
            .collect();
        Self {
            watchers,
            filters,
            renames: Mutex::default(),
        }
    }

    pub fn watchers(&self) -> &[CategoryWatcher] {
        &self.watchers
    }

    /// Extracts the creation events carried by a raw `notify` event.
    ///
    /// `EventKind::Create` and the target of a rename whose source lies
    /// outside the watch root count as creations. Anything else, including a
    /// rename inside the watch root, yields nothing.
    pub fn pending_events(&self, event: &Event) -> Vec<PendingEvent> {
        let moved_in = self
            .renames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .moved_in(event);
        if moved_in {
            return event
                .paths
                .iter()
                .map(|path| PendingEvent {
                    path: path.clone(),
                    is_directory: path.is_dir(),
                })
                .collect();
        }

        let EventKind::Create(kind) = event.kind else {
            return Vec::new();
        };
        event
            .paths
            .iter()
            .map(|path| PendingEvent {
                path: path.clone(),
                is_directory: match kind {
                    CreateKind::Folder => true,
                    CreateKind::File => false,
                    CreateKind::Any | CreateKind::Other => path.is_dir(),
                },
            })
            .collect()
    }

    /// Handles one raw event, returning the outcome of every watcher that ran.
    pub fn dispatch(&self, event: &Event) -> Vec<Outcome> {
        self.pending_events(event)
            .iter()
            .flat_map(|pending| self.route(pending))
            .collect()
    }

    /// Hands `pending` to each watcher whose category claims it.
    ///
    /// Excluded file names and unclaimed extensions are left alone.
    pub fn route(&self, pending: &PendingEvent) -> Vec<Outcome> {
        if !self.filters.should_include(&pending.path) {
            tracing::debug!("[dispatch] excluded {}", pending.path.display());
            return Vec::new();
        }
        self.watchers
            .iter()
            .filter(|watcher| watcher.accepts(&pending.path))
            .map(|watcher| watcher.on_created(pending))
            .collect()
    }

    /// Files moved per category, in registry order.
    pub fn summary(&self) -> Vec<(String, usize)> {
        self.watchers
            .iter()
            .map(|w| (w.category().name().to_string(), w.moved_count()))
            .collect()
    }

    /// Events that failed across all categories.
    pub fn failures(&self) -> usize {
        self.watchers.iter().map(CategoryWatcher::failed_count).sum()
    }
}

struct RunningWatch {
    watcher: RecommendedWatcher,
    shutdown: Sender<()>,
    thread: JoinHandle<()>,
}

/// Owns the `notify` subscription and the dispatcher thread.
pub struct WatchCoordinator {
    watch_root: PathBuf,
    dispatcher: Arc<Dispatcher>,
    running: Option<RunningWatch>,
}

impl WatchCoordinator {
    /// Builds a coordinator from validated configuration.
    ///
    /// # Errors
    ///
    /// Fails on a missing or relative home directory, a clashing custom
    /// category or an invalid exclusion pattern.
    pub fn new(config: &AppConfig, notifier: Arc<dyn Notifier>) -> Result<Self, WatchError> {
        let home = config.home_directory()?;
        let registry = config.registry()?;
        let filters = config.compile_filters()?;
        Ok(Self::with_registry(home, &registry, notifier, filters))
    }

    pub fn with_registry(
        home: &Path,
        registry: &CategoryRegistry,
        notifier: Arc<dyn Notifier>,
        filters: CompiledFilters,
    ) -> Self {
        Self {
            watch_root: home.join("Downloads"),
            dispatcher: Arc::new(Dispatcher::new(registry, home, notifier, filters)),
            running: None,
        }
    }

    pub fn watch_root(&self) -> &Path {
        &self.watch_root
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Subscribes to the watch root recursively and starts dispatching.
    ///
    /// # Errors
    ///
    /// Fails if the watch root is missing, the subscription cannot be set up,
    /// or the coordinator is already running.
    pub fn start(&mut self) -> Result<(), WatchError> {
        if self.running.is_some() {
            return Err(WatchError::AlreadyRunning);
        }
        if !self.watch_root.is_dir() {
            return Err(WatchError::MissingWatchRoot(self.watch_root.clone()));
        }

        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = event_tx.send(res);
        })?;
        watcher.watch(&self.watch_root, RecursiveMode::Recursive)?;

        let (shutdown, shutdown_rx) = crossbeam_channel::bounded(1);
        let dispatcher = Arc::clone(&self.dispatcher);
        let thread = thread::Builder::new()
            .name("downsort-dispatch".to_string())
            .spawn(move || dispatch_loop(&dispatcher, &event_rx, &shutdown_rx))
            .map_err(WatchError::Spawn)?;

        tracing::debug!("[watcher] watching {}", self.watch_root.display());
        self.running = Some(RunningWatch {
            watcher,
            shutdown,
            thread,
        });
        Ok(())
    }

    /// Stops dispatching and waits for the dispatcher thread to exit.
    ///
    /// An event already being handled runs to completion. Calling this when
    /// not running does nothing.
    pub fn stop(&mut self) {
        let Some(RunningWatch {
            watcher,
            shutdown,
            thread,
        }) = self.running.take()
        else {
            return;
        };

        let _ = shutdown.send(());
        drop(watcher);
        if thread.join().is_err() {
            tracing::error!("[watcher] dispatcher thread panicked");
        }
        tracing::debug!("[watcher] stopped");
    }

    /// Starts watching, blocks until `interrupt` fires, then stops.
    ///
    /// A disconnected `interrupt` channel counts as an interrupt.
    pub fn run(&mut self, interrupt: &Receiver<()>) -> Result<(), WatchError> {
        self.start()?;
        let _ = interrupt.recv();
        self.stop();
        Ok(())
    }
}

impl Drop for WatchCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn dispatch_loop(
    dispatcher: &Dispatcher,
    events: &Receiver<notify::Result<Event>>,
    shutdown: &Receiver<()>,
) {
    loop {
        select! {
            recv(shutdown) -> _ => break,
            recv(events) -> msg => match msg {
                Ok(Ok(event)) => {
                    if !matches!(shutdown.try_recv(), Err(TryRecvError::Empty)) {
                        break;
                    }
                    dispatcher.dispatch(&event);
                }
                Ok(Err(e)) => tracing::error!("[watcher] file watch error: {e}"),
                Err(_) => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::SilentNotifier;
    use notify::event::RemoveKind;
    use std::fs;
    use tempfile::TempDir;

    fn fake_home() -> TempDir {
        let home = TempDir::new().expect("Failed to create temp directory");
        for dir in ["Downloads", "Pictures", "Music", "Videos", "Documents"] {
            fs::create_dir(home.path().join(dir)).expect("Failed to create directory");
        }
        home
    }

    fn coordinator(home: &Path) -> WatchCoordinator {
        WatchCoordinator::with_registry(
            home,
            &CategoryRegistry::builtin(),
            Arc::new(SilentNotifier),
            CompiledFilters::default(),
        )
    }

    fn dispatcher(home: &Path) -> Dispatcher {
        Dispatcher::new(
            &CategoryRegistry::builtin(),
            home,
            Arc::new(SilentNotifier),
            CompiledFilters::default(),
        )
    }

    fn renamed(mode: RenameMode, path: &str, tracker: Option<usize>) -> Event {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(mode))).add_path(path.into());
        match tracker {
            Some(tracker) => event.set_tracker(tracker),
            None => event,
        }
    }

    #[test]
    fn test_pending_events_only_for_create() {
        let dispatcher = dispatcher(Path::new("/home/u"));
        let create = Event::new(EventKind::Create(CreateKind::File)).add_path("/d/a.png".into());
        let modify = Event::new(EventKind::Modify(ModifyKind::Any)).add_path("/d/a.png".into());
        let remove = Event::new(EventKind::Remove(RemoveKind::File)).add_path("/d/a.png".into());

        assert_eq!(
            dispatcher.pending_events(&create),
            [PendingEvent::file("/d/a.png")]
        );
        assert!(dispatcher.pending_events(&modify).is_empty());
        assert!(dispatcher.pending_events(&remove).is_empty());
    }

    #[test]
    fn test_folder_creation_is_directory() {
        let dispatcher = dispatcher(Path::new("/home/u"));
        let event = Event::new(EventKind::Create(CreateKind::Folder)).add_path("/d/new.png".into());
        assert_eq!(
            dispatcher.pending_events(&event),
            [PendingEvent::directory("/d/new.png")]
        );
    }

    #[test]
    fn test_rename_target_without_source_is_creation() {
        let dispatcher = dispatcher(Path::new("/home/u"));
        let moved_in = renamed(RenameMode::To, "/d/a.png", Some(7));
        assert_eq!(
            dispatcher.pending_events(&moved_in),
            [PendingEvent::file("/d/a.png")]
        );

        let untracked = renamed(RenameMode::To, "/d/b.png", None);
        assert_eq!(
            dispatcher.pending_events(&untracked),
            [PendingEvent::file("/d/b.png")]
        );
    }

    #[test]
    fn test_rename_inside_watch_root_is_ignored() {
        let dispatcher = dispatcher(Path::new("/home/u"));

        let from = renamed(RenameMode::From, "/d/a.png.part", Some(3));
        let to = renamed(RenameMode::To, "/d/a.png", Some(3));
        let both = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path("/d/a.png.part".into())
            .add_path("/d/a.png".into())
            .set_tracker(3);
        assert!(dispatcher.pending_events(&from).is_empty());
        assert!(dispatcher.pending_events(&to).is_empty());
        assert!(dispatcher.pending_events(&both).is_empty());

        let from = renamed(RenameMode::From, "/d/b.part", None);
        let to = renamed(RenameMode::To, "/d/b.png", None);
        assert!(dispatcher.pending_events(&from).is_empty());
        assert!(dispatcher.pending_events(&to).is_empty());
    }

    #[test]
    fn test_source_moved_out_does_not_pair_later_target() {
        let dispatcher = dispatcher(Path::new("/home/u"));
        // Untracked source followed by an unrelated event.
        let from = renamed(RenameMode::From, "/d/old.png", None);
        let create = Event::new(EventKind::Create(CreateKind::File)).add_path("/d/c.txt".into());
        let to = renamed(RenameMode::To, "/d/new.png", None);

        assert!(dispatcher.pending_events(&from).is_empty());
        assert_eq!(dispatcher.pending_events(&create).len(), 1);
        assert_eq!(
            dispatcher.pending_events(&to),
            [PendingEvent::file("/d/new.png")]
        );
    }

    #[test]
    fn test_queued_events_are_dropped_after_shutdown() {
        let home = fake_home();
        let dispatcher = dispatcher(home.path());
        let source = home.path().join("Downloads").join("photo.png");
        fs::write(&source, "png").unwrap();

        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        for _ in 0..4 {
            event_tx
                .send(Ok(Event::new(EventKind::Create(CreateKind::File)).add_path(source.clone())))
                .unwrap();
        }
        shutdown_tx.send(()).unwrap();

        dispatch_loop(&dispatcher, &event_rx, &shutdown_rx);

        assert!(source.is_file());
        assert_eq!(dispatcher.summary().iter().map(|(_, n)| n).sum::<usize>(), 0);
    }

    #[test]
    fn test_one_watcher_per_category() {
        let home = fake_home();
        let coordinator = coordinator(home.path());
        assert_eq!(coordinator.dispatcher().watchers().len(), 4);
        assert_eq!(coordinator.watch_root(), home.path().join("Downloads"));
    }

    #[test]
    fn test_dispatch_routes_to_matching_category() {
        let home = fake_home();
        let coordinator = coordinator(home.path());
        let source = home.path().join("Downloads").join("clip.TS");
        fs::write(&source, "ts").unwrap();

        let event = Event::new(EventKind::Create(CreateKind::File)).add_path(source.clone());
        let outcomes = coordinator.dispatcher().dispatch(&event);

        assert_eq!(outcomes.len(), 1);
        assert!(home.path().join("Videos").join("clip.TS").is_file());
        assert_eq!(
            coordinator.dispatcher().summary(),
            [
                ("Pictures".to_string(), 0),
                ("Music".to_string(), 0),
                ("Videos".to_string(), 1),
                ("Documents".to_string(), 0),
            ]
        );
    }

    #[test]
    fn test_unclaimed_extension_is_untouched() {
        let home = fake_home();
        let coordinator = coordinator(home.path());
        let source = home.path().join("Downloads").join("clip.ts");
        fs::write(&source, "ts").unwrap();

        let event = Event::new(EventKind::Create(CreateKind::File)).add_path(source.clone());
        assert!(coordinator.dispatcher().dispatch(&event).is_empty());
        assert!(source.is_file());
    }

    #[test]
    fn test_start_requires_watch_root() {
        let home = TempDir::new().expect("Failed to create temp directory");
        let mut coordinator = coordinator(home.path());
        assert!(matches!(
            coordinator.start(),
            Err(WatchError::MissingWatchRoot(_))
        ));
        assert!(!coordinator.is_running());
    }

    #[test]
    fn test_start_stop_lifecycle() {
        let home = fake_home();
        let mut coordinator = coordinator(home.path());

        coordinator.start().unwrap();
        assert!(coordinator.is_running());
        assert!(matches!(coordinator.start(), Err(WatchError::AlreadyRunning)));

        coordinator.stop();
        assert!(!coordinator.is_running());
        coordinator.stop();
    }

    #[test]
    fn test_run_returns_on_interrupt() {
        let home = fake_home();
        let mut coordinator = coordinator(home.path());
        let (tx, rx) = crossbeam_channel::bounded(1);
        tx.send(()).unwrap();

        coordinator.run(&rx).unwrap();
        assert!(!coordinator.is_running());
    }
}
