//! downsort - keep the Downloads directory tidy
//!
//! This library watches `<home>/Downloads` for newly created files and moves
//! each one into the directory of the category its extension belongs to
//! (Pictures, Music, Videos, Documents, plus any configured extras), picking a
//! numbered name when the destination is taken and sending a desktop
//! notification for every move or failure.

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod file_category;
pub mod file_organizer;
pub mod logging;
pub mod notifier;
pub mod output;
pub mod watcher;

pub use config::{AppConfig, CompiledFilters, ConfigError};
pub use coordinator::{Dispatcher, WatchCoordinator, WatchError};
pub use file_category::{Category, CategoryRegistry};
pub use file_organizer::{FileOrganizer, RelocationError, RelocationPlan};
pub use notifier::{DesktopNotifier, Notification, Notifier, SilentNotifier};
pub use watcher::{CategoryWatcher, Outcome, PendingEvent};

pub use cli::{Cli, run_cli};
