//! Fire-and-forget desktop notifications.
//!
//! The watcher hands a [`Notification`] to a [`Notifier`] and never looks at
//! the outcome. [`DesktopNotifier`] spawns `notify-send`; tests and `--no-notify`
//! use [`SilentNotifier`].

use std::fmt;
use std::process::{Command, Stdio};

/// Title used for successful moves.
pub const DOWNLOAD_COMPLETE: &str = "Download Complete";

/// One or more lines of notification text. The first line is the title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    lines: Vec<String>,
}

impl Notification {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// A successful move: `Download Complete` / `<file>, move to <destination>`.
    pub fn moved(relative_destination: impl fmt::Display, destination_name: &str) -> Self {
        Self::new([
            DOWNLOAD_COMPLETE.to_string(),
            format!("{relative_destination}, move to {destination_name}"),
        ])
    }

    /// A failed move, reported as the error text alone.
    pub fn failed(error: &dyn std::error::Error) -> Self {
        Self::new([error.to_string()])
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines.join(" | "))
    }
}

/// Delivers notifications to the user.
///
/// Implementations must not block the caller for long and must not fail;
/// delivery problems are theirs to log.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Sends notifications through `notify-send`.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    program: String,
    icon: String,
    timeout_ms: u32,
}

impl DesktopNotifier {
    pub fn new(icon: impl Into<String>, timeout_ms: u32) -> Self {
        Self {
            program: "notify-send".to_string(),
            icon: icon.into(),
            timeout_ms,
        }
    }

    /// Uses a different executable with the same arguments as `notify-send`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, notification: &Notification) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-i")
            .arg(&self.icon)
            .arg("-t")
            .arg(self.timeout_ms.to_string())
            .args(notification.lines())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new("go-down", 10_000)
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, notification: &Notification) {
        match self.command(notification).spawn() {
            Ok(mut child) => {
                // Reap in the background so the exit status is never awaited here.
                let reaper = std::thread::Builder::new()
                    .name("downsort-notify".to_string())
                    .spawn(move || {
                        let _ = child.wait();
                    });
                if let Err(e) = reaper {
                    tracing::warn!("[notifier] could not reap {}: {e}", self.program);
                }
            }
            Err(e) => {
                tracing::warn!("[notifier] could not run {}: {e}", self.program);
            }
        }
    }
}

/// Drops every notification. The log line is still written by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _notification: &Notification) {}
}
