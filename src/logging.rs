//! Logging setup.
//!
//! Two `tracing` layers are installed: a human-oriented one on stderr and a
//! plain one appending `YYYY-MM-DD HH:MM:SS - message` lines to a size-bounded
//! log file. When the file would grow past `max_bytes` it is renamed to
//! `<file>.1`, older backups shift up by one, and anything beyond
//! `backup_count` is deleted.
//!
//! `RUST_LOG` takes precedence over the configured level for stderr. Events on
//! [`NOTIFICATION_TARGET`] always reach the file, whatever the configured level.

use crate::config::LoggingConfig;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};
use tracing_subscriber::fmt::time::FormatTime;
use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Target of the line written for every notification.
pub const NOTIFICATION_TARGET: &str = "downsort::notify";

static INIT: Once = Once::new();

/// `2024-05-01 13:37:00 -`
struct LogTime;

impl FormatTime for LogTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{} -", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

/// A log file that rotates itself by size.
#[derive(Debug)]
pub struct RotatingFileWriter {
    path: PathBuf,
    max_bytes: u64,
    backup_count: usize,
    file: File,
    written: u64,
}

impl RotatingFileWriter {
    /// Opens `path` for appending, creating parent directories as needed.
    ///
    /// A `max_bytes` of zero disables rotation.
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backup_count: usize) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = open_append(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path,
            max_bytes,
            backup_count,
            file,
            written,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.backup_count == 0 {
            self.file = File::create(&self.path)?;
            self.written = 0;
            return Ok(());
        }

        let oldest = self.backup_path(self.backup_count);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..self.backup_count).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                fs::rename(&from, self.backup_path(index + 1))?;
            }
        }
        fs::rename(&self.path, self.backup_path(1))?;

        self.file = open_append(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.max_bytes > 0
            && self.written > 0
            && self.written + buf.len() as u64 > self.max_bytes
        {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Initialize logging with configuration.
///
/// Call once at startup. Safe to call multiple times (only first call takes effect).
/// Passing `None` for `log_file` only logs to stderr.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened.
pub fn init(config: &LoggingConfig, log_file: Option<&Path>) -> io::Result<()> {
    let writer = log_file
        .map(|path| RotatingFileWriter::open(path, config.max_bytes, config.backup_count))
        .transpose()?;

    INIT.call_once(|| {
        let stderr_filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            level_filter(&config.level)
        };

        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .with_filter(stderr_filter);

        let file_layer = writer.map(|writer| file_layer(writer, &config.level));

        let _ = tracing_subscriber::registry()
            .with(stderr_layer)
            .with(file_layer)
            .try_init();
    });

    Ok(())
}

/// Plain `YYYY-MM-DD HH:MM:SS - message` lines into `writer`.
///
/// `level` applies to everything except [`NOTIFICATION_TARGET`], which is
/// always kept at `info`.
fn file_layer<S>(writer: RotatingFileWriter, level: &str) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(writer))
        .with_ansi(false)
        .with_target(false)
        .with_level(false)
        .with_timer(LogTime)
        .with_filter(file_filter(level))
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn file_filter(level: &str) -> EnvFilter {
    let notifications = format!("{NOTIFICATION_TARGET}=info");
    EnvFilter::try_new(format!("{level},{notifications}"))
        .unwrap_or_else(|_| EnvFilter::new(format!("info,{notifications}")))
}
