//! Collision-safe relocation of downloaded files.
//!
//! [`FileOrganizer::resolve`] turns a source file and a destination directory
//! into a [`RelocationPlan`] whose destination does not name an existing file,
//! appending `(1)`, `(2)`, ... to the file stem until it finds a free name.
//! [`RelocationPlan::execute`] then performs the move with a plain rename.
//!
//! Resolution and execution are two separate steps with no lock in between, so
//! two files racing for the same free name can still collide. The watched
//! directory is expected to have a single producer.
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while relocating a single file.
#[derive(Debug, Error)]
pub enum RelocationError {
    /// The event path does not live under the watched directory.
    #[error("{} is not inside {}", path.display(), root.display())]
    OutsideWatchRoot { path: PathBuf, root: PathBuf },

    /// The event path has no file name component.
    #[error("{} has no file name", .0.display())]
    NoFileName(PathBuf),

    /// The rename itself failed (missing directory, permissions, other device).
    #[error("Failed to move {} to {}: {source}", from.display(), to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type for relocation operations.
pub type RelocationResult<T> = Result<T, RelocationError>;

/// A computed move of one file, with collisions already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationPlan {
    /// Absolute path of the file to move.
    pub source: PathBuf,
    /// Absolute, collision-free destination path.
    pub destination: PathBuf,
    /// Destination relative to the category directory, e.g. `photo(1).png`.
    pub relative_destination: PathBuf,
    /// Relative path without its extension, e.g. `sub/photo`.
    pub stem: PathBuf,
    /// Extension including its leading dot, or empty.
    pub extension: OsString,
}

impl RelocationPlan {
    /// Moves the file to its destination.
    ///
    /// Uses `fs::rename`, so the move is atomic on one filesystem and fails
    /// with an I/O error across devices.
    pub fn execute(&self) -> RelocationResult<()> {
        fs::rename(&self.source, &self.destination).map_err(|e| RelocationError::MoveFailed {
            from: self.source.clone(),
            to: self.destination.clone(),
            source: e,
        })
    }
}

/// Computes collision-free destinations for files.
pub struct FileOrganizer;

impl FileOrganizer {
    /// Resolves where `source` should go under `destination_dir`.
    ///
    /// `relative_path` is the path of the file relative to the watched root;
    /// any subdirectories in it are kept under `destination_dir`. If a file
    /// already exists at the candidate, a counter starting at 1 is inserted
    /// between the stem and the extension until a free name is found.
    ///
    /// Only existence checks touch the filesystem.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use downsort::file_organizer::FileOrganizer;
    /// use std::path::Path;
    ///
    /// let plan = FileOrganizer::resolve(
    ///     Path::new("/home/u/Downloads/photo.png"),
    ///     Path::new("/home/u/Pictures"),
    ///     Path::new("photo.png"),
    /// )
    /// .unwrap();
    /// println!("{} -> {}", plan.source.display(), plan.destination.display());
    /// ```
    pub fn resolve(
        source: &Path,
        destination_dir: &Path,
        relative_path: &Path,
    ) -> RelocationResult<RelocationPlan> {
        let (stem, extension) = split_extension(relative_path)
            .ok_or_else(|| RelocationError::NoFileName(relative_path.to_path_buf()))?;

        let mut relative_destination = relative_path.to_path_buf();
        let mut iteration = 0u32;
        while destination_dir.join(&relative_destination).is_file() {
            iteration += 1;
            relative_destination = numbered(&stem, iteration, &extension);
        }

        Ok(RelocationPlan {
            source: source.to_path_buf(),
            destination: destination_dir.join(&relative_destination),
            relative_destination,
            stem,
            extension,
        })
    }
}

/// Splits a relative path into its stem and extension (with the dot).
///
/// Follows `Path::extension`: `archive.tar.gz` splits as `archive.tar` and
/// `.gz`, while `.bashrc` has no extension.
fn split_extension(path: &Path) -> Option<(PathBuf, OsString)> {
    let file_stem = path.file_stem()?;
    let stem = match path.parent() {
        Some(parent) => parent.join(file_stem),
        None => PathBuf::from(file_stem),
    };
    let extension = match path.extension() {
        Some(ext) => {
            let mut dotted = OsString::from(".");
            dotted.push(ext);
            dotted
        }
        None => OsString::new(),
    };
    Some((stem, extension))
}

/// Builds `stem(n)extension`.
fn numbered(stem: &Path, n: u32, extension: &OsStr) -> PathBuf {
    let mut name = stem.as_os_str().to_os_string();
    name.push(format!("({n})"));
    name.push(extension);
    PathBuf::from(name)
}
