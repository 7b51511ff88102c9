//! Category registry mapping file extensions to destination directories.
//!
//! A [`Category`] is a plain data record: a unique name, the directory (relative
//! to the home directory) its files are moved into, and the set of extensions it
//! claims. Extension matching is case-sensitive, so `TS` and `ts` are different
//! registrations.
//!
//! # Examples
//!
//! ```
//! use downsort::file_category::CategoryRegistry;
//! use std::path::Path;
//!
//! let registry = CategoryRegistry::builtin();
//! let pictures = registry.categorize(Path::new("photo.png")).unwrap();
//! assert_eq!(pictures.name(), "Pictures");
//! assert!(registry.categorize(Path::new("photo.PNG")).is_none());
//! ```
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

const PICTURE_EXTENSIONS: &[&str] = &[
    "jpg", "png", "gif", "webp", "tiff", "psd", "raw", "bmp", "jpeg", "svg",
];

const MUSIC_EXTENSIONS: &[&str] = &[
    "aa", "aac", "aax", "amr", "awb", "dct", "dss", "dvf", "flac", "m4a", "m4b", "mmf", "mp3",
    "mpc", "msv", "nmf", "nsf", "sln", "tta", "voc", "vox", "wav", "wma", "wv",
];

const VIDEO_EXTENSIONS: &[&str] = &[
    "vob", "TS", "3g2", "webm", "mp2", "avi", "M2TS", "roq", "yuv", "nsv", "mng", "mpeg", "m4p",
    "m4v", "wmv", "mkv", "rmvb", "MTS", "rm", "mpg", "mpe", "3gp", "ogv", "mov", "mpv", "asf",
    "mp4", "mxf", "ogg", "amv", "f4p", "gifv", "qt", "svi", "f4v", "flv", "f4a", "f4b", "drc",
    "m2v",
];

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "ABW", "ACL", "AFP", "AMI", "Amigaguide", "ANS", "ASC", "AWW", "CCF", "CSV", "CWK", "DBK",
    "DITA", "DOC", "DOCM", "DOCX", "DOT", "DOTX", "DWD", "EGT", "EPUB", "EZW", "FDX", "FTM", "FTX",
    "GDOC", "HTML", "HWP", "HWPML", "LOG", "LWP", "MBP", "MD", "ME", "MCW", "Mobi", "NB", "nb",
    "NBP", "NEIS", "ODM", "ODOC", "ODT", "OSHEET", "OTT", "OMM", "PAGES", "PAP", "PDAX", "PDF",
    "QUOX", "Radix-64", "RTF", "RPT", "SDW", "SE", "STW", "Sxw", "TeX", "INFO", "Troff", "TXT",
    "UOF", "UOML", "VIA", "WPD", "WPS", "WPT", "WRD", "WRF", "WRI", "xhtml", "XML", "XPS", "xht",
];

/// Errors raised while assembling a [`CategoryRegistry`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Two categories were registered under the same name.
    #[error("Category '{0}' is already registered")]
    DuplicateName(String),
    /// A category was defined without any extensions.
    #[error("Category '{0}' has no extensions")]
    NoExtensions(String),
    /// An extension is already claimed by another category.
    #[error("Extension '{extension}' of '{category}' is already claimed by '{owner}'")]
    ExtensionClaimed {
        extension: String,
        category: String,
        owner: String,
    },
}

/// A class of file types sharing one destination directory.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    name: String,
    destination: PathBuf,
    extensions: BTreeSet<String>,
}

impl Category {
    /// Creates a category from its name, destination subdirectory and extensions.
    ///
    /// Extensions are stored verbatim apart from surrounding whitespace and a
    /// leading dot, which are stripped. Case is kept.
    pub fn new<I, S>(name: impl Into<String>, destination: impl Into<PathBuf>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: name.into(),
            destination: destination.into(),
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_string())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    /// Image files, moved to `Pictures`.
    pub fn pictures() -> Self {
        Self::new("Pictures", "Pictures", PICTURE_EXTENSIONS)
    }

    /// Audio files, moved to `Music`.
    pub fn music() -> Self {
        Self::new("Music", "Music", MUSIC_EXTENSIONS)
    }

    /// Video files, moved to `Videos`.
    pub fn videos() -> Self {
        Self::new("Videos", "Videos", VIDEO_EXTENSIONS)
    }

    /// Document files, moved to `Documents`.
    pub fn documents() -> Self {
        Self::new("Documents", "Documents", DOCUMENT_EXTENSIONS)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Destination directory, relative to the home directory.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Name of the destination directory as shown to the user.
    pub fn destination_name(&self) -> String {
        self.destination.display().to_string()
    }

    pub fn extensions(&self) -> &BTreeSet<String> {
        &self.extensions
    }

    /// Returns true if the extension of `path` is registered for this category.
    ///
    /// The extension is everything after the last `.` of the file name and is
    /// compared exactly, without case folding.
    pub fn matches(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.extensions.contains(ext.as_str()))
    }
}

/// Returns the text after the last `.` in the file name of `path`.
///
/// A name like `.png` yields `png`, so hidden files are claimed by the
/// category of their suffix.
pub fn extension_of(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_string_lossy();
    file_name.rsplit_once('.').map(|(_, ext)| ext.to_string())
}

/// Ordered set of categories with unique names.
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    categories: Vec<Category>,
}

impl CategoryRegistry {
    /// Creates a registry with no categories.
    pub fn empty() -> Self {
        Self {
            categories: Vec::new(),
        }
    }

    /// Creates a registry holding the four built-in categories.
    pub fn builtin() -> Self {
        Self {
            categories: vec![
                Category::pictures(),
                Category::music(),
                Category::videos(),
                Category::documents(),
            ],
        }
    }

    /// Appends a category.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] if a category with the same
    /// name exists, [`RegistryError::NoExtensions`] if the category claims
    /// nothing and [`RegistryError::ExtensionClaimed`] if one of its extensions
    /// already belongs to another category.
    pub fn with_category(mut self, category: Category) -> Result<Self, RegistryError> {
        if self.get(category.name()).is_some() {
            return Err(RegistryError::DuplicateName(category.name));
        }
        if category.extensions.is_empty() {
            return Err(RegistryError::NoExtensions(category.name));
        }
        for extension in &category.extensions {
            if let Some(owner) = self.categories.iter().find(|c| c.extensions.contains(extension)) {
                return Err(RegistryError::ExtensionClaimed {
                    extension: extension.clone(),
                    category: category.name.clone(),
                    owner: owner.name.clone(),
                });
            }
        }
        self.categories.push(category);
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn extensions_for(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.get(name).map(Category::extensions)
    }

    pub fn destination_for(&self, name: &str) -> Option<&Path> {
        self.get(name).map(Category::destination)
    }

    /// Returns the first category claiming the extension of `path`.
    pub fn categorize(&self, path: &Path) -> Option<&Category> {
        self.categories.iter().find(|c| c.matches(path))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
