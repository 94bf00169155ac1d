//! Path discovery and admission conditions.
//!
//! This module provides functionality for:
//! - Directory walking using jwalk, with filename globs and directory
//!   substring filters
//! - Walking several roots as one path stream
//! - The path conditions that decide which walked paths are grouped
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal ([`Walker`], [`RootSearch`])
//! - [`conditions`]: Admission predicates ([`Condition`])
//!
//! # Example
//!
//! ```no_run
//! use dupgroup::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     recursive: true,
//!     include: vec!["*.jpg".to_string()],
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(Path::new("."), config).unwrap();
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(path) => println!("{}", path.display()),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod conditions;
pub mod walker;

use std::path::PathBuf;

pub use conditions::{default_conditions, Condition};
pub use walker::{RootSearch, Walker};

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Descend into subdirectories. Without it only the root's own
    /// entries are listed.
    pub recursive: bool,

    /// Deepest directory level to list when recursive (1 = the root only).
    pub max_depth: Option<usize>,

    /// Follow symbolic links to directories during traversal.
    /// Warning: May cause infinite loops with symlink cycles.
    pub follow_symlinks: bool,

    /// Walk hidden files and directories (names starting with `.`).
    pub follow_hidden: bool,

    /// Filename globs; when non-empty only matching files are listed.
    pub include: Vec<String>,

    /// Filename globs to leave out.
    pub exclude: Vec<String>,

    /// Substrings that must all appear in a file's directory path.
    pub dir_include: Vec<String>,

    /// Substrings of which none may appear in a file's directory path.
    pub dir_exclude: Vec<String>,
}

impl WalkerConfig {
    /// Effective jwalk depth limit.
    #[must_use]
    pub fn depth_limit(&self) -> usize {
        if self.recursive {
            self.max_depth.unwrap_or(usize::MAX).max(1)
        } else {
            1
        }
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A filename glob could not be compiled.
    #[error("Invalid glob '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
