//! Directory walker implementation using jwalk for parallel traversal.
//!
//! # Overview
//!
//! [`Walker`] lists the files below one root; [`RootSearch`] chains the
//! walkers of several roots into the single path stream the grouping
//! engine consumes. Directory entries are read in parallel by jwalk and
//! sorted by name, so the stream order is deterministic.
//!
//! # Features
//!
//! - Recursive or single-level listing, with an optional depth limit
//! - Filename include/exclude globs via `ignore` overrides
//! - Directory substring filters
//! - Hidden file filtering
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use dupgroup::scanner::{RootSearch, WalkerConfig};
//! use std::path::PathBuf;
//!
//! let config = WalkerConfig {
//!     recursive: true,
//!     exclude: vec!["*.tmp".to_string()],
//!     ..Default::default()
//! };
//!
//! let search = RootSearch::new(&[PathBuf::from("~/Downloads")], &config).unwrap();
//! let paths: Vec<PathBuf> = search.paths().collect();
//! println!("Found {} files", paths.len());
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use ignore::overrides::{Override, OverrideBuilder};
use jwalk::WalkDir;

use super::{ScanError, WalkerConfig};

/// Directory walker for a single root.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Compiled include/exclude globs
    overrides: Override,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    ///
    /// # Errors
    ///
    /// [`ScanError::InvalidGlob`] if an include or exclude glob is invalid.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dupgroup::scanner::{Walker, WalkerConfig};
    /// use std::path::Path;
    ///
    /// let walker = Walker::new(Path::new("."), WalkerConfig::default()).unwrap();
    /// ```
    pub fn new(path: &Path, config: WalkerConfig) -> Result<Self, ScanError> {
        let overrides = build_overrides(path, &config)?;
        Ok(Self {
            root: path.to_path_buf(),
            config,
            overrides,
            shutdown_flag: None,
        })
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops iteration as soon
    /// as possible.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Root directory of this walker.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the directory tree, yielding every non-directory entry that
    /// passes the configured filters.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration.
    pub fn walk(&self) -> impl Iterator<Item = Result<PathBuf, ScanError>> {
        let root = self.root.clone();
        let config = self.config.clone();
        let overrides = self.overrides.clone();
        let shutdown_flag = self.shutdown_flag.clone();

        let walk_dir = WalkDir::new(&root)
            .follow_links(config.follow_symlinks)
            .skip_hidden(!config.follow_hidden)
            .max_depth(config.depth_limit())
            .process_read_dir(|_depth, _path, _read_dir_state, children| {
                // Sort children for deterministic output
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir
            .into_iter()
            .take_while(move |_| {
                let stop = shutdown_flag
                    .as_ref()
                    .is_some_and(|f| f.load(Ordering::SeqCst));
                if stop {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                }
                !stop
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    if entry.depth == 0 || entry.file_type().is_dir() {
                        return None;
                    }
                    let path = entry.path();
                    if passes_filters(&path, &config, &overrides) {
                        Some(Ok(path))
                    } else {
                        None
                    }
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| root.clone(), std::borrow::ToOwned::to_owned);
                    Some(Err(handle_jwalk_error(path, e)))
                }
            })
    }
}

/// Compile include globs as whitelist entries and excludes as `!glob`.
fn build_overrides(root: &Path, config: &WalkerConfig) -> Result<Override, ScanError> {
    let mut builder = OverrideBuilder::new(root);
    let globs = config
        .include
        .iter()
        .map(|g| (g, g.clone()))
        .chain(config.exclude.iter().map(|g| (g, format!("!{g}"))));

    for (pattern, glob) in globs {
        builder
            .add(&glob)
            .map_err(|e| ScanError::InvalidGlob {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
    }

    builder.build().map_err(|e| ScanError::InvalidGlob {
        pattern: config.include.join(",") + &config.exclude.join(","),
        message: e.to_string(),
    })
}

/// Apply the filename globs and directory substring filters.
fn passes_filters(path: &Path, config: &WalkerConfig, overrides: &Override) -> bool {
    if let Some(name) = path.file_name() {
        if overrides.matched(Path::new(name), false).is_ignore() {
            log::trace!("Ignoring file: {}", path.display());
            return false;
        }
    }

    if config.dir_include.is_empty() && config.dir_exclude.is_empty() {
        return true;
    }

    let directory = path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !config
        .dir_include
        .iter()
        .all(|s| directory.contains(s.as_str()))
    {
        log::trace!("Directory not included: {}", path.display());
        return false;
    }
    if config
        .dir_exclude
        .iter()
        .any(|s| directory.contains(s.as_str()))
    {
        log::trace!("Directory excluded: {}", path.display());
        return false;
    }
    true
}

/// Handle jwalk errors.
fn handle_jwalk_error(path: PathBuf, error: jwalk::Error) -> ScanError {
    match error.io_error().map(std::io::Error::kind) {
        Some(std::io::ErrorKind::PermissionDenied) => {
            log::warn!("Permission denied: {}", path.display());
            ScanError::PermissionDenied(path)
        }
        Some(std::io::ErrorKind::NotFound) => {
            log::debug!("Path not found (may have been deleted): {}", path.display());
            ScanError::NotFound(path)
        }
        _ => {
            log::warn!("Walker error for {}: {}", path.display(), error);
            ScanError::Io {
                path,
                source: std::io::Error::other(error.to_string()),
            }
        }
    }
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match directories::BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

/// Several roots walked one after another as a single path stream.
///
/// Roots are validated up front. Duplicate roots (same canonical path)
/// are walked once. Walk errors are logged, counted and skipped.
#[derive(Debug)]
pub struct RootSearch {
    walkers: Vec<Walker>,
    errors: Arc<AtomicUsize>,
}

impl RootSearch {
    /// Validate `roots` and prepare a walker for each.
    ///
    /// # Errors
    ///
    /// [`ScanError::NotFound`] / [`ScanError::NotADirectory`] for a bad
    /// root, or [`ScanError::InvalidGlob`].
    pub fn new(roots: &[PathBuf], config: &WalkerConfig) -> Result<Self, ScanError> {
        let mut seen = HashSet::new();
        let mut walkers = Vec::with_capacity(roots.len());

        for root in roots {
            let root = expand_home(root);
            let metadata = std::fs::metadata(&root).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ScanError::NotFound(root.clone()),
                std::io::ErrorKind::PermissionDenied => ScanError::PermissionDenied(root.clone()),
                _ => ScanError::Io {
                    path: root.clone(),
                    source: e,
                },
            })?;
            if !metadata.is_dir() {
                return Err(ScanError::NotADirectory(root));
            }

            let key = std::fs::canonicalize(&root).unwrap_or_else(|_| root.clone());
            if !seen.insert(key) {
                log::debug!("Skipping duplicate root: {}", root.display());
                continue;
            }
            walkers.push(Walker::new(&root, config.clone())?);
        }

        Ok(Self {
            walkers,
            errors: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Set the shutdown flag on every walker.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.walkers = self
            .walkers
            .into_iter()
            .map(|w| w.with_shutdown_flag(flag.clone()))
            .collect();
        self
    }

    /// Counter of walk errors, readable after the stream is consumed.
    #[must_use]
    pub fn error_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.errors)
    }

    /// Roots that will be walked, after expansion and de-duplication.
    #[must_use]
    pub fn roots(&self) -> Vec<&Path> {
        self.walkers.iter().map(Walker::root).collect()
    }

    /// Every listed path of every root, in root order.
    pub fn paths(self) -> impl Iterator<Item = PathBuf> {
        let errors = self.errors;
        self.walkers
            .into_iter()
            .flat_map(|walker| {
                log::debug!("Walking {}", walker.root().display());
                walker.walk()
            })
            .filter_map(move |result| match result {
                Ok(path) => Some(path),
                Err(e) => {
                    log::warn!("{}", e);
                    errors.fetch_add(1, Ordering::Relaxed);
                    None
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    /// Create a test directory with some files.
    fn create_test_dir() -> TempDir {
        // A non-hidden root name, so hidden-entry filtering only sees children
        let dir = tempfile::Builder::new().prefix("walk").tempdir().unwrap();

        for (name, content) in [("b.txt", "beta"), ("a.txt", "alpha"), ("c.log", "log")] {
            let mut f = File::create(dir.path().join(name)).unwrap();
            writeln!(f, "{content}").unwrap();
        }

        let subdir = dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();
        let mut f = File::create(subdir.join("nested.txt")).unwrap();
        writeln!(f, "Nested file content").unwrap();

        dir
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    fn walk(dir: &Path, config: WalkerConfig) -> Vec<PathBuf> {
        Walker::new(dir, config)
            .unwrap()
            .walk()
            .filter_map(Result::ok)
            .collect()
    }

    #[test]
    fn test_walker_non_recursive_lists_root_only() {
        let dir = create_test_dir();
        let files = walk(dir.path(), WalkerConfig::default());
        assert_eq!(names(&files), vec!["a.txt", "b.txt", "c.log"]);
    }

    #[test]
    fn test_walker_recursive_sorted() {
        let dir = create_test_dir();
        let config = WalkerConfig {
            recursive: true,
            ..Default::default()
        };
        let files = walk(dir.path(), config);
        assert_eq!(names(&files), vec!["a.txt", "b.txt", "c.log", "nested.txt"]);
    }

    #[test]
    fn test_walker_max_depth() {
        let dir = create_test_dir();
        let deep = dir.path().join("subdir").join("deeper");
        fs::create_dir(&deep).unwrap();
        File::create(deep.join("deep.txt")).unwrap();

        let config = WalkerConfig {
            recursive: true,
            max_depth: Some(2),
            ..Default::default()
        };
        let files = walk(dir.path(), config);
        assert!(names(&files).contains(&"nested.txt".to_string()));
        assert!(!names(&files).contains(&"deep.txt".to_string()));
    }

    #[test]
    fn test_walker_include_exclude_globs() {
        let dir = create_test_dir();
        let config = WalkerConfig {
            recursive: true,
            include: vec!["*.txt".to_string()],
            exclude: vec!["b.*".to_string()],
            ..Default::default()
        };
        let files = walk(dir.path(), config);
        assert_eq!(names(&files), vec!["a.txt", "nested.txt"]);
    }

    #[test]
    fn test_walker_exclude_only() {
        let dir = create_test_dir();
        let config = WalkerConfig {
            exclude: vec!["*.log".to_string()],
            ..Default::default()
        };
        let files = walk(dir.path(), config);
        assert_eq!(names(&files), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_walker_dir_filters() {
        let dir = create_test_dir();
        let config = WalkerConfig {
            recursive: true,
            dir_include: vec!["subdir".to_string()],
            ..Default::default()
        };
        assert_eq!(names(&walk(dir.path(), config)), vec!["nested.txt"]);

        let config = WalkerConfig {
            recursive: true,
            dir_exclude: vec!["subdir".to_string()],
            ..Default::default()
        };
        assert_eq!(
            names(&walk(dir.path(), config)),
            vec!["a.txt", "b.txt", "c.log"]
        );
    }

    #[test]
    fn test_walker_skip_hidden_files() {
        let dir = create_test_dir();
        File::create(dir.path().join(".hidden")).unwrap();

        let files = walk(dir.path(), WalkerConfig::default());
        assert!(!names(&files).contains(&".hidden".to_string()));

        let config = WalkerConfig {
            follow_hidden: true,
            ..Default::default()
        };
        let files = walk(dir.path(), config);
        assert!(names(&files).contains(&".hidden".to_string()));
    }

    #[test]
    fn test_walker_invalid_glob() {
        let dir = create_test_dir();
        let config = WalkerConfig {
            include: vec!["a{b".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            Walker::new(dir.path(), config),
            Err(ScanError::InvalidGlob { .. })
        ));
    }

    #[test]
    fn test_walker_shutdown_flag() {
        let dir = create_test_dir();
        let flag = Arc::new(AtomicBool::new(true));
        let walker = Walker::new(dir.path(), WalkerConfig::default())
            .unwrap()
            .with_shutdown_flag(flag);
        assert_eq!(walker.walk().count(), 0);
    }

    #[test]
    fn test_root_search_validates_roots() {
        let dir = create_test_dir();
        let missing = dir.path().join("missing");
        assert!(matches!(
            RootSearch::new(&[missing], &WalkerConfig::default()),
            Err(ScanError::NotFound(_))
        ));

        let file = dir.path().join("a.txt");
        assert!(matches!(
            RootSearch::new(&[file], &WalkerConfig::default()),
            Err(ScanError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_root_search_dedupes_and_chains() {
        let first = create_test_dir();
        let second = create_test_dir();
        let roots = vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
            first.path().to_path_buf(),
        ];
        let search = RootSearch::new(&roots, &WalkerConfig::default()).unwrap();
        assert_eq!(search.roots().len(), 2);

        let paths: Vec<_> = search.paths().collect();
        assert_eq!(paths.len(), 6);
        assert!(paths[..3].iter().all(|p| p.starts_with(first.path())));
        assert!(paths[3..].iter().all(|p| p.starts_with(second.path())));
    }
}
