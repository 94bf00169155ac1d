//! Path conditions deciding which walked paths take part in grouping.
//!
//! All conditions must hold for a path to be admitted. The default set
//! admits regular, non-empty files that are not symbolic links;
//! `--empty-file` and `--follow-symbolic` drop the matching condition.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Predicate type for [`Condition`].
pub type ConditionFn = dyn Fn(&Path) -> io::Result<bool> + Send + Sync;

/// A named path predicate.
#[derive(Clone)]
pub struct Condition {
    name: String,
    func: Arc<ConditionFn>,
}

impl Condition {
    /// Wrap a predicate as a named condition.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Path) -> io::Result<bool> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the condition for `path`.
    ///
    /// # Errors
    ///
    /// Any I/O error other than the path having vanished.
    pub fn apply(&self, path: &Path) -> io::Result<bool> {
        (self.func)(path)
    }

    /// Regular file (symbolic links are followed).
    #[must_use]
    pub fn is_file() -> Self {
        Self::new("is_file", |path| {
            Ok(metadata(path, |p| fs::metadata(p))?.is_some_and(|m| m.is_file()))
        })
    }

    /// The path itself is not a symbolic link.
    #[must_use]
    pub fn not_symbolic_link() -> Self {
        Self::new("not_symbolic_link", |path| {
            Ok(metadata(path, |p| fs::symlink_metadata(p))?
                .is_some_and(|m| !m.file_type().is_symlink()))
        })
    }

    /// File size is greater than zero.
    #[must_use]
    pub fn not_empty() -> Self {
        Self::new("not_empty", |path| {
            Ok(metadata(path, |p| fs::metadata(p))?.is_some_and(|m| m.len() > 0))
        })
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition").field("name", &self.name).finish()
    }
}

/// Metadata lookup where a vanished path is simply "no".
fn metadata(
    path: &Path,
    lookup: fn(&Path) -> io::Result<fs::Metadata>,
) -> io::Result<Option<fs::Metadata>> {
    match lookup(path) {
        Ok(m) => Ok(Some(m)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("File not found (may have been deleted): {}", path.display());
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Condition set used by the CLI.
///
/// `is_file` is always present; `not_empty` unless `empty_file`;
/// `not_symbolic_link` unless `follow_symbolic`.
#[must_use]
pub fn default_conditions(empty_file: bool, follow_symbolic: bool) -> Vec<Condition> {
    let mut conditions = vec![Condition::is_file()];
    if !follow_symbolic {
        conditions.push(Condition::not_symbolic_link());
    }
    if !empty_file {
        conditions.push(Condition::not_empty());
    }
    conditions
}
