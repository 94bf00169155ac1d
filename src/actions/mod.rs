//! Group actions.
//!
//! Every finished group is handed to one [`GroupAction`]. The built-in
//! actions are:
//!
//! - [`LinkAction`] - replace duplicates with hard links to the representative
//! - [`RemoveAction`] - move duplicates to the trash (or delete them)
//! - [`MergeAction`] - copy groups into a directory tree keyed by signature
//! - [`ExecAction`] - run a command template for every member
//!
//! The printers in [`crate::output`] implement the same trait, so the
//! default "print the groups" behaviour is just another action.
//!
//! Files that disappeared between grouping and acting are logged and
//! skipped. Other per-file failures are logged and counted, and the
//! action carries on with the next file.
//!
//! ```no_run
//! use dupgroup::actions::{GroupAction, RemoveAction};
//! use dupgroup::grouping::Group;
//! use std::path::PathBuf;
//!
//! let group = Group::new(
//!     vec![PathBuf::from("/keep.txt"), PathBuf::from("/copy.txt")],
//!     vec!["5".to_string()],
//! );
//! let mut action = RemoveAction::new().with_dry_run(true);
//! action.apply(&group).unwrap();
//! ```

pub mod exec;
pub mod link;
pub mod merge;
pub mod remove;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::grouping::Group;
use crate::output::RunSummary;
use crate::template::TemplateError;

pub use exec::ExecAction;
pub use link::LinkAction;
pub use merge::{MergeAction, MergeCondition, MergePolicy, MergeSpec};
pub use remove::RemoveAction;

/// Error type for group actions.
#[derive(Debug, Error)]
pub enum ActionError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when touching a file.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    Trash { path: PathBuf, message: String },

    /// The merge directory already exists.
    #[error("merge directory already exists: {0}")]
    MergeTargetExists(PathBuf),

    /// A merge destination exists and the policy is ERROR.
    #[error("merge destination already exists: {0}")]
    MergeConflict(PathBuf),

    /// The `--merge` argument could not be parsed.
    #[error("invalid merge spec '{spec}': {reason}")]
    InvalidMergeSpec { spec: String, reason: String },

    /// A command template is invalid for this filter chain.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Writing action output failed.
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ActionError {
    /// Classify an I/O error for `path`.
    pub(crate) fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Get the path associated with this error (if any).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::MergeTargetExists(p)
            | Self::MergeConflict(p)
            | Self::Trash { path: p, .. }
            | Self::Io { path: p, .. } => Some(p),
            Self::InvalidMergeSpec { .. } | Self::Template(_) | Self::Output(_) => None,
        }
    }
}

/// A consumer of finished groups.
pub trait GroupAction {
    /// Handle one group.
    ///
    /// # Errors
    ///
    /// Errors that should stop the run. Per-file failures are counted in
    /// [`GroupAction::failures`] instead.
    fn apply(&mut self, group: &Group) -> Result<(), ActionError>;

    /// Called once after the last group.
    ///
    /// # Errors
    ///
    /// Output errors from printers that buffer until the end.
    fn finish(&mut self, _summary: &RunSummary) -> Result<(), ActionError> {
        Ok(())
    }

    /// Per-file failures so far.
    fn failures(&self) -> usize {
        0
    }
}

/// Outcome of acting on one file, for logging and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileOutcome {
    Done,
    Skipped,
    Failed,
}

/// Log a per-file result and classify it.
pub(crate) fn record(verb: &str, path: &Path, result: Result<bool, ActionError>) -> FileOutcome {
    match result {
        Ok(true) => FileOutcome::Done,
        Ok(false) => {
            log::debug!("Nothing to do for {}", path.display());
            FileOutcome::Skipped
        }
        Err(ActionError::NotFound(p)) => {
            log::warn!("Not found, skipping: {}", p.display());
            FileOutcome::Skipped
        }
        Err(e) => {
            log::error!("Failed to {} {}: {}", verb, path.display(), e);
            FileOutcome::Failed
        }
    }
}
