//! Remove duplicates, keeping each group's representative.
//!
//! # Overview
//!
//! Duplicates are moved to the system trash by default (recoverable) or
//! deleted permanently with `--permanent`. The representative is never
//! touched, so at least one copy of every group survives.
//!
//! # Example
//!
//! ```no_run
//! use dupgroup::actions::remove::delete_to_trash;
//! use std::path::Path;
//!
//! match delete_to_trash(Path::new("/path/to/duplicate.txt")) {
//!     Ok(size) => println!("Trashed {} bytes", size),
//!     Err(e) => eprintln!("Failed: {}", e),
//! }
//! ```

use std::fs;
use std::path::Path;

use bytesize::ByteSize;

use super::{record, ActionError, FileOutcome, GroupAction};
use crate::grouping::Group;
use crate::output::RunSummary;

/// Remove every duplicate of every group.
#[derive(Debug, Default)]
pub struct RemoveAction {
    permanent: bool,
    dry_run: bool,
    removed: usize,
    bytes_freed: u64,
    skipped: usize,
    failed: usize,
}

impl RemoveAction {
    /// Trash-based removal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete permanently instead of moving to the trash.
    #[must_use]
    pub fn with_permanent(mut self, permanent: bool) -> Self {
        self.permanent = permanent;
        self
    }

    /// Only log what would be removed.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Number of files removed.
    #[must_use]
    pub fn removed(&self) -> usize {
        self.removed
    }

    /// Bytes freed by removal.
    #[must_use]
    pub fn bytes_freed(&self) -> u64 {
        self.bytes_freed
    }

    fn remove(&self, path: &Path) -> Result<u64, ActionError> {
        if self.permanent {
            permanent_delete(path)
        } else {
            delete_to_trash(path)
        }
    }
}

impl GroupAction for RemoveAction {
    fn apply(&mut self, group: &Group) -> Result<(), ActionError> {
        for duplicate in group.duplicates() {
            if self.dry_run {
                log::info!("[dry run] Would remove {}", duplicate.display());
                self.removed += 1;
                continue;
            }

            log::info!("Removing {}", duplicate.display());
            let mut size = 0;
            let result = self.remove(duplicate).map(|freed| {
                size = freed;
                true
            });
            match record("remove", duplicate, result) {
                FileOutcome::Done => {
                    self.removed += 1;
                    self.bytes_freed += size;
                }
                FileOutcome::Skipped => self.skipped += 1,
                FileOutcome::Failed => self.failed += 1,
            }
        }
        Ok(())
    }

    fn finish(&mut self, _summary: &RunSummary) -> Result<(), ActionError> {
        log::info!(
            "Removed {} file(s), freed {}, {} skipped, {} failed",
            self.removed,
            ByteSize::b(self.bytes_freed),
            self.skipped,
            self.failed
        );
        Ok(())
    }

    fn failures(&self) -> usize {
        self.failed
    }
}

fn file_size(path: &Path) -> Result<u64, ActionError> {
    fs::symlink_metadata(path)
        .map(|m| m.len())
        .map_err(|e| ActionError::from_io(path, e))
}

/// Move a file to the system trash, returning its size.
///
/// # Errors
///
/// [`ActionError::NotFound`] if the file is gone, [`ActionError::Trash`]
/// if the trash rejects it.
pub fn delete_to_trash(path: &Path) -> Result<u64, ActionError> {
    let size = file_size(path)?;
    trash::delete(path).map_err(|e| ActionError::Trash {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    log::debug!("Moved to trash: {}", path.display());
    Ok(size)
}

/// Delete a file permanently, returning its size.
///
/// # Errors
///
/// [`ActionError::NotFound`] if the file is gone, or the I/O error.
pub fn permanent_delete(path: &Path) -> Result<u64, ActionError> {
    let size = file_size(path)?;
    fs::remove_file(path).map_err(|e| ActionError::from_io(path, e))?;
    log::debug!("Permanently deleted: {}", path.display());
    Ok(size)
}
