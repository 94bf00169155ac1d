//! Replace duplicates with hard links to the group representative.
//!
//! Each duplicate is swapped atomically: a hard link to the representative
//! is created next to it under a temporary name and then renamed over it,
//! so a failure never leaves the duplicate missing.

use std::fs;
use std::path::{Path, PathBuf};

use super::{record, ActionError, FileOutcome, GroupAction};
use crate::grouping::Group;
use crate::output::RunSummary;

/// Hard-link every duplicate to its group's representative.
#[derive(Debug, Default)]
pub struct LinkAction {
    dry_run: bool,
    linked: usize,
    skipped: usize,
    failed: usize,
}

impl LinkAction {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only log what would be linked.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Number of files replaced by links.
    #[must_use]
    pub fn linked(&self) -> usize {
        self.linked
    }
}

impl GroupAction for LinkAction {
    fn apply(&mut self, group: &Group) -> Result<(), ActionError> {
        let Some(source) = group.representative() else {
            return Ok(());
        };

        for duplicate in group.duplicates() {
            if self.dry_run {
                log::info!(
                    "[dry run] Would link {} -> {}",
                    source.display(),
                    duplicate.display()
                );
                self.linked += 1;
                continue;
            }

            log::info!("Linking {} -> {}", source.display(), duplicate.display());
            match record("link", duplicate, link_file(source, duplicate)) {
                FileOutcome::Done => self.linked += 1,
                FileOutcome::Skipped => self.skipped += 1,
                FileOutcome::Failed => self.failed += 1,
            }
        }
        Ok(())
    }

    fn finish(&mut self, _summary: &RunSummary) -> Result<(), ActionError> {
        log::info!(
            "Linked {} file(s), {} skipped, {} failed",
            self.linked,
            self.skipped,
            self.failed
        );
        Ok(())
    }

    fn failures(&self) -> usize {
        self.failed
    }
}

/// Replace `duplicate` with a hard link to `source`.
///
/// Returns `Ok(false)` when both already refer to the same file.
///
/// # Errors
///
/// [`ActionError::NotFound`] if either file is missing, otherwise the
/// I/O error from linking or renaming.
pub fn link_file(source: &Path, duplicate: &Path) -> Result<bool, ActionError> {
    let source_meta = fs::metadata(source).map_err(|e| ActionError::from_io(source, e))?;
    let duplicate_meta =
        fs::symlink_metadata(duplicate).map_err(|e| ActionError::from_io(duplicate, e))?;

    if same_file(&source_meta, &duplicate_meta) {
        return Ok(false);
    }

    let temp = temp_link_path(duplicate);
    fs::hard_link(source, &temp).map_err(|e| ActionError::from_io(&temp, e))?;
    if let Err(e) = fs::rename(&temp, duplicate) {
        let _ = fs::remove_file(&temp);
        return Err(ActionError::from_io(duplicate, e));
    }
    Ok(true)
}

fn temp_link_path(duplicate: &Path) -> PathBuf {
    let name = duplicate
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    duplicate.with_file_name(format!(".{name}.dupgroup-link"))
}

#[cfg(unix)]
fn same_file(a: &fs::Metadata, b: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_file(_a: &fs::Metadata, _b: &fs::Metadata) -> bool {
    false
}
