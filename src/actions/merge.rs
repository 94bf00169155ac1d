//! Copy groups into a directory tree keyed by their signatures.
//!
//! `--merge DIR[:POLICY[:CONDITION]]` copies every member of a group into
//! `DIR/<f1>/<f2>/...`. When two members share a file name the policy
//! decides what happens:
//!
//! | Policy      | On conflict                                          |
//! |-------------|------------------------------------------------------|
//! | `COUNT`     | copy as `name_0001.ext`, `name_0002.ext`, ... (default) |
//! | `IGNORE`    | keep the existing file                               |
//! | `ERROR`     | stop with an error                                   |
//! | `CONDITION` | overwrite when the incoming file is `LARGER`, `SMALLER`, `NEWER` or `OLDER` |

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::{record, ActionError, FileOutcome, GroupAction};
use crate::grouping::Group;
use crate::output::RunSummary;

/// Longest signature used verbatim as a directory name.
const MAX_COMPONENT_LEN: usize = 200;

/// Comparison used by [`MergePolicy::Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeCondition {
    Larger,
    Smaller,
    Newer,
    Older,
}

impl MergeCondition {
    fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_uppercase().as_str() {
            "LARGER" => Some(Self::Larger),
            "SMALLER" => Some(Self::Smaller),
            "NEWER" => Some(Self::Newer),
            "OLDER" => Some(Self::Older),
            _ => None,
        }
    }

    /// Check whether `incoming` should replace `existing`.
    ///
    /// # Errors
    ///
    /// Metadata errors for either file.
    pub fn holds(self, incoming: &Path, existing: &Path) -> Result<bool, ActionError> {
        let a = fs::metadata(incoming).map_err(|e| ActionError::from_io(incoming, e))?;
        let b = fs::metadata(existing).map_err(|e| ActionError::from_io(existing, e))?;
        let result = match self {
            Self::Larger => a.len() > b.len(),
            Self::Smaller => a.len() < b.len(),
            Self::Newer | Self::Older => {
                let ta = a.modified().map_err(|e| ActionError::from_io(incoming, e))?;
                let tb = b.modified().map_err(|e| ActionError::from_io(existing, e))?;
                if self == Self::Newer {
                    ta > tb
                } else {
                    ta < tb
                }
            }
        };
        Ok(result)
    }
}

/// Name-conflict policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    #[default]
    Count,
    Ignore,
    Error,
    Condition(MergeCondition),
}

/// Parsed `--merge` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSpec {
    pub dir: PathBuf,
    pub policy: MergePolicy,
}

impl MergeSpec {
    /// Parse `DIR[:POLICY[:CONDITION]]`.
    ///
    /// Policy keywords are recognised from the end, so a directory may
    /// itself contain `:`.
    ///
    /// # Errors
    ///
    /// [`ActionError::InvalidMergeSpec`] for an empty directory or a
    /// `CONDITION` policy without a valid condition.
    pub fn parse(spec: &str) -> Result<Self, ActionError> {
        let invalid = |reason: &str| ActionError::InvalidMergeSpec {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = spec.split(':').collect();
        let (dir_parts, policy) = match parts.as_slice() {
            [dir @ .., policy, condition]
                if !dir.is_empty() && policy.eq_ignore_ascii_case("CONDITION") =>
            {
                let condition = MergeCondition::parse(condition)
                    .ok_or_else(|| invalid("condition must be LARGER, SMALLER, NEWER or OLDER"))?;
                (dir, MergePolicy::Condition(condition))
            }
            [dir @ .., policy] if !dir.is_empty() => {
                match policy.to_ascii_uppercase().as_str() {
                    "COUNT" => (dir, MergePolicy::Count),
                    "IGNORE" => (dir, MergePolicy::Ignore),
                    "ERROR" => (dir, MergePolicy::Error),
                    "CONDITION" => return Err(invalid("CONDITION needs a condition")),
                    _ => (parts.as_slice(), MergePolicy::Count),
                }
            }
            _ => (parts.as_slice(), MergePolicy::Count),
        };

        let dir = dir_parts.join(":");
        if dir.is_empty() {
            return Err(invalid("missing directory"));
        }
        Ok(Self {
            dir: PathBuf::from(dir),
            policy,
        })
    }
}

impl FromStr for MergeSpec {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MergeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir.display())?;
        match self.policy {
            MergePolicy::Count => write!(f, ":COUNT"),
            MergePolicy::Ignore => write!(f, ":IGNORE"),
            MergePolicy::Error => write!(f, ":ERROR"),
            MergePolicy::Condition(c) => {
                write!(f, ":CONDITION:{}", format!("{c:?}").to_ascii_uppercase())
            }
        }
    }
}

/// Copy each group into `DIR/<f1>/<f2>/...`.
#[derive(Debug)]
pub struct MergeAction {
    spec: MergeSpec,
    copied: usize,
    skipped: usize,
    failed: usize,
}

impl MergeAction {
    /// Create the merge directory.
    ///
    /// # Errors
    ///
    /// [`ActionError::MergeTargetExists`] if the directory already exists,
    /// or the I/O error from creating it.
    pub fn new(spec: MergeSpec) -> Result<Self, ActionError> {
        if spec.dir.exists() {
            return Err(ActionError::MergeTargetExists(spec.dir));
        }
        fs::create_dir_all(&spec.dir).map_err(|e| ActionError::from_io(&spec.dir, e))?;
        log::debug!("Created merge directory {}", spec.dir.display());
        Ok(Self {
            spec,
            copied: 0,
            skipped: 0,
            failed: 0,
        })
    }

    /// Number of files copied.
    #[must_use]
    pub fn copied(&self) -> usize {
        self.copied
    }

    /// Directory for a group's trail.
    #[must_use]
    pub fn group_dir(&self, group: &Group) -> PathBuf {
        group
            .trail
            .iter()
            .fold(self.spec.dir.clone(), |dir, sig| dir.join(path_component(sig)))
    }

    /// Copy one member into `dir`, applying the conflict policy.
    fn merge_file(&self, file: &Path, dir: &Path) -> Result<bool, ActionError> {
        let Some(name) = file.file_name() else {
            return Ok(false);
        };
        let dest = dir.join(name);

        if !dest.exists() {
            copy(file, &dest)?;
            return Ok(true);
        }

        match self.spec.policy {
            MergePolicy::Count => {
                let dest = numbered_destination(dir, file);
                copy(file, &dest)?;
                Ok(true)
            }
            MergePolicy::Ignore => {
                log::info!("{} exists, ignoring {}", dest.display(), file.display());
                Ok(false)
            }
            MergePolicy::Error => Err(ActionError::MergeConflict(dest)),
            MergePolicy::Condition(condition) => {
                if condition.holds(file, &dest)? {
                    log::info!("{} overwriting {}", file.display(), dest.display());
                    copy(file, &dest)?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }
}

impl GroupAction for MergeAction {
    fn apply(&mut self, group: &Group) -> Result<(), ActionError> {
        let dir = self.group_dir(group);
        fs::create_dir_all(&dir).map_err(|e| ActionError::from_io(&dir, e))?;

        for member in &group.members {
            match self.merge_file(member, &dir) {
                Err(e @ ActionError::MergeConflict(_)) => return Err(e),
                result => match record("merge", member, result) {
                    FileOutcome::Done => self.copied += 1,
                    FileOutcome::Skipped => self.skipped += 1,
                    FileOutcome::Failed => self.failed += 1,
                },
            }
        }
        Ok(())
    }

    fn finish(&mut self, _summary: &RunSummary) -> Result<(), ActionError> {
        log::info!(
            "Merged {} file(s) into {}, {} skipped, {} failed",
            self.copied,
            self.spec.dir.display(),
            self.skipped,
            self.failed
        );
        Ok(())
    }

    fn failures(&self) -> usize {
        self.failed
    }
}

fn copy(from: &Path, to: &Path) -> Result<(), ActionError> {
    log::debug!("Copying {} -> {}", from.display(), to.display());
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| ActionError::from_io(from, e))
}

/// First free `stem_NNNN.ext` in `dir`.
fn numbered_destination(dir: &Path, file: &Path) -> PathBuf {
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = file
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1u64..)
        .map(|n| dir.join(format!("{stem}_{n:04}{ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| dir.join(format!("{stem}_overflow{ext}")))
}

/// Make a signature usable as one directory name.
fn path_component(signature: &str) -> String {
    if signature.len() > MAX_COMPONENT_LEN {
        return blake3::hash(signature.as_bytes()).to_hex().to_string();
    }
    let cleaned: String = signature
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
