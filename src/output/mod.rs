//! Printers for finished groups.
//!
//! Every printer implements [`GroupAction`](crate::actions::GroupAction):
//! - [`TextOutput`] streams groups to the terminal as they are produced
//! - [`JsonOutput`] collects groups and writes one document at the end
//! - [`CsvOutput`] writes one row per group member
//!
//! # Example
//!
//! ```no_run
//! use dupgroup::actions::GroupAction;
//! use dupgroup::grouping::Group;
//! use dupgroup::output::{RunSummary, TextOutput};
//! use std::path::PathBuf;
//!
//! let group = Group::new(
//!     vec![PathBuf::from("/a.txt"), PathBuf::from("/b.txt")],
//!     vec!["5".to_string()],
//! );
//! let mut output = TextOutput::new(std::io::stdout());
//! output.apply(&group).unwrap();
//! output.finish(&RunSummary::default()).unwrap();
//! ```

pub mod csv;
pub mod json;
pub mod text;

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::grouping::{Group, GroupingStats};

pub use self::csv::CsvOutput;
pub use json::JsonOutput;
pub use text::TextOutput;

/// Totals for one run, handed to every action's `finish`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Groups handed to the action
    pub groups: usize,
    /// Members across those groups
    pub files_in_groups: usize,
    /// Members that are not a group's representative
    pub duplicates: usize,
    /// Traversal errors that were logged and skipped
    pub walk_errors: usize,
    /// Per-file failures reported by the action
    pub action_failures: usize,
    /// Engine counters
    pub stats: GroupingStats,
    /// Wall-clock time of the run in milliseconds
    pub elapsed_ms: u64,
}

impl RunSummary {
    /// Count `group` in the totals.
    pub fn record_group(&mut self, group: &Group) {
        self.groups += 1;
        self.files_in_groups += group.len();
        self.duplicates += group.duplicates().len();
    }

    /// Set the elapsed time.
    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    }

    /// Whether grouping stopped early on shutdown.
    #[must_use]
    pub fn interrupted(&self) -> bool {
        self.stats.interrupted
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} group(s), {} file(s) in groups ({} duplicate(s)); {} path(s) seen, {} admitted, {} failed",
            self.groups,
            self.files_in_groups,
            self.duplicates,
            self.stats.paths_seen,
            self.stats.admitted,
            self.stats.failed + self.walk_errors,
        )?;
        if self.stats.interrupted {
            write!(f, " (interrupted)")?;
        }
        Ok(())
    }
}
