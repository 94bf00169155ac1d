//! CSV output for finished groups.
//!
//! One row is generated for each group member.
//!
//! # Columns
//!
//! - `group`: 1-based group number, in emission order
//! - `position`: 0 for the representative, then 1, 2, ... for duplicates
//! - `path`: member path
//! - `signatures`: the group's signature trail joined by ` -> `

use std::io::Write;

use serde::Serialize;

use super::RunSummary;
use crate::actions::{ActionError, GroupAction};
use crate::grouping::Group;

/// A single row in the CSV output.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    group: usize,
    position: usize,
    path: &'a str,
    signatures: &'a str,
}

/// Streams group members as CSV rows.
pub struct CsvOutput<W: Write> {
    writer: csv::Writer<W>,
    groups: usize,
}

impl<W: Write> CsvOutput<W> {
    /// Write rows (with a header) to `out`.
    #[must_use]
    pub fn new(out: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(out),
            groups: 0,
        }
    }

    /// Flush and return the underlying writer.
    ///
    /// # Errors
    ///
    /// [`ActionError::Output`] if the final flush fails.
    pub fn into_inner(self) -> Result<W, ActionError> {
        self.writer
            .into_inner()
            .map_err(|e| ActionError::Output(e.into_error()))
    }
}

fn csv_error(error: csv::Error) -> ActionError {
    ActionError::Output(error.into())
}

impl<W: Write> GroupAction for CsvOutput<W> {
    fn apply(&mut self, group: &Group) -> Result<(), ActionError> {
        self.groups += 1;
        let signatures = group.trail.join(" -> ");
        for (position, member) in group.members.iter().enumerate() {
            let path = member.to_string_lossy();
            self.writer
                .serialize(CsvRow {
                    group: self.groups,
                    position,
                    path: &path,
                    signatures: &signatures,
                })
                .map_err(csv_error)?;
        }
        Ok(())
    }

    fn finish(&mut self, _summary: &RunSummary) -> Result<(), ActionError> {
        self.writer.flush().map_err(ActionError::Output)
    }
}
