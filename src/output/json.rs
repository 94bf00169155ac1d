//! JSON output for finished groups.
//!
//! Groups are collected while the engine runs and written as a single
//! document when the run finishes.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "groups": [
//!     {
//!       "signatures": ["1024", "5eb63bbbe01eeed093cb22bb8f5acdc3"],
//!       "labels": { "f1": "1024", "f2": "5eb63bbbe01eeed093cb22bb8f5acdc3" },
//!       "files": ["/path/to/file1.txt", "/path/to/file2.txt"]
//!     }
//!   ],
//!   "summary": {
//!     "groups": 1,
//!     "files_in_groups": 2,
//!     "duplicates": 1,
//!     "walk_errors": 0,
//!     "action_failures": 0,
//!     "stats": { "paths_seen": 10, "admitted": 9, ... },
//!     "elapsed_ms": 12
//!   }
//! }
//! ```

use std::io::Write;

use serde::{Serialize, Serializer};

use super::RunSummary;
use crate::actions::{ActionError, GroupAction};
use crate::grouping::Group;

/// A single group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonGroup {
    /// Signature trail, first filter first
    pub signatures: Vec<String>,
    /// The same trail keyed `f1`, `f2`, ... in filter order
    #[serde(serialize_with = "serialize_labels")]
    pub labels: Vec<(String, String)>,
    /// Members, representative first
    pub files: Vec<String>,
}

impl JsonGroup {
    /// Convert a group.
    #[must_use]
    pub fn from_group(group: &Group) -> Self {
        Self {
            signatures: group.trail.clone(),
            labels: group.labeled_signatures(),
            files: group
                .members
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        }
    }
}

fn serialize_labels<S: Serializer>(
    labels: &[(String, String)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(labels.iter().map(|(label, sig)| (label, sig)))
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    groups: &'a [JsonGroup],
    summary: &'a RunSummary,
}

/// Collects groups and writes them as JSON on `finish`.
pub struct JsonOutput<W: Write> {
    out: W,
    pretty: bool,
    groups: Vec<JsonGroup>,
}

impl<W: Write> JsonOutput<W> {
    /// Compact JSON written to `out`.
    #[must_use]
    pub fn new(out: W) -> Self {
        Self {
            out,
            pretty: false,
            groups: Vec::new(),
        }
    }

    /// Pretty-print the document.
    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Groups collected so far.
    #[must_use]
    pub fn groups(&self) -> &[JsonGroup] {
        &self.groups
    }

    /// Consume the printer, returning its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Serialize the collected groups with `summary`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json(&self, summary: &RunSummary) -> Result<String, serde_json::Error> {
        let document = JsonDocument {
            groups: &self.groups,
            summary,
        };
        if self.pretty {
            serde_json::to_string_pretty(&document)
        } else {
            serde_json::to_string(&document)
        }
    }
}

impl<W: Write> GroupAction for JsonOutput<W> {
    fn apply(&mut self, group: &Group) -> Result<(), ActionError> {
        self.groups.push(JsonGroup::from_group(group));
        Ok(())
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<(), ActionError> {
        let json = self
            .to_json(summary)
            .map_err(|e| ActionError::Output(e.into()))?;
        self.out
            .write_all(json.as_bytes())
            .and_then(|()| self.out.write_all(b"\n"))
            .and_then(|()| self.out.flush())
            .map_err(ActionError::Output)
    }
}
