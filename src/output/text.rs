//! Human-readable group listing.
//!
//! Each group is printed as soon as the engine yields it:
//!
//! ```text
//! 1024 -> 5eb63bbbe01eeed093cb22bb8f5acdc3
//! /photos/a.jpg
//!     /backup/a.jpg
//!     /backup/old/a.jpg
//!
//! ```
//!
//! With basic formatting only the member paths are printed, one per line,
//! with a blank line between groups.

use std::io::Write;

use yansi::{Paint, Style};

use super::RunSummary;
use crate::actions::{ActionError, GroupAction};
use crate::grouping::Group;

const SIGNATURE_STYLE: Style = Style::new().cyan().bold();
const SOURCE_STYLE: Style = Style::new().green();
const SUMMARY_STYLE: Style = Style::new().bold();

/// Streams groups as text.
pub struct TextOutput<W: Write> {
    out: W,
    basic: bool,
    color: bool,
    summary: bool,
}

impl<W: Write> TextOutput<W> {
    /// Plain text without colours or a trailing summary.
    #[must_use]
    pub fn new(out: W) -> Self {
        Self {
            out,
            basic: false,
            color: false,
            summary: false,
        }
    }

    /// Print only member paths.
    #[must_use]
    pub fn with_basic(mut self, basic: bool) -> Self {
        self.basic = basic;
        self
    }

    /// Colour signatures and representatives.
    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Print the run summary after the last group.
    #[must_use]
    pub fn with_summary(mut self, summary: bool) -> Self {
        self.summary = summary;
        self
    }

    /// Consume the printer, returning its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn styled(&self, text: &str, style: Style) -> String {
        if self.color {
            text.paint(style).to_string()
        } else {
            text.to_string()
        }
    }

    fn write_group(&mut self, group: &Group) -> std::io::Result<()> {
        if self.basic {
            for member in &group.members {
                writeln!(self.out, "{}", member.display())?;
            }
            return writeln!(self.out);
        }

        let signatures = self.styled(&group.trail.join(" -> "), SIGNATURE_STYLE);
        writeln!(self.out, "{}", signatures)?;
        if let Some(source) = group.representative() {
            let source = self.styled(&source.display().to_string(), SOURCE_STYLE);
            writeln!(self.out, "{}", source)?;
        }
        for duplicate in group.duplicates() {
            writeln!(self.out, "    {}", duplicate.display())?;
        }
        writeln!(self.out)
    }
}

impl<W: Write> GroupAction for TextOutput<W> {
    fn apply(&mut self, group: &Group) -> Result<(), ActionError> {
        self.write_group(group).map_err(ActionError::Output)
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<(), ActionError> {
        if self.summary && !self.basic {
            let line = self.styled(&summary.to_string(), SUMMARY_STYLE);
            writeln!(self.out, "{}", line).map_err(ActionError::Output)?;
        }
        self.out.flush().map_err(ActionError::Output)
    }
}
