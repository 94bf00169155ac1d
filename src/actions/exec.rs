//! Run a command template for every member of every group.
//!
//! The template is expanded per member with the path placeholders and
//! `{f1}`..`{fN}` bound to the group's signatures. Command output is
//! written to the action's writer; a failing command is logged and the
//! remaining members still run.

use std::io::Write;

use super::{ActionError, GroupAction};
use crate::grouping::Group;
use crate::output::RunSummary;
use crate::template::{self, BraceTemplate, TemplateError};

/// Execute a shell template per group member.
pub struct ExecAction<W: Write> {
    template: BraceTemplate,
    out: W,
    runs: usize,
    failed: usize,
}

impl<W: Write> ExecAction<W> {
    /// Parse `template` and check its `{fN}` references against a chain of
    /// `filter_count` filters.
    ///
    /// # Errors
    ///
    /// [`ActionError::Template`] for a malformed template or one that
    /// references a filter past the end of the chain.
    pub fn new(template: &str, filter_count: usize, out: W) -> Result<Self, ActionError> {
        let template = BraceTemplate::parse(template)?;
        let highest = template.max_signature_ref();
        if highest > filter_count {
            return Err(TemplateError::MissingSignature(highest).into());
        }
        Ok(Self {
            template,
            out,
            runs: 0,
            failed: 0,
        })
    }

    /// Number of commands run successfully.
    #[must_use]
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Consume the action, returning its writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> GroupAction for ExecAction<W> {
    fn apply(&mut self, group: &Group) -> Result<(), ActionError> {
        for member in &group.members {
            let command = self.template.render(member, &group.trail, true)?;
            match template::run_shell(&command) {
                Ok(output) => {
                    self.runs += 1;
                    self.out
                        .write_all(output.as_bytes())
                        .map_err(ActionError::Output)?;
                }
                Err(e) => {
                    log::error!("{}", e);
                    self.failed += 1;
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self, _summary: &RunSummary) -> Result<(), ActionError> {
        self.out.flush().map_err(ActionError::Output)?;
        log::debug!("Ran {} command(s), {} failed", self.runs, self.failed);
        Ok(())
    }

    fn failures(&self) -> usize {
        self.failed
    }
}
