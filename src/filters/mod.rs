//! Signature filters.
//!
//! A [`Filter`] is a resolved `path -> signature` function. Filters are
//! described on the command line or in the config file as a [`FilterSpec`],
//! a closed set of variants that is resolved once, before any path is
//! processed. The grouping engine only ever sees resolved filters.
//!
//! # Example
//!
//! ```
//! use dupgroup::filters::{FilterSpec, Property};
//!
//! let spec = FilterSpec::parse("size:MB").unwrap();
//! assert!(matches!(
//!     spec,
//!     FilterSpec::BuiltinProperty { property: Property::Size, .. }
//! ));
//!
//! let spec = FilterSpec::parse("du {} | cut -f1").unwrap();
//! assert!(matches!(spec, FilterSpec::ShellTemplate(_)));
//!
//! assert!(FilterSpec::parse("sizee").is_err());
//! ```

pub mod property;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;

use crate::template::{self, BraceTemplate, TemplateError};

pub use property::{Property, ShaVariant, SizeUnit, TimeRounding};

/// Errors produced while computing a signature.
#[derive(thiserror::Error, Debug)]
pub enum FilterError {
    /// The file disappeared before its signature was computed.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Any other I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The shell could not be started.
    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The command exited unsuccessfully.
    #[error("command '{command}' returned {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    /// The command template could not be expanded.
    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl FilterError {
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
}

/// Errors produced while resolving a [`FilterSpec`].
#[derive(thiserror::Error, Debug)]
pub enum FilterSpecError {
    /// Not a built-in name and not a shell template.
    #[error("'{spec}' is not a valid filter{}", suggestion_hint(.suggestion))]
    UnknownFilter {
        spec: String,
        suggestion: Option<String>,
    },

    /// The modifier after `name:` is not accepted by that filter.
    #[error("modifier '{modifier}' is not valid for '{filter}' (valid: {valid})")]
    InvalidModifier {
        filter: &'static str,
        modifier: String,
        valid: String,
    },

    /// The filter does not take a modifier.
    #[error("filter '{0}' does not take a modifier")]
    UnexpectedModifier(&'static str),

    /// A regex failed to compile.
    #[error("regex \"{pattern}\" is invalid: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A shell template failed to parse.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// A shell filter referenced other filters' signatures.
    #[error("shell filter '{0}' cannot reference filter signatures ({{fN}})")]
    SignatureInFilter(String),
}

fn suggestion_hint(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean '{s}'?)"))
        .unwrap_or_default()
}

/// Signature function type.
pub type FilterFn = dyn Fn(&Path) -> Result<String, FilterError> + Send + Sync;

/// A resolved signature filter: a name plus a `path -> signature` function.
#[derive(Clone)]
pub struct Filter {
    name: String,
    func: Arc<FilterFn>,
}

impl Filter {
    /// Wrap a function as a named filter.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Path) -> Result<String, FilterError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Name used in logs and error messages.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compute the signature of `path`.
    ///
    /// # Errors
    ///
    /// Whatever the underlying function reports.
    pub fn apply(&self, path: &Path) -> Result<String, FilterError> {
        (self.func)(path)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").field("name", &self.name).finish()
    }
}

/// How a filter was described before resolution.
#[derive(Clone)]
pub enum FilterSpec {
    /// A built-in file property, optionally with a `:modifier`.
    BuiltinProperty {
        property: Property,
        modifier: Option<String>,
    },
    /// A regex matched against the full path.
    Regex(String),
    /// A shell command template; its trimmed stdout is the signature.
    ShellTemplate(String),
    /// A caller-supplied filter.
    Custom(Filter),
}

impl fmt::Debug for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuiltinProperty { property, modifier } => f
                .debug_struct("BuiltinProperty")
                .field("property", property)
                .field("modifier", modifier)
                .finish(),
            Self::Regex(p) => f.debug_tuple("Regex").field(p).finish(),
            Self::ShellTemplate(t) => f.debug_tuple("ShellTemplate").field(t).finish(),
            Self::Custom(filter) => f.debug_tuple("Custom").field(&filter.name).finish(),
        }
    }
}

impl FilterSpec {
    /// Parse a `--filter` argument.
    ///
    /// `name[:modifier]` selects a built-in property; any other text
    /// containing a path placeholder (`{}`, `{/}`, ...) is a shell template.
    ///
    /// # Errors
    ///
    /// [`FilterSpecError::UnknownFilter`] with the closest built-in name.
    pub fn parse(text: &str) -> Result<Self, FilterSpecError> {
        let (head, modifier) = match text.split_once(':') {
            Some((head, modifier)) => (head, Some(modifier)),
            None => (text, None),
        };

        if let Some(property) = Property::from_name(head) {
            return Ok(Self::BuiltinProperty {
                property,
                modifier: modifier.map(str::to_string),
            });
        }
        if template::contains_placeholder(text) {
            return Ok(Self::ShellTemplate(text.to_string()));
        }

        Err(FilterSpecError::UnknownFilter {
            spec: text.to_string(),
            suggestion: Property::suggest(head).map(str::to_string),
        })
    }

    /// Resolve into a [`Filter`], validating modifiers, regexes and templates.
    ///
    /// # Errors
    ///
    /// Any [`FilterSpecError`] describing the invalid part.
    pub fn resolve(self) -> Result<Filter, FilterSpecError> {
        match self {
            Self::BuiltinProperty { property, modifier } => {
                property::resolve(property, modifier.as_deref())
            }
            Self::Regex(pattern) => {
                let regex =
                    Regex::new(&pattern).map_err(|source| FilterSpecError::InvalidRegex {
                        pattern: pattern.clone(),
                        source,
                    })?;
                Ok(Filter::new(format!("regex:{pattern}"), move |path| {
                    Ok(property::regex_signature(&regex, &path.to_string_lossy()))
                }))
            }
            Self::ShellTemplate(text) => {
                let template = BraceTemplate::parse(&text)?;
                if template.max_signature_ref() > 0 {
                    return Err(FilterSpecError::SignatureInFilter(text));
                }
                Ok(Filter::new(format!("shell:{text}"), move |path| {
                    let command = template.render(path, &[], true)?;
                    let output = template::run_shell(&command)?;
                    Ok(output.trim().to_string())
                }))
            }
            Self::Custom(filter) => Ok(filter),
        }
    }
}

/// Parse and resolve a list of filter specs, in order.
///
/// # Errors
///
/// The first spec that fails to parse or resolve.
pub fn resolve_all<S: AsRef<str>>(specs: &[S]) -> Result<Vec<Filter>, FilterSpecError> {
    specs
        .iter()
        .map(|s| FilterSpec::parse(s.as_ref()).and_then(FilterSpec::resolve))
        .collect()
}
