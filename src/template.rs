//! Brace templates for shell filters and group commands.
//!
//! Templates use parallel-style placeholders:
//!
//! | Token   | Expands to                          |
//! |---------|-------------------------------------|
//! | `{}`    | the path                            |
//! | `{.}`   | the path without its extension      |
//! | `{/}`   | the basename                        |
//! | `{//}`  | the parent directory                |
//! | `{/.}`  | the basename without its extension  |
//! | `{..}`  | the extension (with its dot)        |
//! | `{fN}`  | the signature of filter N (1-based) |
//!
//! `{{` and `}}` produce literal braces. Every expansion is shell-quoted
//! when the template is rendered for execution.
//!
//! # Example
//!
//! ```
//! use dupgroup::template::BraceTemplate;
//! use std::path::Path;
//!
//! let template = BraceTemplate::parse("du -b {} # {/.}").unwrap();
//! let command = template.render(Path::new("/data/a b.txt"), &[], true).unwrap();
//! assert_eq!(command, "du -b '/data/a b.txt' # 'a b'");
//! ```

use std::path::Path;
use std::process::Command;

use crate::filters::FilterError;

/// Placeholders that mark a string as a shell template.
pub const PATH_PLACEHOLDERS: [&str; 6] = ["{}", "{.}", "{/}", "{//}", "{/.}", "{..}"];

/// Errors from parsing or rendering a template.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A `{` without a closing `}`.
    #[error("unclosed '{{' in template: {0}")]
    UnclosedBrace(String),

    /// A `}` that is neither doubled nor closing a placeholder.
    #[error("unmatched '}}' in template: {0}")]
    UnmatchedBrace(String),

    /// A placeholder name that is not recognised.
    #[error("unknown placeholder '{{{name}}}' in template: {template}")]
    UnknownPlaceholder { name: String, template: String },

    /// `{fN}` referenced a filter that produced no signature.
    #[error("filter f{0} not found")]
    MissingSignature(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Path,
    WithoutExtension,
    Basename,
    Parent,
    BasenameWithoutExtension,
    Extension,
    Signature(usize),
}

/// A parsed brace template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BraceTemplate {
    source: String,
    tokens: Vec<Token>,
}

impl BraceTemplate {
    /// Parse a template string.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] for unbalanced braces or unknown
    /// placeholders.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(TemplateError::UnmatchedBrace(source.to_string())),
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => return Err(TemplateError::UnclosedBrace(source.to_string())),
                        }
                    }
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(placeholder(&name, source)?);
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            tokens,
        })
    }

    /// The template text as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Highest `N` referenced by a `{fN}` placeholder (0 if none).
    #[must_use]
    pub fn max_signature_ref(&self) -> usize {
        self.tokens
            .iter()
            .filter_map(|t| match t {
                Token::Signature(n) => Some(*n),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Expand the template for `path`.
    ///
    /// `signatures[0]` fills `{f1}`. With `quote`, every expansion is
    /// wrapped with [`shell_quote`].
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingSignature`] when `{fN}` has no value.
    pub fn render(
        &self,
        path: &Path,
        signatures: &[String],
        quote: bool,
    ) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len() + 64);
        for token in &self.tokens {
            let value = match token {
                Token::Literal(text) => {
                    out.push_str(text);
                    continue;
                }
                Token::Path => path.to_string_lossy().into_owned(),
                Token::WithoutExtension => path.with_extension("").to_string_lossy().into_owned(),
                Token::Basename => lossy(path.file_name()),
                Token::Parent => path
                    .parent()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                Token::BasenameWithoutExtension => lossy(path.file_stem()),
                Token::Extension => path
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_default(),
                Token::Signature(n) => signatures
                    .get(n - 1)
                    .cloned()
                    .ok_or(TemplateError::MissingSignature(*n))?,
            };
            if quote {
                out.push_str(&shell_quote(&value));
            } else {
                out.push_str(&value);
            }
        }
        Ok(out)
    }
}

fn lossy(part: Option<&std::ffi::OsStr>) -> String {
    part.map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn placeholder(name: &str, template: &str) -> Result<Token, TemplateError> {
    let token = match name {
        "" => Token::Path,
        "." => Token::WithoutExtension,
        "/" => Token::Basename,
        "//" => Token::Parent,
        "/." => Token::BasenameWithoutExtension,
        ".." => Token::Extension,
        _ => match name.strip_prefix('f').and_then(|n| n.parse::<usize>().ok()) {
            Some(n) if n > 0 => Token::Signature(n),
            _ => {
                return Err(TemplateError::UnknownPlaceholder {
                    name: name.to_string(),
                    template: template.to_string(),
                })
            }
        },
    };
    Ok(token)
}

/// Check whether `text` contains one of the path placeholders.
#[must_use]
pub fn contains_placeholder(text: &str) -> bool {
    PATH_PLACEHOLDERS.iter().any(|p| text.contains(p))
}

/// Quote a value for a POSIX shell.
///
/// Wraps in single quotes and escapes embedded single quotes as `'\''`.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Run `command` through the platform shell and return its stdout.
///
/// # Errors
///
/// [`FilterError::Spawn`] if the shell cannot be started and
/// [`FilterError::Command`] if the command exits unsuccessfully.
pub fn run_shell(command: &str) -> Result<String, FilterError> {
    log::trace!("Running shell command: {}", command);

    let output = if cfg!(windows) {
        Command::new("cmd").args(["/C", command]).output()
    } else {
        Command::new("sh").args(["-c", command]).output()
    }
    .map_err(|source| FilterError::Spawn {
        command: command.to_string(),
        source,
    })?;

    if !output.status.success() {
        return Err(FilterError::Command {
            command: command.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
