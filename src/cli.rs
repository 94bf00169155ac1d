//! Command-line interface definitions for dupgroup.
//!
//! Arguments are declared with the clap derive API. Two things depend on
//! the order in which flags were typed, which the derived struct cannot
//! see, so [`Cli::parse_ordered`] reads them back from the raw
//! `ArgMatches` indices:
//!
//! - the filter chain, interleaved from `--filter`, `--regex` and `--shell`
//! - the group action, where the last of `--link`, `--remove`, `--merge`
//!   and `--exec-group` wins
//!
//! # Example
//!
//! ```bash
//! # Group by size, then by MD5 (the default chain)
//! dupgroup ~/Downloads
//!
//! # Same size and same first line, hard-link the copies
//! dupgroup -r -f size -s "head -n1 {}" --link ~/notes
//!
//! # Sort photos into a tree by day taken, then content
//! dupgroup -r -f modified:day -f blake3 --merge ~/sorted ~/Pictures
//! ```

use std::ffi::OsString;
use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, ValueEnum};

use crate::actions::MergeSpec;
use crate::filters::{FilterSpec, FilterSpecError};

/// Group files by an ordered chain of filters.
///
/// Files are split by the first filter, then every group is refined by the
/// next one, so cheap filters should come first. By default the groups are
/// printed; `--link`, `--remove`, `--merge` or `--exec-group` act on them
/// instead.
#[derive(Debug, Parser)]
#[command(name = "dupgroup")]
#[command(author, version, about, long_about = None)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Directories to search (default: current directory)
    #[arg(value_name = "DIRECTORY")]
    pub directories: Vec<PathBuf>,

    /// Add a filter: size[:UNIT], modified[:ROUNDING], accessed[:ROUNDING],
    /// filename[:REGEX], md5, partial_md5, sha[:BITS], blake3, file,
    /// or a shell template containing {}
    #[arg(short = 'f', long = "filter", value_name = "SPEC")]
    pub filters: Vec<String>,

    /// Add a filter keyed by the regex match (or capture groups) on the path
    #[arg(long = "regex", value_name = "PATTERN")]
    pub regexes: Vec<String>,

    /// Add a filter keyed by a shell command's output, e.g. "du {} | cut -f1"
    #[arg(short = 's', long = "shell", value_name = "TEMPLATE")]
    pub shells: Vec<String>,

    /// Replace duplicates with hard links to the first file of each group
    #[arg(long)]
    pub link: bool,

    /// Remove duplicates, keeping the first file of each group
    #[arg(long)]
    pub remove: bool,

    /// Copy groups into DIR/<f1>/<f2>/..., resolving name clashes by
    /// POLICY (COUNT, IGNORE, ERROR or CONDITION:LARGER|SMALLER|NEWER|OLDER)
    #[arg(long, value_name = "DIR[:POLICY[:CONDITION]]", value_parser = parse_merge)]
    pub merge: Option<MergeSpec>,

    /// Run a command for every member of every group; {f1}..{fN} expand to
    /// the group's signatures
    #[arg(short = 'x', long = "exec-group", value_name = "TEMPLATE")]
    pub exec_group: Option<String>,

    /// Only consider file names matching this glob (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub include: Vec<String>,

    /// Skip file names matching this glob (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Only consider files whose directory contains this text (repeatable, all must match)
    #[arg(long, value_name = "TEXT")]
    pub dir_include: Vec<String>,

    /// Skip files whose directory contains this text (repeatable)
    #[arg(long, value_name = "TEXT")]
    pub dir_exclude: Vec<String>,

    /// Walk hidden files and directories
    #[arg(long)]
    pub follow_hidden: bool,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Maximum depth when recursing
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Minimum number of files in a reported group
    #[arg(short = 't', long, value_name = "N")]
    pub threshold: Option<usize>,

    /// Print only file paths, one group per paragraph
    #[arg(long)]
    pub basic_formatting: bool,

    /// Output format for printed groups
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Include empty files
    #[arg(long)]
    pub empty_file: bool,

    /// Follow symbolic links
    #[arg(long)]
    pub follow_symbolic: bool,

    /// Print the groups, then ask whether to link or remove duplicates
    #[arg(long)]
    pub interactive: bool,

    /// Delete permanently instead of moving to the trash
    #[arg(long)]
    pub permanent: bool,

    /// Log what --link or --remove would do without touching files
    #[arg(long)]
    pub dry_run: bool,

    /// Stop at the first file that cannot be read instead of skipping it
    #[arg(long)]
    pub strict: bool,

    /// Threads used to compute signatures
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Configuration file (default: config.toml in the user config directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Report fatal errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,

    /// Filter flags in command-line order
    #[arg(skip)]
    pub chain: Vec<ChainArg>,

    /// The group action that was given last
    #[arg(skip)]
    pub action: ActionArg,
}

/// One filter flag, as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainArg {
    /// `--filter SPEC`
    Filter(String),
    /// `--regex PATTERN`
    Regex(String),
    /// `--shell TEMPLATE`
    Shell(String),
}

impl ChainArg {
    /// Turn the flag into a filter description.
    ///
    /// # Errors
    ///
    /// [`FilterSpecError`] when a `--filter` value names no filter.
    pub fn into_spec(self) -> Result<FilterSpec, FilterSpecError> {
        match self {
            Self::Filter(text) => FilterSpec::parse(&text),
            Self::Regex(pattern) => Ok(FilterSpec::Regex(pattern)),
            Self::Shell(template) => Ok(FilterSpec::ShellTemplate(template)),
        }
    }
}

/// What to do with the groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActionArg {
    /// Print them in the chosen output format
    #[default]
    Print,
    /// `--link`
    Link,
    /// `--remove`
    Remove,
    /// `--merge`
    Merge(MergeSpec),
    /// `--exec-group`
    Exec(String),
}

/// Output format for printed groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable listing
    Text,
    /// JSON document for scripting
    Json,
    /// One CSV row per file
    Csv,
}

impl OutputFormat {
    /// Whether the format is meant for programs rather than people.
    #[must_use]
    pub fn is_machine_readable(self) -> bool {
        !matches!(self, Self::Text)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

fn parse_merge(s: &str) -> Result<MergeSpec, String> {
    MergeSpec::parse(s).map_err(|e| e.to_string())
}

impl Cli {
    /// Parse `std::env::args`, exiting with usage on error.
    #[must_use]
    pub fn parse_ordered() -> Self {
        let matches = Self::command().get_matches();
        Self::from_matches(&matches).unwrap_or_else(|e| e.exit())
    }

    /// Parse an explicit argument list (the first item is the binary name).
    ///
    /// # Errors
    ///
    /// The clap error describing invalid arguments.
    pub fn try_parse_ordered_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args)?;
        Self::from_matches(&matches)
    }

    fn from_matches(matches: &ArgMatches) -> Result<Self, clap::Error> {
        let mut cli = Self::from_arg_matches(matches)?;
        cli.chain = ordered_chain(matches);
        cli.action = last_action(matches, &cli);
        Ok(cli)
    }

    /// The filter chain as typed, or `None` when no filter flag was given.
    #[must_use]
    pub fn filter_chain(&self) -> Option<&[ChainArg]> {
        if self.chain.is_empty() {
            None
        } else {
            Some(&self.chain)
        }
    }
}

fn indexed_values(matches: &ArgMatches, id: &str) -> Vec<(usize, String)> {
    match (matches.indices_of(id), matches.get_many::<String>(id)) {
        (Some(indices), Some(values)) => indices.zip(values.cloned()).collect(),
        _ => Vec::new(),
    }
}

fn ordered_chain(matches: &ArgMatches) -> Vec<ChainArg> {
    let mut chain: Vec<(usize, ChainArg)> = Vec::new();
    chain.extend(
        indexed_values(matches, "filters")
            .into_iter()
            .map(|(i, v)| (i, ChainArg::Filter(v))),
    );
    chain.extend(
        indexed_values(matches, "regexes")
            .into_iter()
            .map(|(i, v)| (i, ChainArg::Regex(v))),
    );
    chain.extend(
        indexed_values(matches, "shells")
            .into_iter()
            .map(|(i, v)| (i, ChainArg::Shell(v))),
    );
    chain.sort_by_key(|(i, _)| *i);
    chain.into_iter().map(|(_, arg)| arg).collect()
}

/// Index of the last command-line occurrence of `id`.
fn last_index(matches: &ArgMatches, id: &str) -> Option<usize> {
    if matches.value_source(id) != Some(ValueSource::CommandLine) {
        return None;
    }
    matches.indices_of(id).and_then(Iterator::last)
}

fn last_action(matches: &ArgMatches, cli: &Cli) -> ActionArg {
    let candidates = [
        (last_index(matches, "link"), ActionArg::Link),
        (last_index(matches, "remove"), ActionArg::Remove),
        (
            last_index(matches, "merge"),
            cli.merge.clone().map_or(ActionArg::Print, ActionArg::Merge),
        ),
        (
            last_index(matches, "exec_group"),
            cli.exec_group.clone().map_or(ActionArg::Print, ActionArg::Exec),
        ),
    ];
    candidates
        .into_iter()
        .filter_map(|(index, action)| index.map(|i| (i, action)))
        .max_by_key(|(i, _)| *i)
        .map_or(ActionArg::Print, |(_, action)| action)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["dupgroup"];
        full.extend_from_slice(args);
        Cli::try_parse_ordered_from(full).unwrap()
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert!(cli.directories.is_empty());
        assert!(cli.filter_chain().is_none());
        assert_eq!(cli.action, ActionArg::Print);
        assert_eq!(cli.output, OutputFormat::Text);
        assert!(!cli.recursive);
        assert_eq!(cli.threshold, None);
    }

    #[test]
    fn test_filter_chain_keeps_command_line_order() {
        let cli = parse(&[
            "--regex",
            r"(\d+)",
            "-f",
            "size",
            "-s",
            "wc -l < {}",
            "-f",
            "md5",
            "/tmp",
        ]);
        assert_eq!(
            cli.chain,
            vec![
                ChainArg::Regex(r"(\d+)".into()),
                ChainArg::Filter("size".into()),
                ChainArg::Shell("wc -l < {}".into()),
                ChainArg::Filter("md5".into()),
            ]
        );
        assert_eq!(cli.directories, vec![PathBuf::from("/tmp")]);
    }

    #[test]
    fn test_last_action_wins() {
        let cli = parse(&["--remove", "--link"]);
        assert_eq!(cli.action, ActionArg::Link);

        let cli = parse(&["--link", "-x", "echo {}", "--remove"]);
        assert_eq!(cli.action, ActionArg::Remove);

        let cli = parse(&["--remove", "--merge", "/out:IGNORE"]);
        match cli.action {
            ActionArg::Merge(spec) => assert_eq!(spec.dir, PathBuf::from("/out")),
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_invalid_merge_spec_is_rejected() {
        let result = Cli::try_parse_ordered_from(["dupgroup", "--merge", "/out:CONDITION"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_output_format_and_flags() {
        let cli = parse(&["-o", "json", "-t", "2", "-r", "--max-depth", "3", "-vv"]);
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(cli.output.is_machine_readable());
        assert_eq!(cli.threshold, Some(2));
        assert!(cli.recursive);
        assert_eq!(cli.max_depth, Some(3));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_ordered_from(["dupgroup", "-q", "-v"]).is_err());
    }

    #[test]
    fn test_chain_arg_into_spec() {
        assert!(matches!(
            ChainArg::Filter("size:kb".into()).into_spec(),
            Ok(FilterSpec::BuiltinProperty { .. })
        ));
        assert!(matches!(
            ChainArg::Shell("echo {}".into()).into_spec(),
            Ok(FilterSpec::ShellTemplate(_))
        ));
        assert!(ChainArg::Filter("sise".into()).into_spec().is_err());
    }
}
