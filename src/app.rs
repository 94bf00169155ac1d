//! Application driver: wires the CLI, configuration, traversal, grouping
//! engine and group actions together.

use std::io::{self, BufWriter, IsTerminal};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;

use crate::actions::{ExecAction, GroupAction, LinkAction, MergeAction, RemoveAction};
use crate::cli::{ActionArg, Cli, OutputFormat};
use crate::config::Config;
use crate::error::ExitCode;
use crate::filters::{self, Filter, FilterSpec};
use crate::grouping::{ErrorPolicy, Group, GroupingError, GroupingOptions, ProgressiveGrouper};
use crate::logging::init_logging;
use crate::output::{CsvOutput, JsonOutput, RunSummary, TextOutput};
use crate::progress::Progress;
use crate::scanner::{default_conditions, RootSearch, WalkerConfig};
use crate::signal::{self, ShutdownHandler};

/// Run dupgroup with parsed arguments and return the exit code.
///
/// # Errors
///
/// Invalid configuration, filters, roots or action arguments, and any
/// error that stops grouping or an action.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let settings = Settings::merge(&cli, &config);
    log::debug!("Effective settings: {:?}", settings);

    let filters = resolve_chain(&cli, &config)?;
    let shutdown = signal::install_handler().unwrap_or_else(|e| {
        log::warn!("{}; Ctrl+C will not stop grouping cleanly", e);
        ShutdownHandler::new()
    });

    let search = RootSearch::new(&settings.directories, &settings.walker)
        .context("invalid search directory")?
        .with_shutdown_flag(shutdown.flag());
    let walk_errors = search.error_counter();

    let mut options = GroupingOptions::default()
        .with_blank_check_len(config.blank_check_len)
        .with_error_policy(settings.error_policy)
        .with_min_group_size(settings.threshold)
        .with_io_threads(settings.io_threads)
        .with_shutdown_flag(shutdown.flag());
    if wants_progress(&cli, io::stderr().is_terminal()) {
        options = options.with_progress_callback(Arc::new(Progress::new()));
    }

    let filter_count = filters.len();
    let mut action = build_action(&cli, &settings, filter_count)?;
    let conditions = default_conditions(settings.empty_file, settings.follow_symbolic);
    let mut grouper = ProgressiveGrouper::new(filters, search.paths(), conditions, options)?;

    let started = Instant::now();
    let mut summary = RunSummary::default();
    let collected = drive(
        &mut grouper,
        action.as_mut(),
        &mut summary,
        cli.interactive,
        || (walk_errors.load(Ordering::Relaxed), started.elapsed()),
    )?;
    log::info!("{}", summary);

    if cli.interactive && !summary.interrupted() {
        summary.action_failures += prompt_and_apply(&collected, &cli)?;
    }

    Ok(exit_code(&summary))
}

/// Feed every group to `action`, then finish it. `finish` also runs when
/// grouping stops on an error, before that error is returned.
///
/// `totals` reports the walk error count and elapsed time once the path
/// stream is exhausted.
fn drive<I>(
    grouper: &mut ProgressiveGrouper<I>,
    action: &mut dyn GroupAction,
    summary: &mut RunSummary,
    keep: bool,
    totals: impl FnOnce() -> (usize, Duration),
) -> Result<Vec<Group>>
where
    I: Iterator<Item = PathBuf>,
{
    let mut collected = Vec::new();
    let mut failure = None;

    for result in grouper.by_ref() {
        match result {
            Ok(group) => {
                summary.record_group(&group);
                action.apply(&group)?;
                if keep {
                    collected.push(group);
                }
            }
            Err(GroupingError::Interrupted) => break,
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    let (walk_errors, elapsed) = totals();
    summary.stats = grouper.stats().clone();
    summary.walk_errors = walk_errors;
    summary.action_failures = action.failures();
    summary.set_elapsed(elapsed);
    action.finish(summary)?;

    match failure {
        Some(e) => Err(e).context("grouping failed"),
        None => Ok(collected),
    }
}

/// Progress bars go to an interactive stderr, never with `-q` or
/// machine-readable output.
fn wants_progress(cli: &Cli, stderr_is_terminal: bool) -> bool {
    !cli.quiet && !cli.output.is_machine_readable() && stderr_is_terminal
}

/// CLI flags layered over the loaded configuration.
#[derive(Debug)]
struct Settings {
    directories: Vec<PathBuf>,
    walker: WalkerConfig,
    threshold: usize,
    io_threads: usize,
    error_policy: ErrorPolicy,
    empty_file: bool,
    follow_symbolic: bool,
    basic_formatting: bool,
}

impl Settings {
    fn merge(cli: &Cli, config: &Config) -> Self {
        let directories = if cli.directories.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            cli.directories.clone()
        };
        let follow_symbolic = cli.follow_symbolic || config.follow_symbolic;

        Self {
            directories,
            walker: WalkerConfig {
                recursive: cli.recursive || config.recursive,
                max_depth: cli.max_depth.or(config.max_depth),
                follow_symlinks: follow_symbolic,
                follow_hidden: cli.follow_hidden || config.follow_hidden,
                include: cli.include.clone(),
                exclude: cli.exclude.clone(),
                dir_include: cli.dir_include.clone(),
                dir_exclude: cli.dir_exclude.clone(),
            },
            threshold: cli.threshold.unwrap_or(config.threshold),
            io_threads: cli.io_threads.unwrap_or(config.io_threads),
            error_policy: if cli.strict || config.strict {
                ErrorPolicy::FailFast
            } else {
                ErrorPolicy::Skip
            },
            empty_file: cli.empty_file || config.empty_file,
            follow_symbolic,
            basic_formatting: cli.basic_formatting || config.basic_formatting,
        }
    }
}

/// Filters from the command line, or the configured default chain.
fn resolve_chain(cli: &Cli, config: &Config) -> Result<Vec<Filter>> {
    match cli.filter_chain() {
        Some(chain) => chain
            .iter()
            .cloned()
            .map(|arg| arg.into_spec().and_then(FilterSpec::resolve))
            .collect::<Result<Vec<_>, _>>()
            .context("invalid filter"),
        None => filters::resolve_all(&config.filters).context("invalid filter in configuration"),
    }
}

fn build_action(cli: &Cli, settings: &Settings, filter_count: usize) -> Result<Box<dyn GroupAction>> {
    let action: Box<dyn GroupAction> = match &cli.action {
        ActionArg::Link => Box::new(LinkAction::new().with_dry_run(cli.dry_run)),
        ActionArg::Remove => Box::new(
            RemoveAction::new()
                .with_permanent(cli.permanent)
                .with_dry_run(cli.dry_run),
        ),
        ActionArg::Merge(spec) => Box::new(MergeAction::new(spec.clone())?),
        ActionArg::Exec(template) => Box::new(ExecAction::new(
            template,
            filter_count,
            BufWriter::new(io::stdout()),
        )?),
        ActionArg::Print => {
            let out = BufWriter::new(io::stdout());
            match cli.output {
                OutputFormat::Text => Box::new(
                    TextOutput::new(out)
                        .with_basic(settings.basic_formatting)
                        .with_color(!cli.no_color && io::stdout().is_terminal())
                        .with_summary(!cli.quiet),
                ),
                OutputFormat::Json => Box::new(JsonOutput::new(out).with_pretty(true)),
                OutputFormat::Csv => Box::new(CsvOutput::new(out)),
            }
        }
    };
    Ok(action)
}

/// Ask what to do with the printed groups and do it, returning the number
/// of per-file failures.
fn prompt_and_apply(groups: &[Group], cli: &Cli) -> Result<usize> {
    if groups.iter().all(Group::is_singleton) {
        return Ok(0);
    }

    let choices = ["Link duplicates", "Remove duplicates", "Exit"];
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("What should be done with the duplicates?")
        .items(&choices)
        .default(2)
        .interact()
        .context("interactive prompt failed")?;

    let mut action: Box<dyn GroupAction> = match choice {
        0 => Box::new(LinkAction::new().with_dry_run(cli.dry_run)),
        1 => Box::new(
            RemoveAction::new()
                .with_permanent(cli.permanent)
                .with_dry_run(cli.dry_run),
        ),
        _ => return Ok(0),
    };

    let mut summary = RunSummary::default();
    for group in groups {
        summary.record_group(group);
        action.apply(group)?;
    }
    summary.action_failures = action.failures();
    action.finish(&summary)?;
    Ok(summary.action_failures)
}

fn exit_code(summary: &RunSummary) -> ExitCode {
    if summary.interrupted() {
        ExitCode::Interrupted
    } else if summary.duplicates == 0 {
        ExitCode::NoGroups
    } else if summary.stats.failed + summary.walk_errors + summary.action_failures > 0 {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    }
}
