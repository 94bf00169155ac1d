//! Progressive grouping engine.
//!
//! # Overview
//!
//! [`ProgressiveGrouper`] partitions a stream of paths by an ordered chain
//! of signature filters:
//!
//! 1. **Admission** - every path must satisfy all path conditions.
//! 2. **First filter** - on the first call to `next()` the whole stream is
//!    consumed and bucketed by `f1`, in first-seen order.
//! 3. **Refinement** - each group is split by `f2..fn` lazily. The bucket
//!    holding the group's first member is kept; the other buckets become
//!    sibling groups that follow it and are refined by the remaining
//!    filters like any other group.
//!
//! Blank signatures (see [`is_blank_signature`]) drop the path at the
//! stage that produced them.
//!
//! # Example
//!
//! ```
//! use dupgroup::filters::Filter;
//! use dupgroup::grouping::{GroupingOptions, ProgressiveGrouper};
//! use std::path::PathBuf;
//!
//! let by_len = Filter::new("len", |p| Ok(p.to_string_lossy().len().to_string()));
//! let paths = vec![PathBuf::from("/ab"), PathBuf::from("/cd"), PathBuf::from("/e")];
//!
//! let grouper =
//!     ProgressiveGrouper::new(vec![by_len], paths, Vec::new(), GroupingOptions::default())
//!         .unwrap();
//! let groups: Vec<_> = grouper.map(Result::unwrap).collect();
//!
//! assert_eq!(groups.len(), 2);
//! assert_eq!(groups[0].members, vec![PathBuf::from("/ab"), PathBuf::from("/cd")]);
//! assert_eq!(groups[1].trail, vec!["2".to_string()]);
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use super::groups::{is_blank_signature, Group, SignatureBuckets, DEFAULT_BLANK_CHECK_LEN};
use crate::filters::{Filter, FilterError};
use crate::progress::ProgressCallback;
use crate::scanner::Condition;

/// What to do when a filter or condition fails for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Log a warning, drop the path, keep going.
    #[default]
    Skip,
    /// Yield the error and end the iteration.
    FailFast,
}

/// Errors surfaced by the grouping engine.
#[derive(thiserror::Error, Debug)]
pub enum GroupingError {
    /// No filters were given.
    #[error("at least one filter is required")]
    EmptyFilterChain,

    /// A filter failed for a path.
    #[error("filter '{filter}' failed for {path}: {source}")]
    Filter {
        filter: String,
        path: PathBuf,
        #[source]
        source: FilterError,
    },

    /// A path condition could not be evaluated.
    #[error("condition '{condition}' failed for {path}: {source}")]
    Condition {
        condition: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Grouping stopped because shutdown was requested.
    #[error("Grouping interrupted by user")]
    Interrupted,

    /// The signature thread pool could not be created.
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Configuration for [`ProgressiveGrouper`].
#[derive(Clone)]
pub struct GroupingOptions {
    /// Signatures shorter than this are tested for blankness.
    pub blank_check_len: usize,
    /// Handling of per-path filter and condition failures.
    pub error_policy: ErrorPolicy,
    /// Groups smaller than this are discarded instead of refined.
    pub min_group_size: usize,
    /// Threads used to compute signatures (1 = on the caller's thread).
    pub io_threads: usize,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for GroupingOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupingOptions")
            .field("blank_check_len", &self.blank_check_len)
            .field("error_policy", &self.error_policy)
            .field("min_group_size", &self.min_group_size)
            .field("io_threads", &self.io_threads)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "ProgressCallback"),
            )
            .finish()
    }
}

impl Default for GroupingOptions {
    fn default() -> Self {
        Self {
            blank_check_len: DEFAULT_BLANK_CHECK_LEN,
            error_policy: ErrorPolicy::Skip,
            min_group_size: 1,
            io_threads: 1,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl GroupingOptions {
    /// Set the blank-test length threshold.
    #[must_use]
    pub fn with_blank_check_len(mut self, len: usize) -> Self {
        self.blank_check_len = len;
        self
    }

    /// Set the error policy.
    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Set the minimum group size (clamped to at least 1).
    #[must_use]
    pub fn with_min_group_size(mut self, size: usize) -> Self {
        self.min_group_size = size.max(1);
        self
    }

    /// Set the number of signature threads (clamped to at least 1).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Counters collected while grouping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupingStats {
    /// Paths pulled from the input stream
    pub paths_seen: usize,
    /// Paths that passed every condition
    pub admitted: usize,
    /// Paths rejected by a condition
    pub rejected: usize,
    /// Path drops caused by a blank signature
    pub blank_dropped: usize,
    /// Paths dropped because a filter or condition failed
    pub failed: usize,
    /// Filter invocations
    pub signatures_computed: usize,
    /// Groups yielded
    pub groups_emitted: usize,
    /// Groups discarded for being smaller than the minimum size
    pub groups_pruned: usize,
    /// Whether grouping stopped on shutdown
    pub interrupted: bool,
}

/// Lazy iterator over the groups produced by a filter chain.
///
/// Yields `Result<Group, GroupingError>`. With [`ErrorPolicy::Skip`] only
/// [`GroupingError::Interrupted`] can appear, and always last.
pub struct ProgressiveGrouper<I> {
    filters: Vec<Filter>,
    paths: Option<I>,
    conditions: Vec<Condition>,
    options: GroupingOptions,
    pool: Option<rayon::ThreadPool>,
    /// Pending groups with the index of the next filter to apply
    stack: Vec<(Group, usize)>,
    stats: GroupingStats,
    finished: bool,
}

impl<I> ProgressiveGrouper<I>
where
    I: Iterator<Item = PathBuf>,
{
    /// Create a grouper over `paths`.
    ///
    /// Nothing is read until the first call to `next()`.
    ///
    /// # Errors
    ///
    /// [`GroupingError::EmptyFilterChain`] when `filters` is empty and
    /// [`GroupingError::ThreadPool`] when the signature pool cannot be built.
    pub fn new<P>(
        filters: Vec<Filter>,
        paths: P,
        conditions: Vec<Condition>,
        options: GroupingOptions,
    ) -> Result<Self, GroupingError>
    where
        P: IntoIterator<Item = PathBuf, IntoIter = I>,
    {
        if filters.is_empty() {
            return Err(GroupingError::EmptyFilterChain);
        }

        let pool = if options.io_threads > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(options.io_threads)
                    .thread_name(|i| format!("dupgroup-sig-{i}"))
                    .build()?,
            )
        } else {
            None
        };

        Ok(Self {
            filters,
            paths: Some(paths.into_iter()),
            conditions,
            options,
            pool,
            stack: Vec::new(),
            stats: GroupingStats::default(),
            finished: false,
        })
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> &GroupingStats {
        &self.stats
    }

    /// The resolved filter chain.
    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Consume the input stream, admit paths and bucket them by `f1`.
    fn first_stage(&mut self, paths: I) -> Result<(), GroupingError> {
        let mut admitted = Vec::new();
        for path in paths {
            if self.options.is_shutdown_requested() {
                return Err(GroupingError::Interrupted);
            }
            self.stats.paths_seen += 1;
            if self.admit(&path)? {
                admitted.push(path);
            }
        }
        self.stats.admitted = admitted.len();

        let filter_name = self.filters[0].name().to_string();
        log::info!(
            "Grouping {} of {} paths by {} filter(s), starting with '{}'",
            admitted.len(),
            self.stats.paths_seen,
            self.filters.len(),
            filter_name
        );

        if let Some(ref callback) = self.options.progress_callback {
            callback.on_phase_start("first_filter", admitted.len());
        }
        let results = self.signatures(0, &admitted)?;
        if let Some(ref callback) = self.options.progress_callback {
            callback.on_phase_end("first_filter");
        }

        let buckets = self.bucket(0, admitted, results)?;
        log::debug!("'{}' produced {} group(s)", filter_name, buckets.len());

        let groups: Vec<Group> = buckets
            .into_buckets()
            .map(|(signature, members)| Group::new(members, vec![signature]))
            .collect();
        self.push_children(groups, 1);

        if let Some(ref callback) = self.options.progress_callback {
            callback.on_phase_start("refine", 0);
        }
        Ok(())
    }

    /// Evaluate every condition for `path`.
    fn admit(&mut self, path: &Path) -> Result<bool, GroupingError> {
        for condition in &self.conditions {
            match condition.apply(path) {
                Ok(true) => {}
                Ok(false) => {
                    log::trace!("Rejected by '{}': {}", condition.name(), path.display());
                    self.stats.rejected += 1;
                    return Ok(false);
                }
                Err(source) => {
                    let error = GroupingError::Condition {
                        condition: condition.name().to_string(),
                        path: path.to_path_buf(),
                        source,
                    };
                    return on_path_error(self.options.error_policy, &mut self.stats, error)
                        .map(|()| false);
                }
            }
        }
        Ok(true)
    }

    /// Compute filter `idx` for `paths`, in order.
    fn signatures(
        &mut self,
        idx: usize,
        paths: &[PathBuf],
    ) -> Result<Vec<Result<String, FilterError>>, GroupingError> {
        let filter = &self.filters[idx];
        let options = &self.options;
        let done = AtomicUsize::new(self.stats.signatures_computed);

        let compute = |path: &PathBuf| -> Option<Result<String, FilterError>> {
            if options.is_shutdown_requested() {
                return None;
            }
            let result = filter.apply(path);
            if let Some(ref callback) = options.progress_callback {
                let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                callback.on_progress(current, &path.to_string_lossy());
            }
            Some(result)
        };

        let results: Vec<Option<Result<String, FilterError>>> = match &self.pool {
            Some(pool) => pool.install(|| paths.par_iter().map(compute).collect()),
            None => paths.iter().map(compute).collect(),
        };

        let results = results
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(GroupingError::Interrupted)?;
        self.stats.signatures_computed += results.len();
        Ok(results)
    }

    /// Bucket `paths` by their signatures, dropping blanks and failures.
    fn bucket(
        &mut self,
        idx: usize,
        paths: Vec<PathBuf>,
        results: Vec<Result<String, FilterError>>,
    ) -> Result<SignatureBuckets, GroupingError> {
        let mut buckets = SignatureBuckets::new();
        for (path, result) in paths.into_iter().zip(results) {
            match result {
                Ok(signature) if is_blank_signature(&signature, self.options.blank_check_len) => {
                    log::trace!(
                        "Blank '{}' signature, dropping {}",
                        self.filters[idx].name(),
                        path.display()
                    );
                    self.stats.blank_dropped += 1;
                }
                Ok(signature) => buckets.push(signature, path),
                Err(source) => {
                    let error = GroupingError::Filter {
                        filter: self.filters[idx].name().to_string(),
                        path,
                        source,
                    };
                    on_path_error(self.options.error_policy, &mut self.stats, error)?;
                }
            }
        }
        Ok(buckets)
    }

    /// Split `group` by filter `idx`: kept group first, then siblings.
    fn refine(&mut self, mut group: Group, idx: usize) -> Result<Vec<Group>, GroupingError> {
        let results = self.signatures(idx, &group.members)?;
        let size = group.len();
        let buckets = self.bucket(idx, std::mem::take(&mut group.members), results)?;

        if buckets.len() > 1 {
            log::debug!(
                "'{}' split a group of {} into {}",
                self.filters[idx].name(),
                size,
                buckets.len()
            );
        }

        Ok(buckets
            .into_buckets()
            .map(|(signature, members)| Group::new(members, group.extended_trail(signature)))
            .collect())
    }

    /// Queue `groups` (in order) for filter `next`, pruning small ones.
    fn push_children(&mut self, groups: Vec<Group>, next: usize) {
        for group in groups.into_iter().rev() {
            if group.len() < self.options.min_group_size {
                self.stats.groups_pruned += 1;
                continue;
            }
            self.stack.push((group, next));
        }
    }

    fn end_phase(&self) {
        if let Some(ref callback) = self.options.progress_callback {
            callback.on_phase_end("refine");
        }
    }

    /// Stop iterating and report `error`.
    fn terminate(&mut self, error: GroupingError) -> Result<Group, GroupingError> {
        self.finished = true;
        self.stack.clear();
        if matches!(error, GroupingError::Interrupted) {
            log::info!("Grouping interrupted by shutdown signal");
            self.stats.interrupted = true;
        }
        self.end_phase();
        Err(error)
    }
}

impl<I> Iterator for ProgressiveGrouper<I>
where
    I: Iterator<Item = PathBuf>,
{
    type Item = Result<Group, GroupingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if let Some(paths) = self.paths.take() {
            if let Err(error) = self.first_stage(paths) {
                return Some(self.terminate(error));
            }
        }

        loop {
            if self.options.is_shutdown_requested() {
                return Some(self.terminate(GroupingError::Interrupted));
            }

            let Some((group, next)) = self.stack.pop() else {
                self.finished = true;
                self.end_phase();
                log::debug!(
                    "Grouping finished: {} group(s), {} signature(s) computed",
                    self.stats.groups_emitted,
                    self.stats.signatures_computed
                );
                return None;
            };

            if next >= self.filters.len() {
                self.stats.groups_emitted += 1;
                return Some(Ok(group));
            }

            match self.refine(group, next) {
                Ok(children) => self.push_children(children, next + 1),
                Err(error) => return Some(self.terminate(error)),
            }
        }
    }
}

/// Apply the error policy to a per-path failure.
fn on_path_error(
    policy: ErrorPolicy,
    stats: &mut GroupingStats,
    error: GroupingError,
) -> Result<(), GroupingError> {
    match policy {
        ErrorPolicy::FailFast => Err(error),
        ErrorPolicy::Skip => {
            log::warn!("{}", error);
            stats.failed += 1;
            Ok(())
        }
    }
}

/// Run the whole chain and collect every group.
///
/// # Errors
///
/// The first error the grouper yields.
pub fn group_paths<P>(
    filters: Vec<Filter>,
    paths: P,
    conditions: Vec<Condition>,
    options: GroupingOptions,
) -> Result<(Vec<Group>, GroupingStats), GroupingError>
where
    P: IntoIterator<Item = PathBuf>,
{
    let mut grouper = ProgressiveGrouper::new(filters, paths, conditions, options)?;
    let groups = grouper.by_ref().collect::<Result<Vec<_>, _>>()?;
    Ok((groups, grouper.stats().clone()))
}
