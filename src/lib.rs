//! dupgroup - group files by an ordered chain of filters.
//!
//! Files are partitioned by a first filter (size, a hash, a rounded
//! timestamp, a regex match, a shell command's output, ...) and every
//! group is then refined lazily by the next filter in the chain. Groups
//! can be printed, hard-linked, deduplicated, merged into a directory
//! tree or fed to a command.
//!
//! ```no_run
//! use dupgroup::filters::resolve_all;
//! use dupgroup::grouping::{group_paths, GroupingOptions};
//! use dupgroup::scanner::{default_conditions, RootSearch, WalkerConfig};
//! use std::path::PathBuf;
//!
//! let filters = resolve_all(&["size", "blake3"]).unwrap();
//! let search = RootSearch::new(&[PathBuf::from(".")], &WalkerConfig::default()).unwrap();
//! let (groups, stats) = group_paths(
//!     filters,
//!     search.paths(),
//!     default_conditions(false, false),
//!     GroupingOptions::default().with_min_group_size(2),
//! )
//! .unwrap();
//! println!("{} groups from {} paths", groups.len(), stats.paths_seen);
//! ```

pub mod actions;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod filters;
pub mod grouping;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod template;

pub use app::run_app;
