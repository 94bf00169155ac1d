//! Progressive grouping of paths by chained signature filters.
//!
//! - [`groups`] - the [`Group`] value, [`SignatureBuckets`] and the
//!   blank-signature rule
//! - [`engine`] - [`ProgressiveGrouper`], the lazy refinement iterator

pub mod engine;
pub mod groups;

pub use engine::{
    group_paths, ErrorPolicy, GroupingError, GroupingOptions, GroupingStats, ProgressiveGrouper,
};
pub use groups::{is_blank_signature, Group, SignatureBuckets, DEFAULT_BLANK_CHECK_LEN};
