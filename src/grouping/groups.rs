//! Groups, signature buckets, and the blank-signature rule.
//!
//! # Overview
//!
//! A [`Group`] is an ordered list of paths that produced the same signature
//! on every filter applied so far, carried together with its signature
//! trail. [`SignatureBuckets`] is the insertion-ordered accumulator used by
//! every stage of the engine to partition paths by signature.
//!
//! # Example
//!
//! ```
//! use dupgroup::grouping::SignatureBuckets;
//! use std::path::PathBuf;
//!
//! let mut buckets = SignatureBuckets::new();
//! buckets.push("100".to_string(), PathBuf::from("/a"));
//! buckets.push("200".to_string(), PathBuf::from("/c"));
//! buckets.push("100".to_string(), PathBuf::from("/b"));
//!
//! let groups: Vec<_> = buckets.into_buckets().collect();
//! assert_eq!(groups[0].0, "100");
//! assert_eq!(groups[0].1, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
//! assert_eq!(groups[1].0, "200");
//! ```

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Signatures shorter than this are tested for blankness.
///
/// Longer signatures are never blank-tested. The value mirrors the
/// long-standing behaviour of the tool; it is configurable through
/// [`super::GroupingOptions::blank_check_len`].
pub const DEFAULT_BLANK_CHECK_LEN: usize = 10;

/// Check whether a signature counts as "no output".
///
/// A signature is blank when it is shorter than `threshold` bytes and made
/// only of newlines, spaces, tabs and carriage returns (the empty string
/// included). Signatures at or above the threshold are never blank.
///
/// # Example
///
/// ```
/// use dupgroup::grouping::is_blank_signature;
///
/// assert!(is_blank_signature("", 10));
/// assert!(is_blank_signature(" \t\n", 10));
/// assert!(!is_blank_signature("abc", 10));
/// // Long whitespace runs are not tested
/// assert!(!is_blank_signature("            ", 10));
/// ```
#[must_use]
pub fn is_blank_signature(signature: &str, threshold: usize) -> bool {
    signature.len() < threshold
        && signature
            .chars()
            .all(|c| matches!(c, '\n' | ' ' | '\t' | '\r'))
}

/// An ordered group of paths sharing every signature applied so far.
///
/// The first member is the representative (the path that established the
/// group's signature); the others follow in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    /// Members, representative first
    pub members: Vec<PathBuf>,
    /// Signature of each applied filter, in filter order
    pub trail: Vec<String>,
}

impl Group {
    /// Create a group from members and the trail that produced it.
    #[must_use]
    pub fn new(members: Vec<PathBuf>, trail: Vec<String>) -> Self {
        Self { members, trail }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Check if this is a degenerate group (the representative alone).
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    /// The representative ("source") path.
    #[must_use]
    pub fn representative(&self) -> Option<&Path> {
        self.members.first().map(PathBuf::as_path)
    }

    /// Every member after the representative.
    #[must_use]
    pub fn duplicates(&self) -> &[PathBuf] {
        self.members.get(1..).unwrap_or(&[])
    }

    /// Signature of filter `n` (1-based, as in the `f1`, `f2` labels).
    #[must_use]
    pub fn signature(&self, n: usize) -> Option<&str> {
        n.checked_sub(1)
            .and_then(|i| self.trail.get(i))
            .map(String::as_str)
    }

    /// Trail labelled `f1`, `f2`, ... for templates and reports.
    #[must_use]
    pub fn labeled_signatures(&self) -> Vec<(String, String)> {
        self.trail
            .iter()
            .enumerate()
            .map(|(i, sig)| (format!("f{}", i + 1), sig.clone()))
            .collect()
    }

    /// Trail extended by one more signature.
    pub(crate) fn extended_trail(&self, signature: String) -> Vec<String> {
        let mut trail = Vec::with_capacity(self.trail.len() + 1);
        trail.extend(self.trail.iter().cloned());
        trail.push(signature);
        trail
    }
}

/// Insertion-ordered map from signature to the paths producing it.
///
/// Buckets live in an arena in first-seen order; a lookup map points each
/// signature at its bucket index.
#[derive(Debug, Default)]
pub struct SignatureBuckets {
    index: HashMap<String, usize>,
    buckets: Vec<(String, Vec<PathBuf>)>,
}

impl SignatureBuckets {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `path` to the bucket for `signature`, creating it if needed.
    pub fn push(&mut self, signature: String, path: PathBuf) {
        match self.index.get(&signature) {
            Some(&idx) => self.buckets[idx].1.push(path),
            None => {
                self.index.insert(signature.clone(), self.buckets.len());
                self.buckets.push((signature, vec![path]));
            }
        }
    }

    /// Number of distinct signatures seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Check if no signature has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Consume the map, yielding `(signature, paths)` in first-seen order.
    pub fn into_buckets(self) -> impl Iterator<Item = (String, Vec<PathBuf>)> {
        self.buckets.into_iter()
    }
}
