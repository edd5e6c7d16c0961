// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Ignore list handling.
//!
//! Utilities to turn selection edits into a new ignore list for a folder.
//!
//! # Ignore Patterns
//!
//! Syncthing decides what to leave out of a folder through an ordered list
//! of __ignore patterns__, stored by the daemon in the folder's `.stignore`
//! file. Patterns are evaluated top to bottom and the first match wins.
//! Syncsel only ever writes two forms of pattern:
//!
//! - `path/**` excludes everything below `path`.
//! - `!path` forces `path`, and everything below it, back in.
//!
//! Every other pattern a user may have written by hand is opaque to
//! syncsel. It is never parsed, rewritten, sorted, or deduplicated. It only
//! moves when neighbouring entries are inserted or removed.
//!
//! # Synthesis
//!
//! Synthesis takes the edit a user made to the tri-state selection (the
//! [`ChangeSet`]) and rewrites the previous ignore list in three passes over
//! the changed paths. Each pass completes for every changed path before the
//! next one begins:
//!
//! 1. Clear stale entries. Drop `!v` and `v/**` for each changed path `v`.
//!    If `v` is not left partially selected, also drop every pattern for a
//!    path below `v`, along with checked descendants of `v`, since `v`'s own
//!    pattern now covers them.
//! 2. Re-include. Insert `!v` at the front for each changed path that is
//!    now checked, so it wins over any exclusion of an ancestor.
//! 3. Keep partial directories walkable. Append `v/**` followed by `!v` for
//!    each changed path left partially selected. Older daemons only descend
//!    into an excluded directory to honour the overrides of its children
//!    when the directory itself is both excluded and re-included.
//!
//! Empty entries are dropped at the end.
//!
//! # Pitfalls
//!
//! Pass 3 is only needed by daemons older than 1.5, but it is applied
//! unconditionally. Daemon precedence is first-match-wins, so the final list
//! must never be reordered to "tidy it up".
//!
//! # See Also
//!
//! - [Syncthing ignoring files](https://docs.syncthing.net/users/ignoring.html)

use crate::folder::selection::{CheckState, SelectionTracker};

use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fmt::{Display, Formatter, Result as FmtResult},
};
use tracing::debug;

/// Ordered ignore pattern list of a folder.
///
/// # Invariant
///
/// - Order of entries is preserved as given.
/// - No implicit deduplication.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct IgnoreList {
    patterns: Vec<String>,
}

impl IgnoreList {
    /// Construct new empty ignore list.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.patterns
    }

    pub fn into_vec(self) -> Vec<String> {
        self.patterns
    }

    /// Check if exact pattern is present.
    pub fn contains(&self, pattern: impl AsRef<str>) -> bool {
        self.patterns.iter().any(|entry| entry == pattern.as_ref())
    }

    /// Insert pattern in front of all other patterns.
    pub fn insert_front(&mut self, pattern: impl Into<String>) {
        self.patterns.insert(0, pattern.into());
    }

    /// Append pattern after all other patterns.
    pub fn push(&mut self, pattern: impl Into<String>) {
        self.patterns.push(pattern.into());
    }

    /// Remove every occurrence of exact pattern.
    ///
    /// Return true if anything was removed.
    pub fn remove(&mut self, pattern: impl AsRef<str>) -> bool {
        let before = self.patterns.len();
        self.patterns.retain(|entry| entry != pattern.as_ref());
        before != self.patterns.len()
    }

    /// Keep only the patterns matching predicate.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.patterns.retain(|entry| keep(entry));
    }
}

impl Display for IgnoreList {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        for pattern in &self.patterns {
            writeln!(fmt, "{pattern}")?;
        }

        Ok(())
    }
}

impl From<Vec<String>> for IgnoreList {
    fn from(patterns: Vec<String>) -> Self {
        Self { patterns }
    }
}

impl From<&str> for IgnoreList {
    fn from(content: &str) -> Self {
        Self {
            patterns: content.lines().map(str::to_owned).collect(),
        }
    }
}

impl From<String> for IgnoreList {
    fn from(content: String) -> Self {
        Self::from(content.as_str())
    }
}

impl<S: Into<String>> FromIterator<S> for IgnoreList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            patterns: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Pattern excluding `path` and everything below it.
pub fn exclude_pattern(path: &str) -> String {
    format!("{path}/**")
}

/// Pattern forcing `path` and everything below it back in.
pub fn include_pattern(path: &str) -> String {
    format!("!{path}")
}

/// Check if pattern targets a strict descendant of `path`.
///
/// Matches both the plain and the `!` form. A pattern for `path` itself is
/// not a descendant.
pub fn targets_descendant(pattern: &str, path: &str) -> bool {
    let prefix = format!("{path}/");
    pattern.starts_with(&prefix)
        || pattern
            .strip_prefix('!')
            .is_some_and(|rest| rest.starts_with(&prefix))
}

/// Selection edit collected at submit time.
///
/// Built fresh for every submission and consumed exactly once.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    /// Paths whose selection differs from the baseline.
    pub changed: Vec<String>,

    /// Paths currently fully checked.
    pub checked: Vec<String>,

    /// Paths currently partially checked.
    pub partial: Vec<String>,

    /// Ignore list before the edit.
    pub ignores: IgnoreList,
}

impl ChangeSet {
    /// Collect change set from a selection tracker and the current ignore list.
    pub fn collect(tracker: &impl SelectionTracker, ignores: IgnoreList) -> Self {
        Self {
            changed: tracker.changed_paths(),
            checked: tracker.paths_with_state(CheckState::Checked),
            partial: tracker.paths_with_state(CheckState::Partial),
            ignores,
        }
    }

    /// Nothing to submit.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    /// Produce the ignore list to persist.
    pub fn synthesize(self) -> IgnoreList {
        synthesize(&self.changed, self.checked, &self.partial, self.ignores)
    }
}

/// Rewrite ignore list according to selection edits.
///
/// See the [module documentation](self) for the three passes.
pub fn synthesize(
    changed: &[String],
    mut checked: Vec<String>,
    partial: &[String],
    mut ignores: IgnoreList,
) -> IgnoreList {
    debug!("changed paths: {changed:?}");
    debug!("checked paths: {checked:?}");
    debug!("partially checked paths: {partial:?}");
    debug!("initial ignores: {:?}", ignores.as_slice());

    // INVARIANT: A path listed twice is handled once.
    let mut seen = HashSet::new();
    let changed: Vec<&str> = changed
        .iter()
        .map(String::as_str)
        .filter(|path| seen.insert(*path))
        .collect();
    let partial: HashSet<&str> = partial.iter().map(String::as_str).collect();

    for &path in &changed {
        ignores.remove(include_pattern(path));
        ignores.remove(exclude_pattern(path));

        let is_checked = checked.iter().any(|entry| entry == path);
        if is_checked || !partial.contains(path) {
            ignores.retain(|pattern| !targets_descendant(pattern, path));
            checked.retain(|entry| !targets_descendant(entry, path));
        }
    }
    debug!("after clearing stale entries: {:?}", ignores.as_slice());

    for &path in &changed {
        if checked.iter().any(|entry| entry == path) {
            ignores.insert_front(include_pattern(path));
        }
    }
    debug!("after re-including checked paths: {:?}", ignores.as_slice());

    for &path in &changed {
        if partial.contains(path) {
            ignores.push(exclude_pattern(path));
            ignores.push(include_pattern(path));
        }
    }
    debug!("after marking partial directories: {:?}", ignores.as_slice());

    ignores.retain(|pattern| !pattern.is_empty());
    debug!("resulting ignores: {:?}", ignores.as_slice());

    ignores
}
