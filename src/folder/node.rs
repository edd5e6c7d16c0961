// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Folder entry model.

use crate::syncthing::{BrowseEntry, FileInfo};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::warn;

/// Kind of filesystem entry as reported by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum NodeKind {
    #[serde(rename = "FILE_INFO_TYPE_FILE", alias = "file")]
    File,

    #[serde(rename = "FILE_INFO_TYPE_DIRECTORY", alias = "directory")]
    Directory,

    #[serde(
        rename = "FILE_INFO_TYPE_SYMLINK",
        alias = "FILE_INFO_TYPE_SYMLINK_FILE",
        alias = "FILE_INFO_TYPE_SYMLINK_DIRECTORY",
        alias = "symlink"
    )]
    Symlink,

    #[serde(other)]
    Other,
}

/// Synchronization state of an entry.
///
/// Derived from the daemon's record and, if merged, the local filesystem.
/// Never stored by the daemon itself.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    /// Not enriched yet.
    #[default]
    Unknown,

    /// Included in synchronization, fully or partially.
    Syncing,

    /// Excluded from synchronization.
    Ignored,

    /// Present on disk, but the daemon has no record of it.
    NewLocal,

    /// Conflict copy produced by the daemon.
    Conflict,

    /// Excluded from synchronization, yet still present on disk.
    ExistsLocally,
}

impl Display for SyncState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            SyncState::Unknown => "unknown",
            SyncState::Syncing => "syncing",
            SyncState::Ignored => "ignored",
            SyncState::NewLocal => "new local",
            SyncState::Conflict => "conflict",
            SyncState::ExistsLocally => "exists locally",
        };
        fmt.write_str(name)
    }
}

/// Local filesystem view of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInfo {
    pub size: u64,
    pub modified: Option<OffsetDateTime>,
}

/// One entry inside a synchronized folder.
///
/// A directory owns its children exclusively. Children attached during
/// reconciliation are bare listing entries; they get enriched once their
/// own directory is reconciled.
///
/// # Invariant
///
/// - `partial` implies `!ignored`.
/// - `partial` is only ever set on directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub indexed: bool,
    pub size: Option<u64>,
    pub modified: Option<OffsetDateTime>,
    pub ignored: bool,
    pub invalid: bool,
    pub partial: bool,
    pub sync_state: SyncState,
    pub local: Option<LocalInfo>,
    pub children: Option<Vec<Node>>,
}

impl Node {
    /// Construct bare entry without any daemon attributes.
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            indexed: false,
            size: None,
            modified: None,
            ignored: false,
            invalid: false,
            partial: false,
            sync_state: SyncState::Unknown,
            local: None,
            children: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Copy daemon attributes of a database record onto this entry.
    ///
    /// Size and modification time come from the global view, flags from the
    /// local view.
    pub fn enrich(&mut self, info: &FileInfo) {
        self.indexed = true;
        self.size = Some(info.global.size);
        self.modified = parse_modified(&info.global.modified);
        self.ignored = info.local.ignored;
        self.invalid = info.local.invalid;
    }

    /// Derive sync state from the ignored and partial flags.
    pub fn derive_sync_state(&mut self) {
        self.sync_state = if !self.ignored || self.partial {
            SyncState::Syncing
        } else {
            SyncState::Ignored
        };
    }
}

impl From<&BrowseEntry> for Node {
    fn from(entry: &BrowseEntry) -> Self {
        Node::new(entry.name.clone(), entry.kind)
    }
}

fn parse_modified(value: &str) -> Option<OffsetDateTime> {
    if value.is_empty() {
        return None;
    }

    match OffsetDateTime::parse(value, &Rfc3339) {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn!("cannot parse modification time {value:?}: {error}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syncthing::FileRecord;
    use pretty_assertions::assert_eq;

    #[test]
    fn enrich_copies_global_size_and_local_flags() {
        let info = FileInfo {
            global: FileRecord {
                size: 42,
                modified: "2024-03-01T10:00:00.123456789+01:00".into(),
                ..FileRecord::default()
            },
            local: FileRecord {
                size: 7,
                ignored: true,
                invalid: true,
                ..FileRecord::default()
            },
            ..FileInfo::default()
        };

        let mut node = Node::new("report.pdf", NodeKind::File);
        node.enrich(&info);

        assert!(node.indexed);
        assert_eq!(node.size, Some(42));
        assert!(node.ignored);
        assert!(node.invalid);
        assert_eq!(
            node.modified.map(OffsetDateTime::unix_timestamp),
            Some(1_709_283_600)
        );
    }

    #[test]
    fn unparsable_modification_time_is_dropped() {
        let info = FileInfo {
            global: FileRecord {
                modified: "yesterday".into(),
                ..FileRecord::default()
            },
            ..FileInfo::default()
        };

        let mut node = Node::new("a", NodeKind::File);
        node.enrich(&info);
        assert_eq!(node.modified, None);
        assert!(node.indexed);
    }

    #[test]
    fn sync_state_follows_flags() {
        let mut node = Node::new("docs", NodeKind::Directory);
        node.derive_sync_state();
        assert_eq!(node.sync_state, SyncState::Syncing);

        node.ignored = true;
        node.derive_sync_state();
        assert_eq!(node.sync_state, SyncState::Ignored);

        node.partial = true;
        node.derive_sync_state();
        assert_eq!(node.sync_state, SyncState::Syncing);
    }
}
