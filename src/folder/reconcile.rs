// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Folder state reconciliation.
//!
//! Turn a bare daemon listing into entries that know whether they are
//! ignored, partially synchronized, or fully synchronized.
//!
//! # Partial Directories
//!
//! The daemon keeps a single `ignored` flag per path. For a directory that
//! only has some of its children excluded, that flag cannot be trusted: it
//! may say ignored while children are still being synchronized through
//! overrides. Unless the daemon reports an explicit `partial` flag, the
//! state of a directory is therefore derived again from the `ignored` flags
//! of the children it actually contains.

use crate::{
    folder::{node::Node, FolderDatabase},
    path::join,
    syncthing::{BrowseEntry, Result},
};

use tracing::{debug, instrument};

/// Enrich the listing of `parent`'s immediate children.
///
/// Looks up the database record of every listed child. Children without a
/// record are returned as-is. Directories get their own children attached
/// from a one level deeper browse of `parent`.
///
/// # Errors
///
/// - Return [`SyncthingError`](crate::syncthing::SyncthingError) if any
///   database lookup fails. Nothing is returned in that case.
#[instrument(skip(database, listing), level = "debug")]
pub async fn reconcile<D>(
    database: &D,
    folder: &str,
    parent: &str,
    listing: Vec<BrowseEntry>,
) -> Result<Vec<Node>>
where
    D: FolderDatabase,
{
    let contents = database.browse(folder, parent, 1).await?;
    let mut nodes = Vec::with_capacity(listing.len());

    for entry in &listing {
        let mut node = Node::from(entry);
        let path = join(parent, &node.name);

        let Some(info) = database.file_info(folder, &path).await? else {
            debug!("no database record for {path:?}, leave it as new local");
            nodes.push(node);
            continue;
        };
        node.enrich(&info);

        if node.is_dir() {
            let known: Vec<Node> = contents
                .iter()
                .find(|content| content.name == node.name)
                .map(|content| content.children.iter().map(Node::from).collect())
                .unwrap_or_default();
            node.children = Some(known);

            match info.local.partial {
                Some(partial) => node.partial = partial,
                None => derive_partial(database, folder, &path, &mut node).await?,
            }
        }

        node.derive_sync_state();
        debug!(
            "reconciled {path:?}: ignored={}, partial={}, state={}",
            node.ignored, node.partial, node.sync_state
        );
        nodes.push(node);
    }

    Ok(nodes)
}

// Count children that are not ignored. A child without a database record
// does not count as selected.
async fn derive_partial<D>(database: &D, folder: &str, path: &str, node: &mut Node) -> Result<()>
where
    D: FolderDatabase,
{
    let children = node.children.as_deref().unwrap_or_default();
    let total = children.len();
    let mut selected = 0;
    for child in children {
        let child_path = join(path, &child.name);
        if let Some(info) = database.file_info(folder, &child_path).await? {
            if !info.local.ignored {
                selected += 1;
            }
        }
    }

    if selected == 0 {
        node.partial = false;
    } else if selected == total {
        node.ignored = false;
        node.partial = false;
    } else {
        node.ignored = false;
        node.partial = true;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        folder::node::{NodeKind, SyncState},
        syncthing::{FileInfo, FileRecord},
    };
    use simple_test_case::test_case;
    use std::collections::HashMap;

    /// In-memory stand-in for the daemon database.
    #[derive(Default)]
    struct FakeDatabase {
        browse: HashMap<String, Vec<BrowseEntry>>,
        records: HashMap<String, FileInfo>,
    }

    impl FakeDatabase {
        fn with_listing(mut self, prefix: &str, entries: Vec<BrowseEntry>) -> Self {
            self.browse.insert(prefix.into(), entries);
            self
        }

        fn with_record(mut self, path: &str, ignored: bool, partial: Option<bool>) -> Self {
            let info = FileInfo {
                global: FileRecord {
                    size: 10,
                    modified: "2024-01-01T00:00:00Z".into(),
                    ..FileRecord::default()
                },
                local: FileRecord {
                    ignored,
                    partial,
                    ..FileRecord::default()
                },
                ..FileInfo::default()
            };
            self.records.insert(path.into(), info);
            self
        }
    }

    impl FolderDatabase for FakeDatabase {
        async fn browse(&self, _: &str, prefix: &str, _: u32) -> Result<Vec<BrowseEntry>> {
            Ok(self.browse.get(prefix).cloned().unwrap_or_default())
        }

        async fn file_info(&self, _: &str, path: &str) -> Result<Option<FileInfo>> {
            Ok(self.records.get(path).cloned())
        }
    }

    fn docs_with_children(flags: &[bool], reported_ignored: bool) -> FakeDatabase {
        let names: Vec<String> = (0..flags.len()).map(|n| format!("f{n}")).collect();
        let mut database = FakeDatabase::default()
            .with_listing(
                "",
                vec![BrowseEntry::new("docs", NodeKind::Directory).with_children(
                    names.iter().map(|name| BrowseEntry::new(name, NodeKind::File)),
                )],
            )
            .with_record("docs", reported_ignored, None);
        for (name, ignored) in names.iter().zip(flags) {
            database = database.with_record(&format!("docs/{name}"), *ignored, None);
        }

        database
    }

    #[test_case(&[false, true, false], true, false, true; "mixed children")]
    #[test_case(&[false, false, false], true, false, false; "all selected")]
    #[test_case(&[true, true, true], true, true, false; "none selected keeps reported flag")]
    #[test_case(&[true, true], false, false, false; "none selected keeps reported inclusion")]
    #[test_case(&[], true, true, false; "empty directory")]
    #[tokio::test]
    async fn directory_partial_derivation(
        flags: &[bool],
        reported_ignored: bool,
        expect_ignored: bool,
        expect_partial: bool,
    ) -> anyhow::Result<()> {
        let database = docs_with_children(flags, reported_ignored);
        let listing = vec![BrowseEntry::new("docs", NodeKind::Directory)];

        let nodes = reconcile(&database, "default", "", listing).await?;

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].ignored, expect_ignored);
        assert_eq!(nodes[0].partial, expect_partial);
        assert_eq!(nodes[0].children.as_ref().map(Vec::len), Some(flags.len()));

        Ok(())
    }

    #[tokio::test]
    async fn explicit_partial_flag_is_trusted() -> anyhow::Result<()> {
        let database = docs_with_children(&[false, false], true)
            .with_record("docs", false, Some(true));
        let listing = vec![BrowseEntry::new("docs", NodeKind::Directory)];

        let nodes = reconcile(&database, "default", "", listing).await?;

        assert!(nodes[0].partial);
        assert!(!nodes[0].ignored);
        assert_eq!(nodes[0].sync_state, SyncState::Syncing);

        Ok(())
    }

    #[tokio::test]
    async fn missing_record_skips_enrichment() -> anyhow::Result<()> {
        let database = FakeDatabase::default().with_record("known.txt", true, None);
        let listing = vec![
            BrowseEntry::new("fresh.txt", NodeKind::File),
            BrowseEntry::new("known.txt", NodeKind::File),
        ];

        let nodes = reconcile(&database, "default", "", listing).await?;

        assert_eq!(nodes[0], Node::new("fresh.txt", NodeKind::File));
        assert!(nodes[1].indexed);
        assert_eq!(nodes[1].size, Some(10));
        assert_eq!(nodes[1].sync_state, SyncState::Ignored);

        Ok(())
    }

    #[tokio::test]
    async fn nested_parent_paths_are_joined() -> anyhow::Result<()> {
        let database = FakeDatabase::default()
            .with_listing(
                "photos",
                vec![BrowseEntry::new("2024", NodeKind::Directory)
                    .with_children([BrowseEntry::new("a.jpg", NodeKind::File)])],
            )
            .with_record("photos/2024", true, None)
            .with_record("photos/2024/a.jpg", false, None);
        let listing = vec![BrowseEntry::new("2024", NodeKind::Directory)];

        let nodes = reconcile(&database, "default", "photos", listing).await?;

        assert!(!nodes[0].ignored);
        assert!(!nodes[0].partial);
        assert_eq!(nodes[0].sync_state, SyncState::Syncing);
        assert_eq!(
            nodes[0].children,
            Some(vec![Node::new("a.jpg", NodeKind::File)])
        );

        Ok(())
    }

    #[tokio::test]
    async fn directory_missing_from_deeper_browse_has_no_children() -> anyhow::Result<()> {
        let database = FakeDatabase::default().with_record("empty", true, None);
        let listing = vec![BrowseEntry::new("empty", NodeKind::Directory)];

        let nodes = reconcile(&database, "default", "", listing).await?;

        assert_eq!(nodes[0].children, Some(Vec::new()));
        assert!(nodes[0].ignored);
        assert_eq!(nodes[0].sync_state, SyncState::Ignored);

        Ok(())
    }
}
