// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Local filesystem merge.
//!
//! The daemon database only knows about what has been scanned or announced
//! by other devices. Merging the directory on disk into a reconciled
//! listing reveals entries the daemon does not know about yet, conflict
//! copies, and ignored entries that still occupy disk space.

use crate::folder::node::{LocalInfo, Node, NodeKind, SyncState};

use std::{collections::HashMap, fs, io, path::Path};
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

/// Marker Syncthing puts into the name of conflict copies.
const CONFLICT_MARKER: &str = ".sync-conflict-";

/// Bookkeeping entries Syncthing keeps inside a folder.
const BOOKKEEPING: [&str; 3] = [".stfolder", ".stignore", ".stversions"];

/// Merge local directory contents into reconciled nodes.
///
/// Nodes present on disk get their [`LocalInfo`] attached and their sync
/// state refined. Entries that exist only on disk are appended in name
/// order. A directory that does not exist on disk leaves the nodes as they
/// are.
///
/// # Errors
///
/// - Return [`io::Error`] if the directory exists but cannot be read.
#[instrument(skip(nodes, dir), level = "debug")]
pub fn merge_local(nodes: &mut Vec<Node>, dir: impl AsRef<Path>) -> io::Result<()> {
    let dir = dir.as_ref();
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            debug!("{:?} does not exist locally", dir.display());
            return Ok(());
        }
        Err(error) => return Err(error),
    };

    let mut on_disk = HashMap::new();
    for entry in read_dir {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            warn!("skip non UTF-8 entry {:?}", entry.path().display());
            continue;
        };
        if is_bookkeeping(&name) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(error) => {
                warn!("skip unreadable entry {:?}: {error}", entry.path().display());
                continue;
            }
        };
        on_disk.insert(name, metadata);
    }

    for node in nodes.iter_mut() {
        if let Some(metadata) = on_disk.remove(&node.name) {
            node.local = Some(local_info(&metadata));
            node.sync_state = local_state(node);
        }
    }

    let mut local_only: Vec<_> = on_disk.into_iter().collect();
    local_only.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (name, metadata) in local_only {
        let kind = if metadata.is_dir() {
            NodeKind::Directory
        } else if metadata.is_symlink() {
            NodeKind::Symlink
        } else {
            NodeKind::File
        };

        let mut node = Node::new(name, kind);
        node.local = Some(local_info(&metadata));
        node.sync_state = local_state(&node);
        debug!("{:?} only exists locally", node.name);
        nodes.push(node);
    }

    Ok(())
}

fn local_state(node: &Node) -> SyncState {
    if node.name.contains(CONFLICT_MARKER) {
        SyncState::Conflict
    } else if !node.indexed {
        SyncState::NewLocal
    } else if node.sync_state == SyncState::Ignored {
        SyncState::ExistsLocally
    } else {
        node.sync_state
    }
}

fn local_info(metadata: &fs::Metadata) -> LocalInfo {
    LocalInfo {
        size: metadata.len(),
        modified: metadata.modified().ok().map(OffsetDateTime::from),
    }
}

fn is_bookkeeping(name: &str) -> bool {
    BOOKKEEPING.contains(&name)
        || (name.starts_with("~syncthing~") && name.ends_with(".tmp"))
        || (name.starts_with(".syncthing.") && name.ends_with(".tmp"))
}
