// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Selective synchronization for Syncthing folders.
//!
//! Syncthing synchronizes whole folders. Leaving parts of a folder out is
//! done through the folder's ignore patterns, which are tedious to keep
//! consistent by hand once directories are only partially wanted. Syncsel
//! presents the folder as a tree of checkboxes instead, and rewrites the
//! ignore patterns to match whatever the user ticked.
//!
//! # See Also
//!
//! 1. [`Folder`]
//! 2. [`synthesize`]
//! 3. [Syncthing ignoring files](https://docs.syncthing.net/users/ignoring.html)

pub mod config;
pub mod folder;
pub mod path;
pub mod syncthing;

pub use config::Settings;
pub use folder::{
    ignores::{synthesize, ChangeSet, IgnoreList},
    node::{Node, NodeKind, SyncState},
    reconcile::reconcile,
    selection::{CheckState, SelectionTracker, SelectionTree},
    Folder, FolderDatabase, IgnoreStore,
};
pub use syncthing::SyncthingClient;
