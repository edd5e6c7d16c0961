// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Folder domain representation.
//!
//! A __folder__ is a directory tree that the Syncthing daemon keeps in sync
//! between devices, identified by its folder ID. Syncsel edits which parts
//! of a folder get synchronized on this device.
//!
//! # Selective Synchronization
//!
//! Syncthing has no notion of "selected" subdirectories. All it offers is a
//! per-folder list of ignore patterns. Selective synchronization is built
//! on top of that list: the user ticks entries in a tri-state tree, and
//! syncsel rewrites the ignore list so that the daemon includes exactly
//! what was ticked, while leaving every pattern the user did not touch
//! alone.
//!
//! A session with a folder goes through three steps:
//!
//! 1. Load. Directories are listed lazily, one level at a time. Each listing
//!    is reconciled against the daemon's database so that every entry knows
//!    if it is synchronized, ignored, or partially synchronized. This also
//!    captures the selection baseline.
//! 2. Edit. Entries get checked or unchecked in the [`SelectionTree`].
//! 3. Submit. The difference between the selection and its baseline is
//!    collected into a [`ChangeSet`] together with the current ignore list,
//!    synthesized into a new ignore list, and written back wholesale.
//!
//! # See Also
//!
//! 1. [`reconcile`](crate::folder::reconcile)
//! 2. [`ignores`](crate::folder::ignores)
//! 3. [`selection`](crate::folder::selection)

pub mod ignores;
pub mod local;
pub mod node;
pub mod reconcile;
pub mod selection;

use crate::{
    folder::{
        ignores::{ChangeSet, IgnoreList},
        local::merge_local,
        node::Node,
        reconcile::reconcile,
        selection::SelectionTree,
    },
    path::ancestors,
    syncthing::{BrowseEntry, FileInfo, SyncthingClient},
};

use std::path::PathBuf;
use tracing::{debug, info, instrument};

/// Access to the daemon's folder database.
#[allow(async_fn_in_trait)]
pub trait FolderDatabase {
    /// List entries below `prefix`, descending `levels` extra levels.
    async fn browse(
        &self,
        folder: &str,
        prefix: &str,
        levels: u32,
    ) -> crate::syncthing::Result<Vec<BrowseEntry>>;

    /// Fetch database record of a path, `None` if the daemon has none.
    async fn file_info(
        &self,
        folder: &str,
        path: &str,
    ) -> crate::syncthing::Result<Option<FileInfo>>;
}

/// Access to the daemon's per-folder ignore list.
#[allow(async_fn_in_trait)]
pub trait IgnoreStore {
    /// Read current ignore list.
    async fn ignores(&self, folder: &str) -> crate::syncthing::Result<IgnoreList>;

    /// Replace ignore list wholesale.
    async fn set_ignores(&self, folder: &str, ignores: &IgnoreList) -> crate::syncthing::Result<()>;
}

/// Selective synchronization session with one folder.
///
/// Holds the selection tree of the folder, and optionally the folder's
/// location on this device so that listings can be merged with what is on
/// disk.
#[derive(Debug)]
pub struct Folder<D = SyncthingClient>
where
    D: FolderDatabase + IgnoreStore,
{
    id: String,
    local_root: Option<PathBuf>,
    database: D,
    selection: SelectionTree,
}

impl<D> Folder<D>
where
    D: FolderDatabase + IgnoreStore,
{
    /// Construct new session.
    pub fn new(id: impl Into<String>, database: D) -> Self {
        Self {
            id: id.into(),
            local_root: None,
            database,
            selection: SelectionTree::new(),
        }
    }

    /// Merge listings with the folder's contents at `root` on this device.
    pub fn with_local_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.local_root = Some(root.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn database(&self) -> &D {
        &self.database
    }

    pub fn selection(&self) -> &SelectionTree {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionTree {
        &mut self.selection
    }

    /// Start over with the top-level listing of the folder.
    ///
    /// Drops every pending selection edit.
    ///
    /// # Errors
    ///
    /// - Return [`FolderError::Syncthing`] if the daemon cannot be queried.
    /// - Return [`FolderError::Local`] if the local directory is unreadable.
    pub async fn load(&mut self) -> Result<Vec<Node>> {
        info!("load folder {:?}", self.id);
        self.selection = SelectionTree::new();
        self.expand("").await
    }

    /// List and reconcile the children of a loaded directory.
    ///
    /// The selection tree is only touched once the whole listing has been
    /// reconciled.
    ///
    /// # Errors
    ///
    /// - Return [`FolderError::Syncthing`] if the daemon cannot be queried.
    /// - Return [`FolderError::Local`] if the local directory is unreadable.
    /// - Return [`FolderError::Selection`] if `path` is not loaded yet.
    #[instrument(skip(self), level = "debug")]
    pub async fn expand(&mut self, path: &str) -> Result<Vec<Node>> {
        if !self.selection.contains(path) {
            return Err(selection::SelectionError::UnknownPath(path.to_string()).into());
        }

        let listing = self.database.browse(&self.id, path, 0).await?;
        debug!("listing of {path:?}: {} entries", listing.len());
        let mut nodes = reconcile(&self.database, &self.id, path, listing).await?;

        if let Some(root) = &self.local_root {
            merge_local(&mut nodes, root.join(path))?;
        }

        self.selection.insert_children(path, &nodes)?;
        Ok(nodes)
    }

    /// Expand every ancestor of `path` that has not been expanded yet.
    ///
    /// Loads the folder first if nothing was loaded so far.
    ///
    /// # Errors
    ///
    /// - Return [`FolderError::Selection`] if an ancestor, or `path` itself,
    ///   does not exist in the folder.
    /// - Return errors of [`Folder::expand`].
    pub async fn expand_to(&mut self, path: &str) -> Result<()> {
        for ancestor in ancestors(path) {
            if !self.selection.is_expanded(&ancestor) {
                self.expand(&ancestor).await?;
            }
        }

        if !self.selection.contains(path) {
            return Err(selection::SelectionError::UnknownPath(path.to_string()).into());
        }

        Ok(())
    }

    /// List the children of `path`, loading only what is missing.
    ///
    /// Directories that are already expanded are not listed again, so
    /// pending edits and earlier listings are reused as they are.
    ///
    /// # Errors
    ///
    /// - Return errors of [`Folder::expand_to`] and [`Folder::expand`].
    pub async fn list(&mut self, path: &str) -> Result<Vec<Node>> {
        self.expand_to(path).await?;
        if !self.selection.is_expanded(path) {
            self.expand(path).await?;
        }

        Ok(self
            .selection
            .children(path)
            .into_iter()
            .filter_map(|child| self.selection.node(child).cloned())
            .collect())
    }

    /// Collect selection edits against the folder's current ignore list.
    ///
    /// # Errors
    ///
    /// - Return [`FolderError::Syncthing`] if the ignore list cannot be read.
    pub async fn change_set(&self) -> Result<ChangeSet> {
        let ignores = self.database.ignores(&self.id).await?;
        Ok(ChangeSet::collect(&self.selection, ignores))
    }

    /// Write new ignore list, and accept the current selection as baseline.
    ///
    /// # Errors
    ///
    /// - Return [`FolderError::Syncthing`] if the ignore list cannot be
    ///   written. The baseline is left untouched in that case.
    pub async fn submit(&mut self, ignores: &IgnoreList) -> Result<()> {
        info!("submit {} ignore patterns for folder {:?}", ignores.len(), self.id);
        self.database.set_ignores(&self.id, ignores).await?;
        self.selection.rebaseline();
        Ok(())
    }

    /// Fetch the daemon's database record for a path.
    ///
    /// # Errors
    ///
    /// - Return [`FolderError::Syncthing`] if the daemon cannot be queried.
    pub async fn file_info(&self, path: &str) -> Result<Option<FileInfo>> {
        Ok(self.database.file_info(&self.id, path).await?)
    }
}

/// Folder session error types.
#[derive(Debug, thiserror::Error)]
pub enum FolderError {
    /// Daemon queries fail.
    #[error(transparent)]
    Syncthing(#[from] crate::syncthing::SyncthingError),

    /// Selection tree is asked about paths it does not hold.
    #[error(transparent)]
    Selection(#[from] crate::folder::selection::SelectionError),

    /// Local directory cannot be read.
    #[error("failed to read local folder contents")]
    Local(#[from] std::io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = FolderError> = std::result::Result<T, E>;
