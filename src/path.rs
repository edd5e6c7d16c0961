// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, and for paths inside a synchronized folder.

use std::path::PathBuf;

/// Determine default absolute path to the configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/syncsel/config.toml` as
/// the default absolute path. Does not check if the path returned actually
/// exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if configuration directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("syncsel").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Join a folder-relative parent path and an entry name with `/`.
///
/// The folder root is the empty string, so its children are addressed by
/// their bare name.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{name}", parent.trim_end_matches('/'))
    }
}

/// List every proper ancestor of a folder-relative path, root first.
///
/// The folder root itself is included as the empty string.
pub fn ancestors(path: &str) -> Vec<String> {
    let mut out = vec![String::new()];
    let mut current = String::new();
    let components: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    for component in components.iter().take(components.len().saturating_sub(1)) {
        current = join(&current, component);
        out.push(current.clone());
    }

    out
}

/// Strip leading and trailing separators from user supplied paths.
pub fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// No way to determine user's configuration directory.
///
/// # See Also
///
/// - [`dirs::config_dir`](https://docs.rs/dirs/latest/dirs/fn.config_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's configuration directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
