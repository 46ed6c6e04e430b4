//! Layout of the data root.
//!
//! ```text
//! <root>/                 (default: ~/.canvas)
//!   users.yaml            identity directory
//!   nodes.yaml            content node table
//!   projects/<id>.yaml    one registry record per project
//!   files/<owner>/<project>/
//! ```

use std::path::{Path, PathBuf};

use crate::error::StoreError;

pub const ROOT_DIR: &str = ".canvas";

pub fn canvas_root(home: &Path) -> PathBuf {
    home.join(ROOT_DIR)
}

/// `~/.canvas`, derived from `dirs::home_dir()`.
pub fn default_root() -> Result<PathBuf, StoreError> {
    dirs::home_dir()
        .map(|home| canvas_root(&home))
        .ok_or(StoreError::HomeNotFound)
}

pub fn projects_dir(root: &Path) -> PathBuf {
    root.join("projects")
}

pub fn users_path(root: &Path) -> PathBuf {
    root.join("users.yaml")
}

pub fn nodes_path(root: &Path) -> PathBuf {
    root.join("nodes.yaml")
}

pub fn files_root(root: &Path) -> PathBuf {
    root.join("files")
}

/// Rejects keys that would escape their directory when used as a path segment.
pub(crate) fn check_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\'])
        || key.ends_with(".tmp");
    if bad {
        return Err(StoreError::InvalidKey(key.to_owned()));
    }
    Ok(())
}
