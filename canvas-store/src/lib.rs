//! # canvas-store
//!
//! File-backed implementations of the collaborators `canvas-core` consumes,
//! all living under one data root (default `~/.canvas`).
//!
//! Call [`Store::open_at`] with an explicit root (tests use a `TempDir`) or
//! [`Store::open`] to use the home directory, then
//! [`Store::project_service`] to get a wired orchestrator.

mod atomic;
pub mod error;
pub mod folders;
pub mod nodes;
pub mod paths;
pub mod registry;
pub mod users;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use canvas_core::ProjectService;

pub use error::StoreError;
pub use folders::FolderStorage;
pub use nodes::{Node, NodeTree};
pub use registry::YamlRegistry;
pub use users::UserDirectory;

/// Every collaborator rooted at a single data directory.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    pub registry: Arc<YamlRegistry>,
    pub users: Arc<UserDirectory>,
    pub nodes: Arc<NodeTree>,
    pub folders: Arc<FolderStorage>,
}

impl Store {
    /// Opens the store under `root`. Nothing is created until the first write.
    pub fn open_at(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            registry: Arc::new(YamlRegistry::open_at(paths::projects_dir(root))),
            users: Arc::new(UserDirectory::open_at(paths::users_path(root))),
            nodes: Arc::new(NodeTree::open_at(paths::nodes_path(root))),
            folders: Arc::new(FolderStorage::open_at(paths::files_root(root))),
        }
    }

    /// `open_at` convenience wrapper over `~/.canvas`.
    pub fn open() -> Result<Self, StoreError> {
        Ok(Self::open_at(&paths::default_root()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_service(&self) -> ProjectService {
        ProjectService::new(
            self.registry.clone(),
            self.users.clone(),
            self.nodes.clone(),
            self.folders.clone(),
        )
    }
}
