//! Interfaces of the entity services a project depends on.
//!
//! Each trait has one production implementation in `canvas-store`. Every
//! call may suspend and may fail; failures come back as [`ServiceError`].

use async_trait::async_trait;

use crate::error::{ProjectError, ServiceError};
use crate::types::{FolderPath, NodeAttributes, NodeId, UserId};

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn exists(&self, user: &UserId) -> Result<bool, ServiceError>;

    /// Fails with [`ProjectError::IdentityNotFound`] if `user` is unknown.
    async fn validate_exists(&self, user: &UserId) -> Result<(), ProjectError> {
        if self.exists(user).await? {
            Ok(())
        } else {
            Err(ProjectError::IdentityNotFound(user.clone()))
        }
    }
}

#[async_trait]
pub trait NodeService: Send + Sync {
    /// Creates a node under `parent` (or at top level) and returns its id.
    async fn create(
        &self,
        parent: Option<&NodeId>,
        attributes: NodeAttributes,
    ) -> Result<NodeId, ServiceError>;

    async fn exists(&self, node: &NodeId) -> Result<bool, ServiceError>;

    async fn delete(&self, node: &NodeId) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait StorageService: Send + Sync {
    async fn create_folder(&self, owner_key: &str, project_key: &str) -> Result<(), ServiceError>;

    async fn remove_folder(&self, path: &FolderPath) -> Result<(), ServiceError>;
}
