//! File-backed content node table (`<root>/nodes.yaml`).
//!
//! Nodes form a forest: each node has an optional parent, and deleting a node
//! deletes its whole subtree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use canvas_core::{NodeAttributes, NodeId, NodeService, Service, ServiceError};

use crate::atomic::{load_yaml, save_yaml};
use crate::error::StoreError;

/// One stored node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    #[serde(flatten)]
    pub attributes: NodeAttributes,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct NodesFile {
    #[serde(default)]
    nodes: BTreeMap<NodeId, Node>,
}

#[derive(Debug)]
pub struct NodeTree {
    path: PathBuf,
    writes: Mutex<()>,
}

impl NodeTree {
    pub fn open_at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writes: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inserts a node under `parent` (which must exist) and returns its id.
    pub async fn insert(
        &self,
        parent: Option<&NodeId>,
        attributes: NodeAttributes,
    ) -> Result<NodeId, StoreError> {
        let _guard = self.writes.lock().await;
        let mut file = self.load().await?;
        if let Some(parent) = parent {
            if !file.nodes.contains_key(parent) {
                return Err(StoreError::NodeNotFound(parent.clone()));
            }
        }
        let id = NodeId::from(Uuid::new_v4().to_string());
        file.nodes.insert(
            id.clone(),
            Node {
                parent: parent.cloned(),
                attributes,
            },
        );
        save_yaml(&self.path, &file).await?;
        tracing::debug!(node = %id, "node created");
        Ok(id)
    }

    pub async fn get(&self, node: &NodeId) -> Result<Option<Node>, StoreError> {
        Ok(self.load().await?.nodes.remove(node))
    }

    /// Direct children of `node`, sorted by id.
    pub async fn children(&self, node: &NodeId) -> Result<Vec<NodeId>, StoreError> {
        let file = self.load().await?;
        Ok(file
            .nodes
            .into_iter()
            .filter(|(_, child)| child.parent.as_ref() == Some(node))
            .map(|(id, _)| id)
            .collect())
    }

    /// Removes `node` and its descendants. Returns the number of nodes removed.
    pub async fn remove(&self, node: &NodeId) -> Result<usize, StoreError> {
        let _guard = self.writes.lock().await;
        let mut file = self.load().await?;
        if !file.nodes.contains_key(node) {
            return Err(StoreError::NodeNotFound(node.clone()));
        }

        let mut doomed = vec![node.clone()];
        let mut cursor = 0;
        while cursor < doomed.len() {
            let current = doomed[cursor].clone();
            doomed.extend(
                file.nodes
                    .iter()
                    .filter(|(_, n)| n.parent.as_ref() == Some(&current))
                    .map(|(id, _)| id.clone()),
            );
            cursor += 1;
        }
        for id in &doomed {
            file.nodes.remove(id);
        }
        save_yaml(&self.path, &file).await?;
        tracing::debug!(%node, removed = doomed.len(), "node subtree deleted");
        Ok(doomed.len())
    }

    async fn load(&self) -> Result<NodesFile, StoreError> {
        Ok(load_yaml(&self.path).await?.unwrap_or_default())
    }
}

fn node_err(err: StoreError) -> ServiceError {
    err.into_service(Service::Node)
}

#[async_trait]
impl NodeService for NodeTree {
    async fn create(
        &self,
        parent: Option<&NodeId>,
        attributes: NodeAttributes,
    ) -> Result<NodeId, ServiceError> {
        self.insert(parent, attributes).await.map_err(node_err)
    }

    async fn exists(&self, node: &NodeId) -> Result<bool, ServiceError> {
        Ok(self.get(node).await.map_err(node_err)?.is_some())
    }

    async fn delete(&self, node: &NodeId) -> Result<(), ServiceError> {
        self.remove(node).await.map(drop).map_err(node_err)
    }
}
