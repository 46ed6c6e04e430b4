//! Project orchestrator: ownership checks and multi-collaborator sequencing.
//!
//! # Validation order
//!
//! Every operation that takes an initiator checks, in this order:
//! 1. the initiator exists ([`ProjectError::IdentityNotFound`])
//! 2. the target exists ([`ProjectError::ProjectNotFound`], [`ProjectError::NodeNotFound`])
//! 3. the initiator owns the target ([`ProjectError::NotAllowed`])
//!
//! Callers rely on this order to tell "absent" apart from "hidden".
//!
//! # Side effects
//!
//! ```text
//! create:  node  -> record -> folder
//! delete:  record -> node  -> folder
//! ```
//!
//! Steps run strictly in sequence. A failing step aborts the operation and
//! earlier steps are left in place; there is no compensation.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::collaborators::{IdentityService, NodeService, StorageService};
use crate::error::{ProjectError, ProjectRef, Service, ServiceError, WiringError};
use crate::registry::{Record, RecordFilter, Registry};
use crate::types::{
    FolderPath, NodeAttributes, NodeId, Project, ProjectCreate, ProjectId, ProjectUpdate, UserId,
    IMMUTABLE_FIELDS,
};

/// Authorization gate and sequencer for project operations.
///
/// Holds only collaborator handles, so clones are cheap and the service can be
/// shared across concurrent requests.
#[derive(Clone)]
pub struct ProjectService {
    registry: Arc<dyn Registry>,
    identity: Arc<dyn IdentityService>,
    nodes: Arc<dyn NodeService>,
    storage: Arc<dyn StorageService>,
}

impl ProjectService {
    pub fn new(
        registry: Arc<dyn Registry>,
        identity: Arc<dyn IdentityService>,
        nodes: Arc<dyn NodeService>,
        storage: Arc<dyn StorageService>,
    ) -> Self {
        Self {
            registry,
            identity,
            nodes,
            storage,
        }
    }

    pub fn builder() -> ProjectServiceBuilder {
        ProjectServiceBuilder::default()
    }

    /// Fails with [`ProjectError::IdentityNotFound`] unless `user` exists.
    pub async fn validate_user(&self, user: &UserId) -> Result<(), ProjectError> {
        self.identity.validate_exists(user).await
    }

    /// All projects owned by `target`. Only `target` may list them.
    pub async fn list_by_owner(
        &self,
        initiator: &UserId,
        target: &UserId,
    ) -> Result<Vec<Project>, ProjectError> {
        debug!(%initiator, %target, "list projects by owner");
        self.validate_user(initiator).await?;
        self.validate_user(target).await?;
        // Ownership is settled by the ids alone; a non-owner never reads records.
        ensure_owner(initiator, target)?;

        let filter = RecordFilter::new().eq("owner_id", target.as_str());
        let records = self
            .registry
            .read(&filter)
            .await
            .map_err(|err| step_failed("read projects", err))?;
        records.into_iter().map(decode).collect()
    }

    pub async fn get_for_owner(
        &self,
        initiator: &UserId,
        project_id: &ProjectId,
    ) -> Result<Project, ProjectError> {
        debug!(%initiator, project = %project_id, "get project");
        self.validate_user(initiator).await?;
        let project = self.fetch(project_id).await?;
        ensure_owner(initiator, &project.owner_id)?;
        Ok(project)
    }

    /// Creates the root node, the record and the storage folder, in that order.
    pub async fn create(
        &self,
        initiator: &UserId,
        fields: ProjectCreate,
    ) -> Result<Project, ProjectError> {
        debug!(%initiator, name = %fields.name, "create project");
        self.validate_user(initiator).await?;

        let node = self
            .nodes
            .create(None, NodeAttributes::project_root())
            .await
            .map_err(|err| step_failed("create root node", err))?;

        let project = Project::new(initiator.clone(), node, fields);
        let record = encode(&project)?;
        self.registry
            .create(project.id.as_str(), record)
            .await
            .map_err(|err| step_failed("persist project", err))?;

        self.storage
            .create_folder(initiator.as_str(), project.id.as_str())
            .await
            .map_err(|err| step_failed("create folder", err))?;

        info!(
            %initiator,
            project = %project.id,
            node = %project.core_node_id,
            "project created"
        );
        Ok(project)
    }

    /// Merges the supplied fields into the stored record.
    pub async fn update(
        &self,
        initiator: &UserId,
        project_id: &ProjectId,
        changes: ProjectUpdate,
    ) -> Result<(), ProjectError> {
        debug!(%initiator, project = %project_id, "update project");
        self.validate_user(initiator).await?;
        let project = self.fetch(project_id).await?;
        ensure_owner(initiator, &project.owner_id)?;

        let patch = update_patch(project_id, &changes)?;
        let updated = self
            .registry
            .update(project_id.as_str(), patch)
            .await
            .map_err(|err| step_failed("update project", err))?;
        if !updated {
            return Err(ProjectError::ProjectNotFound(ProjectRef::Id(
                project_id.clone(),
            )));
        }

        info!(%initiator, project = %project_id, "project updated");
        Ok(())
    }

    /// Deletes the record, the root node and the storage folder, in that order.
    pub async fn delete(
        &self,
        initiator: &UserId,
        project_id: &ProjectId,
    ) -> Result<(), ProjectError> {
        debug!(%initiator, project = %project_id, "delete project");
        self.validate_user(initiator).await?;
        let project = self.fetch(project_id).await?;
        ensure_owner(initiator, &project.owner_id)?;

        let deleted = self
            .registry
            .delete(project_id.as_str())
            .await
            .map_err(|err| step_failed("delete project", err))?;
        if !deleted {
            return Err(ProjectError::ProjectNotFound(ProjectRef::Id(
                project_id.clone(),
            )));
        }

        self.nodes
            .delete(&project.core_node_id)
            .await
            .map_err(|err| step_failed("delete root node", err))?;

        let folder = FolderPath::new(initiator.as_str(), project_id.as_str());
        self.storage
            .remove_folder(&folder)
            .await
            .map_err(|err| step_failed("remove folder", err))?;

        info!(
            %initiator,
            project = %project_id,
            node = %project.core_node_id,
            "project deleted"
        );
        Ok(())
    }

    /// Trusted lookup by root node; performs no authorization.
    pub async fn get_by_root_node(&self, node: &NodeId) -> Result<Project, ProjectError> {
        debug!(%node, "get project by root node");
        self.find_by_root_node(node).await
    }

    pub async fn get_for_owner_by_root_node(
        &self,
        initiator: &UserId,
        node: &NodeId,
    ) -> Result<Project, ProjectError> {
        debug!(%initiator, %node, "get project by root node");
        self.validate_user(initiator).await?;
        let project = self.find_by_root_node(node).await?;
        ensure_owner(initiator, &project.owner_id)?;
        Ok(project)
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    async fn fetch(&self, project_id: &ProjectId) -> Result<Project, ProjectError> {
        let record = self
            .registry
            .get(project_id.as_str())
            .await
            .map_err(|err| step_failed("get project", err))?;
        match record {
            Some(record) => decode(record),
            None => Err(ProjectError::ProjectNotFound(ProjectRef::Id(
                project_id.clone(),
            ))),
        }
    }

    async fn find_by_root_node(&self, node: &NodeId) -> Result<Project, ProjectError> {
        let exists = self
            .nodes
            .exists(node)
            .await
            .map_err(|err| step_failed("check root node", err))?;
        if !exists {
            return Err(ProjectError::NodeNotFound(node.clone()));
        }

        let filter = RecordFilter::new().eq("core_node_id", node.as_str());
        let mut records = self
            .registry
            .read(&filter)
            .await
            .map_err(|err| step_failed("read projects", err))?;
        match records.len() {
            0 => Err(ProjectError::ProjectNotFound(ProjectRef::RootNode(
                node.clone(),
            ))),
            1 => decode(records.remove(0)),
            matches => Err(ProjectError::AmbiguousRootNode {
                node: node.clone(),
                matches,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects collaborators; [`build`](Self::build) refuses to produce a
/// service with any of them missing.
#[derive(Default)]
pub struct ProjectServiceBuilder {
    registry: Option<Arc<dyn Registry>>,
    identity: Option<Arc<dyn IdentityService>>,
    nodes: Option<Arc<dyn NodeService>>,
    storage: Option<Arc<dyn StorageService>>,
}

impl ProjectServiceBuilder {
    pub fn registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn identity(mut self, identity: Arc<dyn IdentityService>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn nodes(mut self, nodes: Arc<dyn NodeService>) -> Self {
        self.nodes = Some(nodes);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn StorageService>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn build(self) -> Result<ProjectService, WiringError> {
        Ok(ProjectService {
            registry: self
                .registry
                .ok_or(WiringError::Missing(Service::Registry))?,
            identity: self
                .identity
                .ok_or(WiringError::Missing(Service::Identity))?,
            nodes: self.nodes.ok_or(WiringError::Missing(Service::Node))?,
            storage: self.storage.ok_or(WiringError::Missing(Service::Storage))?,
        })
    }
}

// ---------------------------------------------------------------------------
// Record mapping
// ---------------------------------------------------------------------------

fn ensure_owner(initiator: &UserId, owner: &UserId) -> Result<(), ProjectError> {
    if initiator == owner {
        Ok(())
    } else {
        Err(ProjectError::NotAllowed {
            initiator: initiator.clone(),
        })
    }
}

fn step_failed(step: &'static str, err: ServiceError) -> ServiceError {
    warn!(error = %err, step, "collaborator call failed");
    err
}

fn decode(record: Record) -> Result<Project, ProjectError> {
    let id = record
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("<missing id>")
        .to_owned();
    serde_json::from_value(Value::Object(record))
        .map_err(|source| ProjectError::MalformedRecord { id, source })
}

/// The record body without `id`, which the registry keys on.
fn encode(project: &Project) -> Result<Record, ProjectError> {
    let mut record = to_record(project.id.as_str(), project)?;
    record.remove("id");
    Ok(record)
}

fn update_patch(project_id: &ProjectId, changes: &ProjectUpdate) -> Result<Record, ProjectError> {
    let mut patch = to_record(project_id.as_str(), changes)?;
    for field in IMMUTABLE_FIELDS {
        patch.remove(field);
    }
    Ok(patch)
}

fn to_record<T: serde::Serialize>(id: &str, value: &T) -> Result<Record, ProjectError> {
    let malformed = |source| ProjectError::MalformedRecord {
        id: id.to_owned(),
        source,
    };
    match serde_json::to_value(value).map_err(malformed)? {
        Value::Object(record) => Ok(record),
        _ => Err(malformed(serde::ser::Error::custom(
            "project fields must serialize to an object",
        ))),
    }
}
