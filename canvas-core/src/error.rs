//! Error types for canvas-core.

use std::fmt;

use thiserror::Error;

use crate::types::{NodeId, ProjectId, UserId};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The collaborator a [`ServiceError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Registry,
    Identity,
    Node,
    Storage,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Registry => write!(f, "registry"),
            Service::Identity => write!(f, "identity service"),
            Service::Node => write!(f, "node service"),
            Service::Storage => write!(f, "storage service"),
        }
    }
}

/// A collaborator call failed. Carried through the orchestrator unchanged.
#[derive(Debug, Error)]
#[error("{service} failed: {source}")]
pub struct ServiceError {
    pub service: Service,
    #[source]
    pub source: BoxError,
}

impl ServiceError {
    pub fn new(service: Service, source: impl Into<BoxError>) -> Self {
        Self {
            service,
            source: source.into(),
        }
    }
}

/// How a project was looked up when it could not be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectRef {
    Id(ProjectId),
    RootNode(NodeId),
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectRef::Id(id) => write!(f, "id {id}"),
            ProjectRef::RootNode(node) => write!(f, "root node {node}"),
        }
    }
}

/// Discriminant of [`ProjectError`], for callers that only branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    IdentityNotFound,
    ProjectNotFound,
    NodeNotFound,
    NotAllowed,
    AmbiguousRootNode,
    MalformedRecord,
    Service,
}

/// All errors a [`crate::ProjectService`] operation can return.
///
/// Validation order is identity, then existence, then ownership; the first
/// failing check decides the variant.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// The initiator, or the user targeted by a listing, does not exist.
    #[error("user not found: {0}")]
    IdentityNotFound(UserId),

    #[error("project not found for {0}")]
    ProjectNotFound(ProjectRef),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// Initiator exists and so does the resource, but the initiator does not own it.
    #[error("user {initiator} is not allowed to act on this project")]
    NotAllowed { initiator: UserId },

    /// More than one project claims the same root node.
    #[error("{matches} projects reference root node {node}")]
    AmbiguousRootNode { node: NodeId, matches: usize },

    /// The registry returned a record that does not decode as a project.
    #[error("malformed project record {id}: {source}")]
    MalformedRecord {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ProjectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProjectError::IdentityNotFound(_) => ErrorKind::IdentityNotFound,
            ProjectError::ProjectNotFound(_) => ErrorKind::ProjectNotFound,
            ProjectError::NodeNotFound(_) => ErrorKind::NodeNotFound,
            ProjectError::NotAllowed { .. } => ErrorKind::NotAllowed,
            ProjectError::AmbiguousRootNode { .. } => ErrorKind::AmbiguousRootNode,
            ProjectError::MalformedRecord { .. } => ErrorKind::MalformedRecord,
            ProjectError::Service(_) => ErrorKind::Service,
        }
    }
}

/// Returned by [`crate::ProjectServiceBuilder::build`] when a collaborator was never supplied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WiringError {
    #[error("project service is missing its {0}")]
    Missing(Service),
}
