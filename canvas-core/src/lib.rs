//! Canvas core library: project domain types, collaborator interfaces, and
//! the project orchestrator.
//!
//! Public API surface:
//! - [`types`]: identifier newtypes, [`Project`] and its create/update payloads
//! - [`error`]: [`ProjectError`] and the collaborator [`ServiceError`]
//! - [`registry`]: the keyed record store interface
//! - [`collaborators`]: identity, node and storage interfaces
//! - [`project_service`]: [`ProjectService`], the authorization gate

pub mod collaborators;
pub mod error;
pub mod project_service;
pub mod registry;
pub mod types;

pub use collaborators::{IdentityService, NodeService, StorageService};
pub use error::{BoxError, ErrorKind, ProjectError, ProjectRef, Service, ServiceError, WiringError};
pub use project_service::{ProjectService, ProjectServiceBuilder};
pub use registry::{Record, RecordFilter, Registry};
pub use types::{
    FolderPath, NodeAttributes, NodeId, Project, ProjectCreate, ProjectId, ProjectUpdate, UserId,
};
