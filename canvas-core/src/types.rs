//! Domain types for projects and the collaborators they reference.
//!
//! Identifiers are newtypes over `String`; the orchestrator never compares a
//! `UserId` against a `NodeId` by accident.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_id!(
    /// Identity of a user known to the identity collaborator.
    UserId
);

string_id!(
    /// Identifier of a project record in the registry.
    ProjectId
);

string_id!(
    /// Identifier of a hierarchical content node.
    NodeId
);

impl ProjectId {
    /// Fresh random (v4) project identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// Field names the orchestrator never lets a caller overwrite.
pub const IMMUTABLE_FIELDS: [&str; 4] = ["id", "owner_id", "core_node_id", "created_at"];

/// A project record as persisted in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub owner_id: UserId,
    pub core_node_id: NodeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Builds a fresh record owned by `owner` and anchored at `core_node_id`.
    pub fn new(owner: UserId, core_node_id: NodeId, fields: ProjectCreate) -> Self {
        Self {
            id: ProjectId::generate(),
            owner_id: owner,
            core_node_id,
            name: fields.name,
            description: fields.description,
            metadata: fields.metadata,
            created_at: Utc::now(),
        }
    }
}

/// Caller-supplied fields for a new project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCreate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ProjectCreate {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Partial update. `None` fields keep their stored value; unknown keys in a
/// deserialized payload are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl ProjectUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.metadata.is_none()
    }
}

// ---------------------------------------------------------------------------
// Node attributes
// ---------------------------------------------------------------------------

/// Presentation attributes handed to the node collaborator on creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAttributes {
    pub type_id: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

impl NodeAttributes {
    /// Top-level container every project is anchored on.
    pub fn project_root() -> Self {
        let attrs = BTreeMap::from([
            ("direction".to_owned(), "flex-col".to_owned()),
            ("background".to_owned(), "#ffffff".to_owned()),
        ]);
        Self {
            type_id: "container".to_owned(),
            attrs,
        }
    }
}

// ---------------------------------------------------------------------------
// Storage folder key
// ---------------------------------------------------------------------------

/// Per-owner/per-project folder key, rendered as `owner/project`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderPath {
    pub owner: String,
    pub project: String,
}

impl FolderPath {
    pub fn new(owner: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            project: project.into(),
        }
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.project)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
