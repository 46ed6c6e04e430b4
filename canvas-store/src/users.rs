//! File-backed identity directory (`<root>/users.yaml`).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use canvas_core::{IdentityService, Service, ServiceError, UserId};

use crate::atomic::{load_yaml, save_yaml};
use crate::error::StoreError;
use crate::paths::check_key;

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: BTreeSet<UserId>,
}

#[derive(Debug)]
pub struct UserDirectory {
    path: PathBuf,
    writes: Mutex<()>,
}

impl UserDirectory {
    pub fn open_at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writes: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds `user`. Returns `false` if it was already registered.
    ///
    /// User ids double as storage folder names, so they follow the same key
    /// rules as record ids.
    pub async fn register(&self, user: &UserId) -> Result<bool, StoreError> {
        check_key(user.as_str())?;
        let _guard = self.writes.lock().await;
        let mut file = self.load().await?;
        if !file.users.insert(user.clone()) {
            return Ok(false);
        }
        save_yaml(&self.path, &file).await?;
        tracing::info!(%user, "user registered");
        Ok(true)
    }

    pub async fn contains(&self, user: &UserId) -> Result<bool, StoreError> {
        Ok(self.load().await?.users.contains(user))
    }

    /// Registered users, sorted.
    pub async fn list(&self) -> Result<Vec<UserId>, StoreError> {
        Ok(self.load().await?.users.into_iter().collect())
    }

    async fn load(&self) -> Result<UsersFile, StoreError> {
        Ok(load_yaml(&self.path).await?.unwrap_or_default())
    }
}

#[async_trait]
impl IdentityService for UserDirectory {
    async fn exists(&self, user: &UserId) -> Result<bool, ServiceError> {
        self.contains(user)
            .await
            .map_err(|err| err.into_service(Service::Identity))
    }
}
