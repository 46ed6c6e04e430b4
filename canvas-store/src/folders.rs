//! Per-owner/per-project folders under `<root>/files/`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use canvas_core::{FolderPath, Service, ServiceError, StorageService};

use crate::atomic::{ensure_dir, set_dir_permissions};
use crate::error::{io_err, StoreError};
use crate::paths::check_key;

#[derive(Debug, Clone)]
pub struct FolderStorage {
    root: PathBuf,
}

impl FolderStorage {
    pub fn open_at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<owner>/<project>`. Fails on keys that would leave the root.
    pub fn folder_path(&self, folder: &FolderPath) -> Result<PathBuf, StoreError> {
        check_key(&folder.owner)?;
        check_key(&folder.project)?;
        Ok(self.root.join(&folder.owner).join(&folder.project))
    }

    /// Creates the folder. Existing folders are left untouched.
    pub async fn create(&self, folder: &FolderPath) -> Result<PathBuf, StoreError> {
        let path = self.folder_path(folder)?;
        if let Some(owner_dir) = path.parent() {
            ensure_dir(owner_dir).await?;
        }
        match fs::create_dir(&path).await {
            Ok(()) => set_dir_permissions(&path).await?,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
            Err(err) => return Err(io_err(&path, err)),
        }
        tracing::debug!(folder = %folder, "folder created");
        Ok(path)
    }

    pub async fn exists(&self, folder: &FolderPath) -> Result<bool, StoreError> {
        let path = self.folder_path(folder)?;
        fs::try_exists(&path).await.map_err(|e| io_err(&path, e))
    }

    /// Removes the folder and everything in it.
    pub async fn remove(&self, folder: &FolderPath) -> Result<(), StoreError> {
        let path = self.folder_path(folder)?;
        match fs::remove_dir_all(&path).await {
            Ok(()) => {
                tracing::debug!(folder = %folder, "folder removed");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StoreError::FolderNotFound { path })
            }
            Err(err) => Err(io_err(&path, err)),
        }
    }
}

fn storage_err(err: StoreError) -> ServiceError {
    err.into_service(Service::Storage)
}

#[async_trait]
impl StorageService for FolderStorage {
    async fn create_folder(&self, owner_key: &str, project_key: &str) -> Result<(), ServiceError> {
        self.create(&FolderPath::new(owner_key, project_key))
            .await
            .map(drop)
            .map_err(storage_err)
    }

    async fn remove_folder(&self, path: &FolderPath) -> Result<(), ServiceError> {
        self.remove(path).await.map_err(storage_err)
    }
}
