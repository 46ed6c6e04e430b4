//! Atomic YAML persistence shared by every store.
//!
//! Write flow: serialize → `<name>.tmp` sibling → `chmod 0600` → `rename`.
//! The `.tmp` file always lives in the target's directory, so the rename never
//! crosses filesystems. Directories are created with mode `0700`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

use crate::error::{io_err, StoreError};

/// Creates `dir` (mode `0700`) if it does not yet exist.
pub(crate) async fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    if fs::try_exists(dir).await.map_err(|e| io_err(dir, e))? {
        return Ok(());
    }
    fs::create_dir_all(dir).await.map_err(|e| io_err(dir, e))?;
    set_dir_permissions(dir).await
}

/// Loads `path`, returning `None` when the file does not exist.
pub(crate) async fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(path, err)),
    };
    serde_yaml::from_str(&contents)
        .map(Some)
        .map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

pub(crate) async fn save_yaml<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let yaml = serde_yaml::to_string(value)?;
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, yaml).await.map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp).await?;
    fs::rename(&tmp, path).await.map_err(|e| io_err(path, e))
}

/// Removes `path`. Returns `false` if it did not exist.
pub(crate) async fn remove_file(path: &Path) -> Result<bool, StoreError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_err(path, err)),
    }
}

pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(unix)]
pub(crate) async fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .await
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
pub(crate) async fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
async fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
async fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}
