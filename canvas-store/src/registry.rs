//! File-backed [`Registry`]: one YAML file per record.
//!
//! # Storage layout
//!
//! ```text
//! <dir>/
//!   <id>.yaml     (record body without `id`, mode 0600)
//! ```
//!
//! The file name is the key. `get` and `read` put it back into the `"id"`
//! field of the returned record.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;

use canvas_core::registry::merge_patch;
use canvas_core::{Record, RecordFilter, Registry, Service, ServiceError};

use crate::atomic::{load_yaml, remove_file, save_yaml};
use crate::error::{io_err, StoreError};
use crate::paths::check_key;

const EXTENSION: &str = "yaml";

#[derive(Debug)]
pub struct YamlRegistry {
    dir: PathBuf,
    // Serializes read-modify-write cycles within this process.
    writes: Mutex<()>,
}

impl YamlRegistry {
    /// Opens the registry rooted at `dir`. The directory is created lazily on
    /// first write.
    pub fn open_at(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            writes: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<id>.yaml`; pure, no I/O.
    pub fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{EXTENSION}"))
    }

    pub async fn put(&self, id: &str, mut record: Record) -> Result<(), StoreError> {
        check_key(id)?;
        record.remove("id");
        let _guard = self.writes.lock().await;
        save_yaml(&self.record_path(id), &record).await
    }

    /// An id that could never have been stored reads as absent.
    pub async fn load(&self, id: &str) -> Result<Option<Record>, StoreError> {
        if check_key(id).is_err() {
            return Ok(None);
        }
        let record: Option<Record> = load_yaml(&self.record_path(id)).await?;
        Ok(record.map(|record| with_id(id, record)))
    }

    /// Every record, sorted by id.
    pub async fn load_all(&self) -> Result<Vec<Record>, StoreError> {
        let mut ids = self.ids().await?;
        ids.sort();
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            // A record deleted between listing and loading is simply skipped.
            if let Some(record) = self.load(&id).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub async fn patch(&self, id: &str, patch: Record) -> Result<bool, StoreError> {
        if check_key(id).is_err() {
            return Ok(false);
        }
        let _guard = self.writes.lock().await;
        let path = self.record_path(id);
        let Some(mut record) = load_yaml::<Record>(&path).await? else {
            return Ok(false);
        };
        merge_patch(&mut record, patch);
        record.remove("id");
        save_yaml(&path, &record).await?;
        Ok(true)
    }

    pub async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        if check_key(id).is_err() {
            return Ok(false);
        }
        let _guard = self.writes.lock().await;
        remove_file(&self.record_path(id)).await
    }

    async fn ids(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(io_err(&self.dir, err)),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_err(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            // Stray files that `put` could never have written are not records.
            match path.file_stem().and_then(|stem| stem.to_str()) {
                Some(stem) if check_key(stem).is_ok() => ids.push(stem.to_owned()),
                _ => {}
            }
        }
        Ok(ids)
    }
}

fn with_id(id: &str, mut record: Record) -> Record {
    record.insert("id".to_owned(), Value::from(id));
    record
}

fn registry_err(err: StoreError) -> ServiceError {
    err.into_service(Service::Registry)
}

#[async_trait]
impl Registry for YamlRegistry {
    async fn create(&self, id: &str, record: Record) -> Result<(), ServiceError> {
        self.put(id, record).await.map_err(registry_err)
    }

    async fn get(&self, id: &str) -> Result<Option<Record>, ServiceError> {
        self.load(id).await.map_err(registry_err)
    }

    async fn read(&self, filter: &RecordFilter) -> Result<Vec<Record>, ServiceError> {
        let records = self.load_all().await.map_err(registry_err)?;
        Ok(records
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect())
    }

    async fn update(&self, id: &str, patch: Record) -> Result<bool, ServiceError> {
        self.patch(id, patch).await.map_err(registry_err)
    }

    async fn delete(&self, id: &str) -> Result<bool, ServiceError> {
        self.remove(id).await.map_err(registry_err)
    }
}
