//! Durable per-job status records.
//!
//! Each job's record lives at `<output_dir>/<job_id>/status.json`. Every
//! mutation of a record runs under that job's lock from the
//! [`LockRegistry`], and writes go through a temporary file and a rename so
//! readers never observe a partial record.

mod locks;
mod types;

pub use locks::LockRegistry;
pub use types::{JobStatus, RenditionPatch, RenditionStatus, ORIGINAL_LABEL};

use chrono::Utc;
use hlsforge_common::paths::{JobLayout, STATUS_FILE};
use hlsforge_common::{Error, JobId, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// JSON-file backed status store.
#[derive(Debug)]
pub struct StatusStore {
    output_dir: PathBuf,
    locks: LockRegistry,
}

impl StatusStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            locks: LockRegistry::new(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn layout(&self, job_id: &JobId) -> JobLayout {
        JobLayout::new(&self.output_dir, job_id)
    }

    /// Read a job's record, `None` if it does not exist.
    pub async fn read(&self, job_id: &JobId) -> Result<Option<JobStatus>> {
        read_record(&self.layout(job_id).status_path()).await
    }

    /// Replace a job's record.
    pub async fn write(&self, job_id: &JobId, status: &JobStatus) -> Result<()> {
        let lock = self.locks.lock_for(job_id);
        let result = {
            let _guard = lock.lock().await;
            self.persist(job_id, status).await
        };
        self.locks.release(job_id, lock);
        result
    }

    /// Atomically read, mutate, and write a job's record.
    ///
    /// A missing record starts from [`JobStatus::new`].
    pub async fn update<F>(&self, job_id: &JobId, mutate: F) -> Result<JobStatus>
    where
        F: FnOnce(&mut JobStatus),
    {
        let lock = self.locks.lock_for(job_id);
        let result = {
            let _guard = lock.lock().await;
            self.read_modify_write(job_id, mutate).await
        };
        self.locks.release(job_id, lock);
        result
    }

    async fn read_modify_write<F>(&self, job_id: &JobId, mutate: F) -> Result<JobStatus>
    where
        F: FnOnce(&mut JobStatus),
    {
        let mut status = self
            .read(job_id)
            .await?
            .unwrap_or_else(|| JobStatus::new(job_id.clone()));
        mutate(&mut status);
        self.persist(job_id, &status).await?;

        Ok(status)
    }

    /// Merge a partial update into one rendition, creating it if needed.
    pub async fn merge_rendition(
        &self,
        job_id: &JobId,
        label: &str,
        patch: RenditionPatch,
    ) -> Result<RenditionStatus> {
        let status = self
            .update(job_id, |status| {
                let entry = status.renditions.entry(label.to_string()).or_default();
                patch.apply(entry, Utc::now());
            })
            .await?;

        status
            .renditions
            .get(label)
            .cloned()
            .ok_or_else(|| Error::internal(format!("rendition {} vanished after merge", label)))
    }

    /// Job namespaces under the output directory that hold a status record.
    pub async fn list_job_ids(&self) -> Result<Vec<JobId>> {
        let mut ids = Vec::new();

        let mut entries = match tokio::fs::read_dir(&self.output_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Ok(job_id) = JobId::new(name) else {
                debug!("Skipping non-job directory {:?}", entry.path());
                continue;
            };
            if tokio::fs::try_exists(entry.path().join(STATUS_FILE)).await? {
                ids.push(job_id);
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Every readable record. Unreadable records are logged and skipped.
    pub async fn list(&self) -> Result<Vec<JobStatus>> {
        let mut statuses = Vec::new();
        for job_id in self.list_job_ids().await? {
            match self.read(&job_id).await {
                Ok(Some(status)) => statuses.push(status),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable status for job {}: {}", job_id, e),
            }
        }
        Ok(statuses)
    }

    async fn persist(&self, job_id: &JobId, status: &JobStatus) -> Result<()> {
        let layout = self.layout(job_id);
        tokio::fs::create_dir_all(layout.root()).await?;

        let json = serde_json::to_vec_pretty(status)?;
        write_atomic(&layout.status_path(), &json).await
    }
}

async fn read_record(path: &Path) -> Result<Option<JobStatus>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write `contents` to `path` via a sibling temporary file and a rename.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::invalid_input(format!("not a file path: {:?}", path)))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    tokio::fs::write(&tmp, contents).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}
