use hlsforge_common::JobId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Lazily-created async mutex per job.
///
/// The registry's own lock only guards insertion and lookup; it is never held
/// across an await.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<JobId, Arc<tokio::sync::Mutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex serializing mutation of `job_id`'s record.
    pub fn lock_for(&self, job_id: &JobId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(job_id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop `job_id`'s entry once `lock` is the last handle outside the
    /// registry.
    pub fn release(&self, job_id: &JobId, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock();
        let idle = locks
            .get(job_id)
            .map(|held| Arc::ptr_eq(held, &lock) && Arc::strong_count(&lock) == 2)
            .unwrap_or(false);
        if idle {
            locks.remove(job_id);
        }
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}
