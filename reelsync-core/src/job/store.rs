use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::{JobId, JobStoreError, JobStoreResult, RenderJob};

/// Registry of render jobs owned by the orchestrator. Every call takes the
/// store's single lock, so readers never observe a half-written job.
pub trait JobStore: Send + Sync {
    fn insert(&self, job: &RenderJob) -> JobStoreResult<()>;
    fn update(&self, job: &RenderJob) -> JobStoreResult<()>;
    fn get(&self, id: &JobId) -> JobStoreResult<Option<RenderJob>>;
    /// Returns whether a record was removed.
    fn remove(&self, id: &JobId) -> JobStoreResult<bool>;
    fn list(&self) -> JobStoreResult<Vec<RenderJob>>;
}

#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<JobId, RenderJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, RenderJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, job: &RenderJob) -> JobStoreResult<()> {
        let mut jobs = self.guard();
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::Duplicate(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    fn update(&self, job: &RenderJob) -> JobStoreResult<()> {
        let mut jobs = self.guard();
        match jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job.clone();
                Ok(())
            }
            None => Err(JobStoreError::NotFound(job.id)),
        }
    }

    fn get(&self, id: &JobId) -> JobStoreResult<Option<RenderJob>> {
        Ok(self.guard().get(id).cloned())
    }

    fn remove(&self, id: &JobId) -> JobStoreResult<bool> {
        Ok(self.guard().remove(id).is_some())
    }

    fn list(&self) -> JobStoreResult<Vec<RenderJob>> {
        let mut jobs: Vec<RenderJob> = self.guard().values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }
}
