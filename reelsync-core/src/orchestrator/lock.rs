use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::job::JobId;

use super::error::JobAbort;

pub const LOCK_FILE_NAME: &str = ".render.lock";

/// Single-writer guard over each job's work directory: an in-process async
/// mutex per job plus an exclusive lock file for other processes.
#[derive(Debug, Default)]
pub struct JobLocks {
    locks: Mutex<HashMap<JobId, Arc<AsyncMutex<()>>>>,
}

#[derive(Debug)]
pub struct RenderLockGuard {
    _guard: OwnedMutexGuard<()>,
    path: PathBuf,
}

impl RenderLockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RenderLockGuard {
    fn drop(&mut self) {
        if let Err(error) = std::fs::remove_file(&self.path) {
            debug!(path = %self.path.display(), %error, "lock file already gone");
        }
    }
}

impl JobLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn mutex_for(&self, id: JobId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(id).or_default().clone()
    }

    pub(crate) async fn acquire(
        &self,
        id: JobId,
        work_dir: &Path,
    ) -> Result<RenderLockGuard, JobAbort> {
        let guard = self.mutex_for(id).lock_owned().await;
        let path = work_dir.join(LOCK_FILE_NAME);
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|err| {
                JobAbort::internal(format!(
                    "work directory lock {} unavailable: {err}",
                    path.display()
                ))
            })?;
        let _ = writeln!(file, "{}", std::process::id());
        Ok(RenderLockGuard {
            _guard: guard,
            path,
        })
    }

    pub fn forget(&self, id: &JobId) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lock_file_is_exclusive_and_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let locks = JobLocks::new();
        let id = JobId::new();
        let guard = locks.acquire(id, dir.path()).await.unwrap();
        assert!(guard.path().exists());

        // Another process holding the file blocks acquisition.
        let other = JobLocks::new();
        assert!(other.acquire(id, dir.path()).await.is_err());

        let path = guard.path().to_path_buf();
        drop(guard);
        assert!(!path.exists());
        let again = locks.acquire(id, dir.path()).await.unwrap();
        drop(again);
    }
}
