use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::executor::{run_checked, CommandError, CommandExecutor};
use crate::job::JobStoreError;
use crate::segment::PlanningError;

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("insufficient disk space at {path}: {available_mb} MB free, {required_mb} MB required")]
    InsufficientDisk {
        path: PathBuf,
        available_mb: u64,
        required_mb: u64,
    },
    #[error("invalid segments: {0}")]
    InvalidSegments(#[from] PlanningError),
    #[error("disk probe failed for {path}: {reason}")]
    Probe { path: PathBuf, reason: String },
    #[error("job store error: {0}")]
    Store(#[from] JobStoreError),
}

#[async_trait::async_trait]
pub trait DiskProbe: Send + Sync {
    /// Free bytes available to unprivileged writers on the filesystem
    /// holding `path`.
    async fn available_bytes(&self, path: &Path) -> Result<u64, AdmissionError>;
}

/// Reads free space from POSIX `df -Pk`.
pub struct DfDiskProbe {
    df: PathBuf,
    executor: Arc<dyn CommandExecutor>,
}

impl std::fmt::Debug for DfDiskProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DfDiskProbe").field("df", &self.df).finish()
    }
}

impl DfDiskProbe {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            df: PathBuf::from("df"),
            executor,
        }
    }

    pub fn with_binary(mut self, df: impl Into<PathBuf>) -> Self {
        self.df = df.into();
        self
    }
}

/// Closest ancestor that exists, since the work root may not be created yet.
fn existing_ancestor(path: &Path) -> PathBuf {
    path.ancestors()
        .find(|candidate| candidate.exists())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"))
}

/// Available kilobytes from the last data line of `df -Pk` output.
pub fn parse_df_available_kb(output: &str) -> Option<u64> {
    output
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .last()
        .and_then(|line| line.split_whitespace().nth(3))
        .and_then(|field| field.parse::<u64>().ok())
}

#[async_trait::async_trait]
impl DiskProbe for DfDiskProbe {
    async fn available_bytes(&self, path: &Path) -> Result<u64, AdmissionError> {
        let target = existing_ancestor(path);
        let args = vec!["-Pk".to_string(), target.to_string_lossy().to_string()];
        let output = run_checked(self.executor.as_ref(), &self.df, &args)
            .await
            .map_err(|err: CommandError| AdmissionError::Probe {
                path: target.clone(),
                reason: err.to_string(),
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let kb = parse_df_available_kb(&stdout).ok_or_else(|| AdmissionError::Probe {
            path: target.clone(),
            reason: format!("unexpected df output: {}", stdout.trim()),
        })?;
        Ok(kb * 1024)
    }
}

/// Rejects new jobs while the work root is short on space. Jobs are never
/// queued waiting for space.
#[derive(Clone)]
pub struct AdmissionController {
    probe: Arc<dyn DiskProbe>,
    min_free_mb: u64,
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionController")
            .field("min_free_mb", &self.min_free_mb)
            .finish()
    }
}

impl AdmissionController {
    pub fn new(probe: Arc<dyn DiskProbe>, min_free_mb: u64) -> Self {
        Self { probe, min_free_mb }
    }

    pub fn min_free_mb(&self) -> u64 {
        self.min_free_mb
    }

    /// Returns the free megabytes when the job may start.
    pub async fn check(&self, work_root: &Path) -> Result<u64, AdmissionError> {
        let available_mb = self.probe.available_bytes(work_root).await? / (1024 * 1024);
        if available_mb < self.min_free_mb {
            warn!(
                path = %work_root.display(),
                available_mb,
                required_mb = self.min_free_mb,
                "job rejected for lack of disk space"
            );
            return Err(AdmissionError::InsufficientDisk {
                path: work_root.to_path_buf(),
                available_mb,
                required_mb: self.min_free_mb,
            });
        }
        debug!(available_mb, "disk admission passed");
        Ok(available_mb)
    }
}
