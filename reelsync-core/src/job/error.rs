use std::path::PathBuf;

use thiserror::Error;

use super::JobId;

#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("job store path not configured")]
    MissingStore,
    #[error("failed to open job database {path}: {source}")]
    OpenDatabase {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("job payload error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("job {0} already exists")]
    Duplicate(JobId),
    #[error("job {0} not found")]
    NotFound(JobId),
}

pub type JobStoreResult<T> = std::result::Result<T, JobStoreError>;
