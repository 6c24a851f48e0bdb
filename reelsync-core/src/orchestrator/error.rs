use thiserror::Error;

use crate::job::{FailureKind, JobId, JobState, JobStoreError};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("job {0} is unknown")]
    UnknownJob(JobId),
    #[error("job store error: {0}")]
    Store(#[from] JobStoreError),
    #[error("orchestrator is missing a {0}")]
    MissingCollaborator(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum NotReadyError {
    #[error("job {0} is unknown")]
    Unknown(JobId),
    #[error("job {job_id} is still {state}")]
    InProgress { job_id: JobId, state: JobState },
    #[error("job {job_id} failed ({kind})")]
    Failed { job_id: JobId, kind: FailureKind },
    #[error("job store error: {0}")]
    Store(#[from] JobStoreError),
}

/// Reason a running job stops before completion.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct JobAbort {
    pub kind: FailureKind,
    pub message: String,
}

impl JobAbort {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Internal, message)
    }
}

impl From<JobStoreError> for JobAbort {
    fn from(err: JobStoreError) -> Self {
        JobAbort::internal(err.to_string())
    }
}

impl From<std::io::Error> for JobAbort {
    fn from(err: std::io::Error) -> Self {
        JobAbort::internal(err.to_string())
    }
}
