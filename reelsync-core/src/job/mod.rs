pub mod error;
pub mod models;
pub mod sqlite;
pub mod store;

pub use error::{JobStoreError, JobStoreResult};
pub use models::{
    AttemptOutcome, FailureKind, JobFailure, JobId, JobState, JobStatus, RenderAttempt, RenderJob,
};
pub use sqlite::{SqliteJobStore, SqliteJobStoreBuilder};
pub use store::{InMemoryJobStore, JobStore};
