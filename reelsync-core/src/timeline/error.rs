use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReconcileError {
    #[error("timeline needs at least one segment")]
    NoSegments,
    #[error("segment {index} has no images to display")]
    NoImages { index: usize },
    #[error("timeline invariant violated: {0}")]
    Invariant(String),
}

pub type ReconcileResult<T> = std::result::Result<T, ReconcileError>;
