use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanningError {
    #[error("script contains no blocks")]
    EmptyScript,
    #[error("script block {index} has no narration text")]
    EmptyBlock { index: usize },
    #[error("words per minute must be positive, got {0}")]
    InvalidRate(f64),
    #[error("segment indices must be dense: expected {expected}, found {found}")]
    SparseIndex { expected: usize, found: usize },
    #[error("failed to read script: {0}")]
    Script(String),
}

pub type PlanResult<T> = std::result::Result<T, PlanningError>;
