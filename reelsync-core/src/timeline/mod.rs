pub mod error;
pub mod models;
pub mod reconciler;

pub use error::{ReconcileError, ReconcileResult};
pub use models::{ImageSlice, TimedSegment, Timeline, DURATION_TOLERANCE_SECONDS};
pub use reconciler::{DurationReconciler, ReconcilerConfig};
