pub mod error;
pub mod models;
pub mod planner;

pub use error::{PlanResult, PlanningError};
pub use models::{AudioRef, EmotionalTone, ImageRef, ScriptBlock, Segment};
pub use planner::{validate_segments, PlannerConfig, SegmentPlanner};
