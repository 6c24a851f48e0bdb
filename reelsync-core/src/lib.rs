pub mod admission;
pub mod captions;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod executor;
pub mod job;
pub mod media;
pub mod orchestrator;
pub mod render;
pub mod segment;
pub mod timeline;
pub mod transition;

pub use admission::{AdmissionController, AdmissionError, DfDiskProbe, DiskProbe};
pub use captions::{to_srt, CaptionAligner, CaptionConfig, CaptionCue, CaptionMode};
pub use collaborators::{
    GenerationError, ImageGenerator, PlaceholderPainter, RetryPolicy, SpeechSynthesizer,
    SynthesisError,
};
pub use config::{load_reelsync_config, ReelsyncConfig};
pub use error::{ConfigError, Result};
pub use executor::{CommandError, CommandExecutor, SystemCommandExecutor};
pub use job::{
    FailureKind, InMemoryJobStore, JobId, JobState, JobStatus, JobStore, JobStoreError,
    RenderJob, SqliteJobStore, SqliteJobStoreBuilder,
};
pub use media::{FfprobeProber, MediaInfo, MediaProber, ProbeError};
pub use orchestrator::{
    AssemblyOrchestrator, CancelAck, NotReadyError, OrchestratorBuilder, OrchestratorError,
    OrchestratorSettings, OrchestratorSummary, SweepReport,
};
pub use render::{
    default_tiers, Artifact, BackendTier, RenderBackend, RenderError, RenderErrorKind,
    RenderOptions, RenderRequest, RenderSettings,
};
pub use segment::{
    validate_segments, AudioRef, EmotionalTone, ImageRef, PlanResult, PlannerConfig,
    PlanningError, ScriptBlock, Segment, SegmentPlanner,
};
pub use timeline::{
    DurationReconciler, ImageSlice, ReconcileError, ReconcilerConfig, TimedSegment, Timeline,
};
pub use transition::{CrossfadePlan, TransitionCompositor, TransitionConfig, TransitionSet, ZoomPlan};
