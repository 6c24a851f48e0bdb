use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::captions::CaptionCue;
use crate::render::{BackendTier, RenderErrorKind, RenderOptions};
use crate::segment::Segment;
use crate::timeline::Timeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Planned,
    AudioReady,
    ImagesReady,
    TimelineBuilt,
    Rendering,
    Verifying,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Planned => "planned",
            JobState::AudioReady => "audio_ready",
            JobState::ImagesReady => "images_ready",
            JobState::TimelineBuilt => "timeline_built",
            JobState::Rendering => "rendering",
            JobState::Verifying => "verifying",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(JobState::Planned),
            "audio_ready" => Ok(JobState::AudioReady),
            "images_ready" => Ok(JobState::ImagesReady),
            "timeline_built" => Ok(JobState::TimelineBuilt),
            "rendering" => Ok(JobState::Rendering),
            "verifying" => Ok(JobState::Verifying),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            other => Err(format!("unknown job state: {other}")),
        }
    }
}

/// Why a job ended in `Failed`, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    Planning,
    Reconcile,
    BackendsExhausted { last: Option<RenderErrorKind> },
    VerificationFailed,
    Cancelled,
    TimedOut,
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Planning => f.write_str("planning"),
            FailureKind::Reconcile => f.write_str("reconcile"),
            FailureKind::BackendsExhausted { last: Some(kind) } => {
                write!(f, "backends_exhausted (last: {kind})")
            }
            FailureKind::BackendsExhausted { last: None } => f.write_str("backends_exhausted"),
            FailureKind::VerificationFailed => f.write_str("verification_failed"),
            FailureKind::Cancelled => f.write_str("cancelled"),
            FailureKind::TimedOut => f.write_str("timed_out"),
            FailureKind::Internal => f.write_str("internal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    RenderFailed { kind: RenderErrorKind, message: String },
    VerificationFailed { reason: String },
    Aborted { reason: String },
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderAttempt {
    pub tier: BackendTier,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: Option<AttemptOutcome>,
}

impl RenderAttempt {
    pub fn start(tier: BackendTier) -> Self {
        Self {
            tier,
            started_at: Utc::now(),
            finished_at: None,
            outcome: None,
        }
    }

    pub fn finish(&mut self, outcome: AttemptOutcome) {
        self.finished_at = Some(Utc::now());
        self.outcome = Some(outcome);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderJob {
    pub id: JobId,
    pub state: JobState,
    pub segments: Vec<Segment>,
    pub options: RenderOptions,
    pub timeline: Option<Timeline>,
    #[serde(default)]
    pub captions: Vec<CaptionCue>,
    #[serde(default)]
    pub attempts: Vec<RenderAttempt>,
    pub backend_tier_used: Option<BackendTier>,
    pub artifact_path: Option<PathBuf>,
    pub captions_path: Option<PathBuf>,
    pub failure: Option<JobFailure>,
    pub audio_ready: bool,
    pub images_ready: bool,
    pub progress_percent: u8,
    pub work_dir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RenderJob {
    pub fn new(segments: Vec<Segment>, options: RenderOptions, work_root: &std::path::Path) -> Self {
        let id = JobId::new();
        let now = Utc::now();
        Self {
            id,
            state: JobState::Planned,
            segments,
            options,
            timeline: None,
            captions: Vec::new(),
            attempts: Vec::new(),
            backend_tier_used: None,
            artifact_path: None,
            captions_path: None,
            failure: None,
            audio_ready: false,
            images_ready: false,
            progress_percent: 0,
            work_dir: work_root.join(id.to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves to `state` and refreshes the progress figure. Progress never
    /// goes backwards, so a re-render after failed verification holds at 90
    /// and a failed job keeps what it had reached.
    pub fn transition(&mut self, state: JobState) {
        self.state = state;
        self.updated_at = Utc::now();
        self.progress_percent = self.progress_percent.max(self.expected_progress());
    }

    pub fn mark_audio_ready(&mut self) {
        self.audio_ready = true;
        self.transition(JobState::AudioReady);
    }

    pub fn mark_images_ready(&mut self) {
        self.images_ready = true;
        self.transition(JobState::ImagesReady);
    }

    pub fn fail(&mut self, kind: FailureKind, message: impl Into<String>) {
        self.failure = Some(JobFailure {
            kind,
            message: message.into(),
        });
        self.transition(JobState::Failed);
    }

    fn expected_progress(&self) -> u8 {
        match self.state {
            JobState::Planned => 0,
            JobState::AudioReady | JobState::ImagesReady => {
                if self.audio_ready && self.images_ready {
                    40
                } else {
                    25
                }
            }
            JobState::TimelineBuilt => 50,
            JobState::Rendering => {
                let extra = self.attempts.len().saturating_sub(1).min(2) as u8;
                60 + 10 * extra
            }
            JobState::Verifying => 90,
            JobState::Completed => 100,
            JobState::Failed => self.progress_percent,
        }
    }

    pub fn degraded_segments(&self) -> Vec<usize> {
        self.timeline
            .as_ref()
            .map(Timeline::degraded_segments)
            .unwrap_or_default()
    }

    pub fn message(&self) -> String {
        match self.state {
            JobState::Completed => {
                let tier = self
                    .backend_tier_used
                    .map(|tier| tier.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                let degraded = self.degraded_segments();
                if degraded.is_empty() {
                    format!("completed with {tier} tier")
                } else {
                    format!("completed with {tier} tier, degraded segments {degraded:?}")
                }
            }
            JobState::Failed => match &self.failure {
                Some(failure) => format!("failed ({}): {}", failure.kind, failure.message),
                None => "failed".to_string(),
            },
            JobState::Planned => "waiting for media".to_string(),
            JobState::AudioReady if !self.images_ready => {
                "narration ready, waiting for images".to_string()
            }
            JobState::ImagesReady if !self.audio_ready => {
                "images ready, waiting for narration".to_string()
            }
            JobState::AudioReady | JobState::ImagesReady => "media ready".to_string(),
            JobState::TimelineBuilt => "timeline reconciled".to_string(),
            JobState::Rendering => match self.attempts.last() {
                Some(attempt) => format!("rendering with {} tier", attempt.tier),
                None => "rendering".to_string(),
            },
            JobState::Verifying => "verifying artifact".to_string(),
        }
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            job_id: self.id,
            state: self.state,
            progress_percent: self.progress_percent,
            message: self.message(),
            backend_tier_used: self.backend_tier_used,
            failure: self.failure.clone(),
            degraded_segments: self.degraded_segments(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: JobId,
    pub state: JobState,
    pub progress_percent: u8,
    pub message: String,
    pub backend_tier_used: Option<BackendTier>,
    pub failure: Option<JobFailure>,
    #[serde(default)]
    pub degraded_segments: Vec<usize>,
}
