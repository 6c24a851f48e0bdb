pub mod emergency;
pub mod fallback;
pub mod ffmpeg;
pub mod pipeline;
pub mod primary;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::captions::{CaptionCue, CaptionConfig, CaptionMode};
use crate::config::ReelsyncConfig;
use crate::executor::CommandExecutor;
use crate::timeline::Timeline;
use crate::transition::TransitionSet;

pub use emergency::EmergencyBackend;
pub use fallback::FallbackBackend;
pub use primary::PrimaryBackend;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BackendTier {
    Primary,
    Fallback,
    Emergency,
}

impl BackendTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendTier::Primary => "primary",
            BackendTier::Fallback => "fallback",
            BackendTier::Emergency => "emergency",
        }
    }
}

impl fmt::Display for BackendTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RenderErrorKind {
    MissingAudioTrack,
    CodecFailure,
    TimeoutExceeded,
    ResourceExhausted,
}

impl RenderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderErrorKind::MissingAudioTrack => "missing_audio_track",
            RenderErrorKind::CodecFailure => "codec_failure",
            RenderErrorKind::TimeoutExceeded => "timeout_exceeded",
            RenderErrorKind::ResourceExhausted => "resource_exhausted",
        }
    }
}

impl fmt::Display for RenderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind}: {message}")]
pub struct RenderError {
    pub kind: RenderErrorKind,
    pub message: String,
}

impl RenderError {
    pub fn new(kind: RenderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn missing_audio(message: impl Into<String>) -> Self {
        Self::new(RenderErrorKind::MissingAudioTrack, message)
    }

    pub fn codec(message: impl Into<String>) -> Self {
        Self::new(RenderErrorKind::CodecFailure, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(RenderErrorKind::TimeoutExceeded, message)
    }

    pub fn exhausted(message: impl Into<String>) -> Self {
        Self::new(RenderErrorKind::ResourceExhausted, message)
    }
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::exhausted(err.to_string())
    }
}

pub type RenderResult<T> = std::result::Result<T, RenderError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderOptions {
    /// Unset means the configured `captions.default_mode`.
    #[serde(default)]
    pub caption_mode: Option<CaptionMode>,
    #[serde(default)]
    pub retain_intermediates: bool,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default)]
    pub style: Option<String>,
}

fn default_speed() -> f32 {
    1.0
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            caption_mode: None,
            retain_intermediates: false,
            voice: None,
            speed: default_speed(),
            style: None,
        }
    }
}

impl RenderOptions {
    pub fn with_caption_mode(mut self, mode: CaptionMode) -> Self {
        self.caption_mode = Some(mode);
        self
    }

    pub fn resolved_caption_mode(&self) -> CaptionMode {
        self.caption_mode.unwrap_or_default()
    }

    pub fn with_retain_intermediates(mut self, retain: bool) -> Self {
        self.retain_intermediates = retain;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub job_id: String,
    pub timeline: Timeline,
    pub transitions: TransitionSet,
    pub captions: Vec<CaptionCue>,
    pub options: RenderOptions,
    pub work_dir: PathBuf,
}

impl RenderRequest {
    pub fn burn_captions(&self) -> bool {
        self.options.resolved_caption_mode() == CaptionMode::Burned && !self.captions.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    pub path: PathBuf,
    pub tier: BackendTier,
    pub has_audio: bool,
    pub duration_seconds: f64,
}

#[async_trait::async_trait]
pub trait RenderBackend: Send + Sync {
    fn tier(&self) -> BackendTier;

    async fn render(&self, request: &RenderRequest) -> RenderResult<Artifact>;
}

#[derive(Debug, Clone)]
pub struct LoudnormSettings {
    pub enabled: bool,
    pub integrated: f64,
    pub true_peak: f64,
    pub lra: f64,
}

impl LoudnormSettings {
    pub fn filter(&self) -> String {
        format!(
            "loudnorm=I={}:TP={}:LRA={}",
            self.integrated, self.true_peak, self.lra
        )
    }
}

/// Encoder settings shared by every tier.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub ffmpeg: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub pix_fmt: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub sample_rate: u32,
    pub log_level: String,
    pub loudnorm: LoudnormSettings,
    pub captions: CaptionConfig,
    pub card_color: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            width: 1024,
            height: 576,
            fps: 24,
            video_codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 20,
            pix_fmt: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            sample_rate: 48_000,
            log_level: "error".to_string(),
            loudnorm: LoudnormSettings {
                enabled: true,
                integrated: -16.0,
                true_peak: -1.5,
                lra: 11.0,
            },
            captions: CaptionConfig::default(),
            card_color: "0x001428".to_string(),
        }
    }
}

impl From<&ReelsyncConfig> for RenderSettings {
    fn from(config: &ReelsyncConfig) -> Self {
        let render = &config.render;
        Self {
            ffmpeg: PathBuf::from(&render.ffmpeg),
            width: render.width,
            height: render.height,
            fps: render.fps,
            video_codec: render.video_codec.clone(),
            preset: render.preset.clone(),
            crf: render.crf,
            pix_fmt: render.pix_fmt.clone(),
            audio_codec: render.audio_codec.clone(),
            audio_bitrate: render.audio_bitrate.clone(),
            sample_rate: render.sample_rate,
            log_level: render.log_level.clone(),
            loudnorm: LoudnormSettings {
                enabled: config.loudnorm.enabled,
                integrated: config.loudnorm.integrated,
                true_peak: config.loudnorm.true_peak,
                lra: config.loudnorm.lra,
            },
            captions: CaptionConfig::from(&config.captions),
            card_color: config.collaborators.placeholder_color.clone(),
        }
    }
}

/// Primary, Fallback and Emergency in escalation order.
pub fn default_tiers(
    settings: RenderSettings,
    executor: Arc<dyn CommandExecutor>,
) -> Vec<Arc<dyn RenderBackend>> {
    vec![
        Arc::new(PrimaryBackend::new(settings.clone(), executor.clone())),
        Arc::new(FallbackBackend::new(settings.clone(), executor.clone())),
        Arc::new(EmergencyBackend::new(settings, executor)),
    ]
}
