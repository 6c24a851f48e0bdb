use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::captions::CaptionMode;
use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReelsyncConfig {
    pub system: SystemSection,
    pub paths: PathsSection,
    pub limits: LimitsSection,
    pub planner: PlannerSection,
    pub timeline: TimelineSection,
    pub transitions: TransitionsSection,
    pub captions: CaptionsSection,
    pub render: RenderSection,
    pub loudnorm: LoudnormSection,
    pub verification: VerificationSection,
    pub collaborators: CollaboratorsSection,
}

impl ReelsyncConfig {
    pub fn resolve_path<P: AsRef<Path>>(&self, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.paths.base_dir).join(path)
        }
    }

    pub fn work_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.work_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.output_dir)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.logs_dir)
    }

    /// Rejects values that would make the pipeline unable to make progress.
    pub fn validate(&self) -> Result<()> {
        if self.limits.media_concurrency == 0 {
            return Err(invalid("limits.media_concurrency", "must be at least 1"));
        }
        if self.limits.render_concurrency == 0 {
            return Err(invalid("limits.render_concurrency", "must be at least 1"));
        }
        if self.planner.words_per_minute <= 0.0 {
            return Err(invalid("planner.words_per_minute", "must be positive"));
        }
        if self.planner.seconds_per_image <= 0.0 {
            return Err(invalid("planner.seconds_per_image", "must be positive"));
        }
        if self.timeline.min_image_seconds <= 0.0 {
            return Err(invalid("timeline.min_image_seconds", "must be positive"));
        }
        if self.timeline.transition_overlap_seconds < 0.0 {
            return Err(invalid(
                "timeline.transition_overlap_seconds",
                "must not be negative",
            ));
        }
        if self.timeline.default_segment_seconds <= 0.0 {
            return Err(invalid("timeline.default_segment_seconds", "must be positive"));
        }
        if self.transitions.zoom_factor < 1.0 {
            return Err(invalid("transitions.zoom_factor", "must be >= 1.0"));
        }
        if self.render.max_attempts == 0 {
            return Err(invalid("render.max_attempts", "must be at least 1"));
        }
        if self.render.fps == 0 {
            return Err(invalid("render.fps", "must be at least 1"));
        }
        if self.collaborators.max_attempts == 0 {
            return Err(invalid("collaborators.max_attempts", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemSection {
    pub node_name: String,
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    pub base_dir: String,
    pub work_dir: String,
    pub output_dir: String,
    pub logs_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsSection {
    pub media_concurrency: usize,
    pub render_concurrency: usize,
    pub segment_timeout_seconds: u64,
    pub job_timeout_seconds: u64,
    pub min_free_disk_mb: u64,
    pub job_retention_hours: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlannerSection {
    pub words_per_minute: f64,
    pub seconds_per_image: f64,
    pub max_images_per_segment: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineSection {
    pub min_image_seconds: f64,
    pub transition_overlap_seconds: f64,
    pub default_segment_seconds: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionsSection {
    pub zoom_factor: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptionsSection {
    pub min_words_per_cue: usize,
    pub default_mode: CaptionMode,
    pub font_name: String,
    pub font_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderSection {
    pub ffmpeg: String,
    pub ffprobe: String,
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
    pub max_attempts: u32,
    pub attempt_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoudnormSection {
    pub enabled: bool,
    pub integrated: f64,
    pub true_peak: f64,
    pub lra: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationSection {
    pub duration_tolerance_seconds: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollaboratorsSection {
    pub max_attempts: u32,
    pub retry_delay_ms: [u64; 2],
    pub jitter_ms: u64,
    pub placeholder_color: String,
    pub placeholder_font_size: u32,
}

pub fn load_reelsync_config<P: AsRef<Path>>(path: P) -> Result<ReelsyncConfig> {
    let config: ReelsyncConfig = load_toml(path)?;
    config.validate()?;
    Ok(config)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
