use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::captions::{to_srt, CaptionCue};
use crate::executor::{command_line, run_checked, CommandError, CommandExecutor};
use crate::timeline::Timeline;

use super::{BackendTier, LoudnormSettings, RenderError, RenderResult, RenderSettings};

const STDERR_TAIL_LINES: usize = 8;

/// Runs ffmpeg for one tier and keeps a per-tier log in `<work_dir>/logs`.
pub struct FfmpegRunner {
    settings: RenderSettings,
    executor: Arc<dyn CommandExecutor>,
}

impl std::fmt::Debug for FfmpegRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegRunner")
            .field("settings", &self.settings)
            .finish()
    }
}

impl FfmpegRunner {
    pub fn new(settings: RenderSettings, executor: Arc<dyn CommandExecutor>) -> Self {
        Self { settings, executor }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn base_args(&self) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-loglevel".to_string(),
            self.settings.log_level.clone(),
            "-y".to_string(),
        ]
    }

    pub fn video_encode_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.settings.video_codec.clone(),
            "-preset".to_string(),
            self.settings.preset.clone(),
            "-crf".to_string(),
            self.settings.crf.to_string(),
            "-pix_fmt".to_string(),
            self.settings.pix_fmt.clone(),
            "-r".to_string(),
            self.settings.fps.to_string(),
        ]
    }

    pub fn audio_encode_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.settings.audio_codec.clone(),
            "-b:a".to_string(),
            self.settings.audio_bitrate.clone(),
            "-ar".to_string(),
            self.settings.sample_rate.to_string(),
            "-ac".to_string(),
            "2".to_string(),
        ]
    }

    /// Scales and pads a still to the output frame without distortion.
    pub fn fit_frame_filter(&self) -> String {
        let (w, h) = (self.settings.width, self.settings.height);
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1"
        )
    }

    pub async fn run(
        &self,
        tier: BackendTier,
        work_dir: &Path,
        args: &[String],
    ) -> RenderResult<()> {
        let line = command_line(&self.settings.ffmpeg, args);
        debug!(tier = %tier, command = %line, "running ffmpeg");
        let result = run_checked(self.executor.as_ref(), &self.settings.ffmpeg, args).await;
        let stderr = match &result {
            Ok(output) => String::from_utf8_lossy(&output.stderr).to_string(),
            Err(err) => err.stderr().unwrap_or_default().to_string(),
        };
        if let Err(error) = append_log(work_dir, tier, &line, &stderr).await {
            warn!(tier = %tier, %error, "failed to write render log");
        }
        result.map(|_| ()).map_err(classify_failure)
    }
}

async fn append_log(
    work_dir: &Path,
    tier: BackendTier,
    line: &str,
    stderr: &str,
) -> std::io::Result<()> {
    let dir = work_dir.join("logs");
    async_fs::create_dir_all(&dir).await?;
    let mut file = async_fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("{tier}.log")))
        .await?;
    file.write_all(format!("$ {line}\n{stderr}\n").as_bytes())
        .await?;
    file.flush().await
}

/// Spawn problems and exhausted disks or memory are resource failures; any
/// other non-zero exit is treated as a codec failure.
pub fn classify_failure(err: CommandError) -> RenderError {
    match err {
        CommandError::Spawn { command, source } => {
            RenderError::exhausted(format!("{command}: {source}"))
        }
        CommandError::Failure { status, stderr, .. } => {
            let lowered = stderr.to_ascii_lowercase();
            let tail = stderr_tail(&stderr);
            let message = format!("ffmpeg exited with {status:?}: {tail}");
            if lowered.contains("no space left")
                || lowered.contains("cannot allocate memory")
                || lowered.contains("too many open files")
            {
                RenderError::exhausted(message)
            } else {
                RenderError::codec(message)
            }
        }
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}

/// Escapes a value for use inside a single-quoted filtergraph option.
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            ':' => escaped.push_str("\\:"),
            '\'' => escaped.push_str("'\\''"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub fn subtitles_filter(path: &Path, force_style: Option<&str>) -> String {
    let mut filter = format!(
        "subtitles=filename='{}'",
        escape_filter_value(&path.to_string_lossy())
    );
    if let Some(style) = force_style {
        filter.push_str(&format!(":force_style='{}'", escape_filter_value(style)));
    }
    filter
}

pub async fn write_captions(work_dir: &Path, cues: &[CaptionCue]) -> RenderResult<PathBuf> {
    async_fs::create_dir_all(work_dir).await?;
    let path = work_dir.join("captions.srt");
    async_fs::write(&path, to_srt(cues)).await?;
    Ok(path)
}

/// Narration track placed on the output timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPlacement {
    pub segment: usize,
    pub path: PathBuf,
    pub start: f64,
}

pub fn audio_placements(timeline: &Timeline) -> Vec<AudioPlacement> {
    timeline
        .segments
        .iter()
        .filter(|segment| !segment.audio_missing)
        .filter_map(|segment| {
            segment.segment.audio_ref.as_ref().map(|audio| AudioPlacement {
                segment: segment.index(),
                path: audio.path.clone(),
                start: segment.start_offset,
            })
        })
        .collect()
}

/// Delays every track to its segment offset and mixes them without level
/// normalisation, padded or trimmed to exactly `total` seconds. Inputs are
/// expected at `first_input..first_input + placements.len()`.
pub fn audio_mix_filter(
    placements: &[AudioPlacement],
    first_input: usize,
    total: f64,
    sample_rate: u32,
    loudnorm: Option<&LoudnormSettings>,
) -> String {
    let mut parts = Vec::with_capacity(placements.len() + 1);
    let mut labels = String::new();
    for (position, placement) in placements.iter().enumerate() {
        let mut chain = Vec::new();
        if let Some(loudnorm) = loudnorm {
            chain.push(loudnorm.filter());
        }
        chain.push(format!("aresample={sample_rate}"));
        chain.push("aformat=channel_layouts=stereo".to_string());
        let delay_ms = (placement.start * 1000.0).round() as u64;
        if delay_ms > 0 {
            chain.push(format!("adelay={delay_ms}:all=1"));
        }
        parts.push(format!(
            "[{}:a]{}[a{position}]",
            first_input + position,
            chain.join(",")
        ));
        labels.push_str(&format!("[a{position}]"));
    }
    parts.push(format!(
        "{labels}amix=inputs={}:normalize=0:dropout_transition=0,apad,atrim=end={total:.3},asetpts=PTS-STARTPTS[aout]",
        placements.len()
    ));
    parts.join(";")
}
