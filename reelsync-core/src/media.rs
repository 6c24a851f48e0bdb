use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::executor::{run_checked, CommandError, CommandExecutor};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("media file {0} does not exist")]
    Missing(PathBuf),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("unreadable ffprobe output for {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error("no duration reported for {0}")]
    NoDuration(PathBuf),
}

pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StreamInfo {
    pub codec: Option<String>,
    pub duration_seconds: Option<f64>,
    pub frames: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MediaInfo {
    pub format_duration: Option<f64>,
    pub video: Option<StreamInfo>,
    pub audio: Option<StreamInfo>,
}

impl MediaInfo {
    pub fn duration(&self) -> Option<f64> {
        self.format_duration
            .or_else(|| self.audio.as_ref().and_then(|s| s.duration_seconds))
            .or_else(|| self.video.as_ref().and_then(|s| s.duration_seconds))
    }

    pub fn audio_duration(&self) -> Option<f64> {
        let audio = self.audio.as_ref()?;
        audio.duration_seconds.or(self.format_duration)
    }

    pub fn video_duration(&self) -> Option<f64> {
        self.video
            .as_ref()
            .and_then(|s| s.duration_seconds)
            .or(self.format_duration)
    }

    pub fn video_frames(&self) -> u64 {
        self.video.as_ref().and_then(|s| s.frames).unwrap_or(0)
    }

    /// Parses `ffprobe -print_format json -show_format -show_streams` output.
    pub fn from_ffprobe_json(raw: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(raw).map_err(|err| err.to_string())?;
        let format_duration = value
            .get("format")
            .and_then(|format| format.get("duration"))
            .and_then(number_field);
        let mut info = MediaInfo {
            format_duration,
            ..MediaInfo::default()
        };
        let streams = value
            .get("streams")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for stream in streams {
            let kind = stream.get("codec_type").and_then(Value::as_str);
            let parsed = StreamInfo {
                codec: stream
                    .get("codec_name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                duration_seconds: stream.get("duration").and_then(number_field),
                frames: stream
                    .get("nb_read_packets")
                    .or_else(|| stream.get("nb_frames"))
                    .and_then(number_field)
                    .map(|frames| frames.max(0.0) as u64),
            };
            match kind {
                Some("video") if info.video.is_none() => info.video = Some(parsed),
                Some("audio") if info.audio.is_none() => info.audio = Some(parsed),
                _ => {}
            }
        }
        Ok(info)
    }
}

/// ffprobe reports numbers as strings; accept both.
fn number_field(value: &Value) -> Option<f64> {
    match value {
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Number(number) => number.as_f64(),
        _ => None,
    }
    .filter(|number| number.is_finite())
}

#[async_trait::async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> ProbeResult<MediaInfo>;

    async fn duration(&self, path: &Path) -> ProbeResult<f64> {
        let info = self.probe(path).await?;
        info.duration()
            .ok_or_else(|| ProbeError::NoDuration(path.to_path_buf()))
    }
}

pub struct FfprobeProber {
    ffprobe: PathBuf,
    executor: Arc<dyn CommandExecutor>,
}

impl std::fmt::Debug for FfprobeProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfprobeProber")
            .field("ffprobe", &self.ffprobe)
            .finish()
    }
}

impl FfprobeProber {
    pub fn new(ffprobe: impl Into<PathBuf>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            executor,
        }
    }
}

#[async_trait::async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> ProbeResult<MediaInfo> {
        if !path.exists() {
            return Err(ProbeError::Missing(path.to_path_buf()));
        }
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-count_packets".to_string(),
            "-show_format".to_string(),
            "-show_streams".to_string(),
            path.to_string_lossy().to_string(),
        ];
        let output = run_checked(self.executor.as_ref(), &self.ffprobe, &args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let info = MediaInfo::from_ffprobe_json(&stdout).map_err(|reason| ProbeError::Parse {
            path: path.to_path_buf(),
            reason,
        })?;
        debug!(path = %path.display(), duration = ?info.duration(), "probed media");
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_name": "h264", "duration": "11.708333", "nb_read_packets": "281"},
            {"codec_type": "audio", "codec_name": "aac", "duration": "11.700000"}
        ],
        "format": {"duration": "11.708333"}
    }"#;

    #[test]
    fn parses_streams_and_format() {
        let info = MediaInfo::from_ffprobe_json(SAMPLE).unwrap();
        assert_eq!(info.video_frames(), 281);
        assert_eq!(info.video.as_ref().unwrap().codec.as_deref(), Some("h264"));
        assert!((info.audio_duration().unwrap() - 11.7).abs() < 1e-9);
        assert!((info.video_duration().unwrap() - 11.708333).abs() < 1e-9);
        assert!((info.format_duration.unwrap() - 11.708333).abs() < 1e-9);
    }

    #[test]
    fn audio_only_file_has_no_frames() {
        let info = MediaInfo::from_ffprobe_json(
            r#"{"streams":[{"codec_type":"audio","duration":"4.0"}],"format":{"duration":"4.0"}}"#,
        )
        .unwrap();
        assert!(info.video.is_none());
        assert_eq!(info.video_frames(), 0);
        // Without a video stream the container length stands in.
        assert_eq!(info.video_duration(), Some(4.0));
        assert_eq!(info.duration(), Some(4.0));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(MediaInfo::from_ffprobe_json("not json").is_err());
    }
}
