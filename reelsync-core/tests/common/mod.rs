#![allow(dead_code)]

use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use tokio::process::Command;

use reelsync_core::collaborators::{
    GenerationError, ImageGenerator, RetryPolicy, SpeechSynthesizer, SynthesisError,
};
use reelsync_core::config::{load_reelsync_config, ReelsyncConfig};
use reelsync_core::executor::CommandExecutor;
use reelsync_core::job::{InMemoryJobStore, JobStore};
use reelsync_core::orchestrator::{AssemblyOrchestrator, OrchestratorBuilder};
use reelsync_core::segment::{ImageRef, Segment};

pub const FPS: f64 = 24.0;

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(relative)
}

pub fn test_config(base: &TempDir) -> ReelsyncConfig {
    let mut config = load_reelsync_config(fixture_path("configs/reelsync.toml")).unwrap();
    config.paths.base_dir = base.path().join("reelsync").to_string_lossy().to_string();
    config.render.ffmpeg = "ffmpeg".into();
    config.render.ffprobe = "ffprobe".into();
    config
}

/// Fake media file: the JSON the fake ffprobe reports back.
pub fn write_media(path: &Path, duration: f64, audio: bool, frames: u64) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let body = json!({"duration": duration, "audio": audio, "frames": frames});
    std::fs::write(path, body.to_string()).unwrap();
}

pub fn write_audio(path: &Path, duration: f64) {
    write_media(path, duration, true, 0);
}

pub fn write_image(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"PNG").unwrap();
}

/// Counts calls that are running at the same time and remembers the peak.
#[derive(Clone, Default)]
pub struct InFlight {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl InFlight {
    pub fn enter(&self) -> InFlightGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard {
            current: self.current.clone(),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct InFlightGuard {
    current: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn joined(&self) -> String {
        self.args.join(" ")
    }

    pub fn output(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }
}

/// Stands in for ffmpeg, ffprobe and df. ffmpeg writes a JSON descriptor to
/// its output path, ffprobe turns descriptors back into ffprobe JSON.
#[derive(Clone, Default)]
pub struct FakeToolchain {
    calls: Arc<Mutex<Vec<Invocation>>>,
    fail_when: Arc<Mutex<Vec<(String, String)>>>,
    short_audio_when: Arc<Mutex<Vec<String>>>,
    short_video_when: Arc<Mutex<Vec<String>>>,
    available_kb: Arc<Mutex<u64>>,
    ffmpeg_delay: Option<Duration>,
    ffmpeg_in_flight: InFlight,
}

impl FakeToolchain {
    pub fn new() -> Self {
        let toolchain = Self::default();
        *toolchain.available_kb.lock().unwrap() = 50 * 1024 * 1024;
        toolchain
    }

    /// ffmpeg exits non-zero when its arguments contain `needle`.
    pub fn fail_when(self, needle: &str) -> Self {
        let stderr = format!("Error initializing filter '{needle}'");
        self.fail_with(needle, &stderr)
    }

    pub fn fail_with(self, needle: &str, stderr: &str) -> Self {
        self.fail_when
            .lock()
            .unwrap()
            .push((needle.to_string(), stderr.to_string()));
        self
    }

    /// ffmpeg output carries 2s less audio than requested.
    pub fn short_audio_when(self, needle: &str) -> Self {
        self.short_audio_when.lock().unwrap().push(needle.to_string());
        self
    }

    /// ffmpeg output carries only 2s of video, audio is left alone.
    pub fn short_video_when(self, needle: &str) -> Self {
        self.short_video_when.lock().unwrap().push(needle.to_string());
        self
    }

    /// Every ffmpeg call takes this long.
    pub fn with_ffmpeg_delay(mut self, delay: Duration) -> Self {
        self.ffmpeg_delay = Some(delay);
        self
    }

    /// Most ffmpeg calls seen running together.
    pub fn peak_ffmpeg_calls(&self) -> usize {
        self.ffmpeg_in_flight.peak()
    }

    pub fn with_available_mb(self, mb: u64) -> Self {
        *self.available_kb.lock().unwrap() = mb * 1024;
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn ffmpeg_calls(&self) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|call| call.program.ends_with("ffmpeg"))
            .collect()
    }

    fn ffmpeg(&self, args: &[String]) -> Output {
        let joined = args.join(" ");
        if let Some((_, stderr)) = self
            .fail_when
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| joined.contains(needle.as_str()))
        {
            return failure(stderr);
        }
        let Some(output) = args.last() else {
            return failure("no output");
        };
        let mut duration = last_value(args, "-t").unwrap_or(1.0);
        let mut audio_duration = duration;
        if self
            .short_video_when
            .lock()
            .unwrap()
            .iter()
            .any(|needle| joined.contains(needle.as_str()))
        {
            duration = 2.0;
        }
        if self
            .short_audio_when
            .lock()
            .unwrap()
            .iter()
            .any(|needle| joined.contains(needle.as_str()))
        {
            audio_duration -= 2.0;
        }
        let has_audio = joined.contains("[aout]");
        let frames = (duration * FPS).round() as u64;
        let body = json!({
            "duration": duration,
            "audio": has_audio,
            "audio_duration": audio_duration,
            "frames": frames,
        });
        let path = Path::new(output);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, body.to_string()).unwrap();
        success(Vec::new())
    }

    fn ffprobe(&self, args: &[String]) -> Output {
        let Some(path) = args.last() else {
            return failure("no input");
        };
        let Ok(raw) = std::fs::read_to_string(path) else {
            return failure("No such file or directory");
        };
        let Ok(descriptor) = serde_json::from_str::<serde_json::Value>(&raw) else {
            return failure("Invalid data found when processing input");
        };
        let duration = descriptor["duration"].as_f64().unwrap_or(0.0);
        let audio_duration = descriptor["audio_duration"].as_f64().unwrap_or(duration);
        let frames = descriptor["frames"].as_u64().unwrap_or(0);
        let mut streams = Vec::new();
        if frames > 0 {
            streams.push(json!({
                "codec_type": "video",
                "codec_name": "h264",
                "duration": format!("{duration:.6}"),
                "nb_read_packets": frames.to_string(),
            }));
        }
        if descriptor["audio"].as_bool().unwrap_or(false) {
            streams.push(json!({
                "codec_type": "audio",
                "codec_name": "aac",
                "duration": format!("{audio_duration:.6}"),
            }));
        }
        let report = json!({
            "streams": streams,
            "format": {"duration": format!("{duration:.6}")},
        });
        success(report.to_string().into_bytes())
    }

    fn df(&self) -> Output {
        let available = *self.available_kb.lock().unwrap();
        let report = format!(
            "Filesystem     1024-blocks      Used Available Capacity Mounted on\n\
             /dev/fake       999999999         0 {available}       1% /\n"
        );
        success(report.into_bytes())
    }
}

fn last_value(args: &[String], flag: &str) -> Option<f64> {
    args.iter()
        .rposition(|arg| arg == flag)
        .and_then(|position| args.get(position + 1))
        .and_then(|value| value.parse().ok())
}

fn success(stdout: Vec<u8>) -> Output {
    Output {
        status: ExitStatus::from_raw(0),
        stdout,
        stderr: Vec::new(),
    }
}

fn failure(stderr: &str) -> Output {
    Output {
        status: ExitStatus::from_raw(1 << 8),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

#[async_trait::async_trait]
impl CommandExecutor for FakeToolchain {
    async fn run(&self, command: &mut Command) -> std::io::Result<Output> {
        let std_command = command.as_std();
        let program = std_command.get_program().to_string_lossy().to_string();
        let args: Vec<String> = std_command
            .get_args()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();
        self.calls.lock().unwrap().push(Invocation {
            program: program.clone(),
            args: args.clone(),
        });
        let output = if program.ends_with("ffprobe") {
            self.ffprobe(&args)
        } else if program.ends_with("ffmpeg") {
            let _running = self.ffmpeg_in_flight.enter();
            if let Some(delay) = self.ffmpeg_delay {
                tokio::time::sleep(delay).await;
            }
            self.ffmpeg(&args)
        } else if program.ends_with("df") {
            self.df()
        } else {
            failure("unknown program")
        };
        Ok(output)
    }
}

/// Narration durations keyed by the segment text. Missing text fails, a
/// delay makes every call hang that long first.
#[derive(Clone, Default)]
pub struct FakeSynthesizer {
    durations: HashMap<String, f64>,
    delay: Option<Duration>,
    in_flight: InFlight,
}

impl FakeSynthesizer {
    pub fn new(pairs: &[(&str, f64)]) -> Self {
        Self {
            durations: pairs
                .iter()
                .map(|(text, seconds)| (text.to_string(), *seconds))
                .collect(),
            delay: None,
            in_flight: InFlight::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn tracked_by(mut self, in_flight: &InFlight) -> Self {
        self.in_flight = in_flight.clone();
        self
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        _voice: Option<&str>,
        _speed: f32,
        dest: &Path,
    ) -> Result<reelsync_core::segment::AudioRef, SynthesisError> {
        let _running = self.in_flight.enter();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let seconds = self
            .durations
            .get(text)
            .copied()
            .ok_or_else(|| SynthesisError::Unavailable("voice backend down".into()))?;
        write_audio(dest, seconds);
        // Deliberately wrong: the orchestrator must re-probe.
        Ok(reelsync_core::segment::AudioRef::new(dest, seconds + 100.0))
    }
}

#[derive(Clone, Default)]
pub struct FakeImageGenerator {
    fail: bool,
    delay: Option<Duration>,
    in_flight: InFlight,
}

impl FakeImageGenerator {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn tracked_by(mut self, in_flight: &InFlight) -> Self {
        self.in_flight = in_flight.clone();
        self
    }
}

#[async_trait::async_trait]
impl ImageGenerator for FakeImageGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        _style: Option<&str>,
        dest: &Path,
    ) -> Result<ImageRef, GenerationError> {
        let _running = self.in_flight.enter();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(GenerationError::Unavailable("quota exceeded".into()));
        }
        write_image(dest);
        Ok(ImageRef::new(dest, 0))
    }
}

pub fn segments(texts: &[&str], images_per_segment: usize) -> Vec<Segment> {
    texts
        .iter()
        .enumerate()
        .map(|(index, text)| {
            let mut segment = Segment::new(index, *text);
            segment.planned_image_count = images_per_segment;
            segment
        })
        .collect()
}

pub struct Harness {
    pub orchestrator: AssemblyOrchestrator,
    pub toolchain: FakeToolchain,
    pub store: Arc<InMemoryJobStore>,
    pub config: ReelsyncConfig,
}

pub fn builder(
    config: &ReelsyncConfig,
    toolchain: &FakeToolchain,
    synthesizer: FakeSynthesizer,
    images: FakeImageGenerator,
) -> OrchestratorBuilder {
    AssemblyOrchestrator::builder(config)
        .with_executor(Arc::new(toolchain.clone()))
        .with_synthesizer(Arc::new(synthesizer))
        .with_image_generator(Arc::new(images))
        .with_retry_policy(RetryPolicy::immediate(3))
}

pub fn harness(
    base: &TempDir,
    toolchain: FakeToolchain,
    synthesizer: FakeSynthesizer,
    images: FakeImageGenerator,
) -> Harness {
    let config = test_config(base);
    let store = Arc::new(InMemoryJobStore::new());
    let orchestrator = builder(&config, &toolchain, synthesizer, images)
        .with_store(store.clone() as Arc<dyn JobStore>)
        .build()
        .unwrap();
    Harness {
        orchestrator,
        toolchain,
        store,
        config,
    }
}
