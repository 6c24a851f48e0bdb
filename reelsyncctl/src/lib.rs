pub mod manifest;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use reelsync_core::executor::run_checked;
use reelsync_core::{
    load_reelsync_config, to_srt, AdmissionController, AdmissionError, AssemblyOrchestrator,
    CaptionAligner, CaptionConfig, CaptionMode, CommandExecutor, DfDiskProbe, DurationReconciler,
    FfprobeProber, JobId, JobState, JobStore, MediaProber, NotReadyError, OrchestratorError,
    PlannerConfig, ReconcilerConfig, ReelsyncConfig, SegmentPlanner, SqliteJobStore, SweepReport,
    SystemCommandExecutor, Timeline, TransitionCompositor, TransitionConfig,
};

use manifest::{load_script, Manifest, PregeneratedMedia};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] reelsync_core::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("planning error: {0}")]
    Planning(#[from] reelsync_core::PlanningError),
    #[error("timeline error: {0}")]
    Reconcile(#[from] reelsync_core::ReconcileError),
    #[error("job rejected: {0}")]
    Admission(#[from] AdmissionError),
    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),
    #[error("artifact unavailable: {0}")]
    NotReady(#[from] NotReadyError),
    #[error("job store error: {0}")]
    JobStore(#[from] reelsync_core::JobStoreError),
    #[error("required resource missing: {0}")]
    MissingResource(String),
    #[error("job {job_id} failed: {message}")]
    JobFailed { job_id: JobId, message: String },
}

#[derive(Parser, Debug)]
#[command(author, version, about = "reelsync command-line control interface", long_about = None)]
pub struct Cli {
    /// Path to the main reelsync.toml
    #[arg(long, default_value = "configs/reelsync.toml")]
    pub config: PathBuf,
    /// Overrides paths.base_dir
    #[arg(long)]
    pub base_dir: Option<PathBuf>,
    /// Alternative path for jobs.sqlite
    #[arg(long)]
    pub jobs_db: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Splits a script into segments with provisional estimates
    Plan(PlanArgs),
    /// Probes the manifest's narration and prints the reconciled timeline
    Timeline(ManifestArgs),
    /// Writes the caption track for a manifest as SRT
    Captions(CaptionsArgs),
    /// Renders a manifest of pre-generated media into a video
    Render(ManifestArgs),
    /// Job record operations
    #[command(subcommand)]
    Jobs(JobsCommands),
    /// Checks tools, directories and free disk space
    Health,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Script JSON: an array of blocks or {"blocks": [...]}
    pub script: PathBuf,
}

#[derive(Args, Debug)]
pub struct ManifestArgs {
    /// Manifest JSON listing narration and images per segment
    pub manifest: PathBuf,
}

#[derive(Args, Debug)]
pub struct CaptionsArgs {
    pub manifest: PathBuf,
    /// Destination .srt file
    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum JobsCommands {
    /// Lists recorded jobs
    List,
    /// Removes finished jobs and stale work directories
    Sweep(SweepArgs),
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Minimum age in hours (defaults to limits.job_retention_hours)
    #[arg(long)]
    pub max_age_hours: Option<u64>,
}

pub fn run(cli: Cli) -> Result<()> {
    let context = AppContext::new(&cli)?;
    let span = tracing::info_span!(
        "reelsyncctl",
        node = %context.config.system.node_name,
        environment = %context.config.system.environment
    );
    let _entered = span.enter();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match &cli.command {
        Commands::Plan(args) => {
            let report = context.plan(&args.script)?;
            render(&report, cli.format)?;
        }
        Commands::Timeline(args) => {
            let report = runtime.block_on(context.timeline(&args.manifest))?;
            render(&report, cli.format)?;
        }
        Commands::Captions(args) => {
            let report = runtime.block_on(context.captions(&args.manifest, &args.output))?;
            render(&report, cli.format)?;
        }
        Commands::Render(args) => {
            let report = runtime.block_on(context.render_job(&args.manifest))?;
            render(&report, cli.format)?;
            if report.state == JobState::Failed {
                return Err(AppError::JobFailed {
                    job_id: report.job_id,
                    message: report.message,
                });
            }
        }
        Commands::Jobs(JobsCommands::List) => {
            let jobs = context.jobs_list()?;
            render(&jobs, cli.format)?;
        }
        Commands::Jobs(JobsCommands::Sweep(args)) => {
            let report = runtime.block_on(context.jobs_sweep(args.max_age_hours))?;
            render(&report, cli.format)?;
        }
        Commands::Health => {
            let report = runtime.block_on(context.health_check());
            render(&report, cli.format)?;
            if report
                .iter()
                .any(|entry| matches!(entry.status, CheckStatus::Error))
            {
                return Err(AppError::MissingResource(
                    "one or more checks failed".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

pub struct AppContext {
    config: ReelsyncConfig,
    config_path: PathBuf,
    jobs_db: PathBuf,
    executor: Arc<dyn CommandExecutor>,
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("config_path", &self.config_path)
            .field("jobs_db", &self.jobs_db)
            .finish()
    }
}

impl AppContext {
    pub fn new(cli: &Cli) -> Result<Self> {
        let config_path = cli.config.clone();
        let mut config = load_reelsync_config(&config_path)?;
        if let Some(base_dir) = &cli.base_dir {
            config.paths.base_dir = base_dir.to_string_lossy().to_string();
        }
        let jobs_db = cli
            .jobs_db
            .clone()
            .unwrap_or_else(|| config.resolve_path("jobs.sqlite"));
        Ok(Self {
            config,
            config_path,
            jobs_db,
            executor: Arc::new(SystemCommandExecutor),
        })
    }

    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn plan(&self, script: &Path) -> Result<PlanReport> {
        let blocks = load_script(script)?;
        let planner = SegmentPlanner::new(PlannerConfig::from(&self.config.planner))?;
        let segments = planner.plan(&blocks)?;
        let rows: Vec<PlanEntry> = segments
            .iter()
            .map(|segment| PlanEntry {
                index: segment.index,
                words: segment.word_count(),
                tone: segment.emotional_tone.to_string(),
                estimated_seconds: segment.estimated_seconds,
                planned_image_count: segment.planned_image_count,
                caption: segment.caption_text.clone(),
            })
            .collect();
        let total_estimated_seconds = rows.iter().map(|row| row.estimated_seconds).sum();
        Ok(PlanReport {
            rows,
            total_estimated_seconds,
        })
    }

    /// Probes every narration file and reconciles the manifest. Unreadable
    /// audio degrades its segment exactly as a render job would.
    async fn build_timeline(&self, manifest_path: &Path) -> Result<Timeline> {
        let (manifest, base) = Manifest::load(manifest_path)?;
        let prober = FfprobeProber::new(&self.config.render.ffprobe, self.executor.clone());
        let mut segments = manifest.segments(&base);
        for segment in &mut segments {
            let Some(audio) = segment.audio_ref.take() else {
                continue;
            };
            match prober.duration(&audio.path).await {
                Ok(seconds) => {
                    segment.audio_ref = Some(reelsync_core::AudioRef::new(audio.path, seconds));
                }
                Err(error) => {
                    warn!(segment = segment.index, %error, "narration not usable");
                }
            }
        }
        let reconciler = DurationReconciler::new(ReconcilerConfig::from(&self.config.timeline));
        Ok(reconciler.reconcile(&segments)?)
    }

    pub async fn timeline(&self, manifest: &Path) -> Result<TimelineReport> {
        let timeline = self.build_timeline(manifest).await?;
        let transitions =
            TransitionCompositor::new(TransitionConfig::from(&self.config.transitions))
                .compose(&timeline);
        Ok(TimelineReport {
            total_duration: timeline.total_duration,
            fingerprint: timeline.fingerprint(),
            degraded_segments: timeline.degraded_segments(),
            segments: timeline
                .segments
                .iter()
                .map(|segment| TimelineEntry {
                    index: segment.index(),
                    start: segment.start_offset,
                    end: segment.end_offset,
                    audio_seconds: segment.audio_seconds,
                    freeze_frame_seconds: segment.freeze_frame_seconds,
                    images: segment.image_slices.len(),
                    dropped_images: segment.dropped_images,
                    degraded: segment.degraded,
                })
                .collect(),
            crossfades: transitions
                .crossfades
                .iter()
                .map(|fade| CrossfadeEntry {
                    boundary: fade.boundary,
                    start: fade.start,
                    duration: fade.duration,
                })
                .collect(),
        })
    }

    pub async fn captions(&self, manifest: &Path, output: &Path) -> Result<CaptionsReport> {
        let timeline = self.build_timeline(manifest).await?;
        let cues = CaptionAligner::new(CaptionConfig::from(&self.config.captions)).align(&timeline);
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(output, to_srt(&cues))?;
        info!(path = %output.display(), cues = cues.len(), "captions written");
        Ok(CaptionsReport {
            path: output.to_path_buf(),
            cues: cues.len(),
            total_duration: timeline.total_duration,
        })
    }

    fn open_store(&self) -> Result<SqliteJobStore> {
        if let Some(parent) = self.jobs_db.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(SqliteJobStore::new(&self.jobs_db)?)
    }

    fn orchestrator(&self, store: SqliteJobStore) -> Result<AssemblyOrchestrator> {
        let media = Arc::new(PregeneratedMedia);
        Ok(AssemblyOrchestrator::builder(&self.config)
            .with_executor(self.executor.clone())
            .with_store(Arc::new(store) as Arc<dyn JobStore>)
            .with_synthesizer(media.clone())
            .with_image_generator(media)
            .build()?)
    }

    /// Runs one job to completion. Ctrl-C cancels it.
    pub async fn render_job(&self, manifest_path: &Path) -> Result<RenderReport> {
        let (manifest, base) = Manifest::load(manifest_path)?;
        let orchestrator = self.orchestrator(self.open_store()?)?;
        let sidecar = manifest
            .options
            .caption_mode
            .unwrap_or(self.config.captions.default_mode)
            == CaptionMode::Sidecar;
        let id = orchestrator
            .submit_job(manifest.segments(&base), manifest.options.clone())
            .await?;
        info!(job_id = %id, "render submitted");

        let status = tokio::select! {
            status = orchestrator.wait(&id) => status?,
            _ = tokio::signal::ctrl_c() => {
                warn!(job_id = %id, "interrupted, cancelling job");
                orchestrator.cancel(&id)?;
                orchestrator.wait(&id).await?
            }
        };

        let mut report = RenderReport {
            job_id: id,
            state: status.state,
            backend_tier_used: status.backend_tier_used.map(|tier| tier.to_string()),
            artifact: None,
            captions: None,
            degraded_segments: status.degraded_segments,
            message: status.message,
        };
        if status.state == JobState::Completed {
            let artifact = orchestrator.get_artifact(&id)?;
            if sidecar {
                report.captions = Some(artifact.with_extension("srt"));
            }
            report.artifact = Some(artifact);
        }
        Ok(report)
    }

    pub fn jobs_list(&self) -> Result<JobList> {
        if !self.jobs_db.exists() {
            return Ok(JobList { rows: Vec::new() });
        }
        let store = SqliteJobStore::builder()
            .path(&self.jobs_db)
            .read_only(true)
            .build()?;
        let rows = store
            .list()?
            .into_iter()
            .map(|job| JobEntry {
                job_id: job.id,
                state: job.state,
                progress_percent: job.progress_percent,
                backend_tier_used: job.backend_tier_used.map(|tier| tier.to_string()),
                message: job.message(),
                updated_at: job.updated_at,
            })
            .collect();
        Ok(JobList { rows })
    }

    pub async fn jobs_sweep(&self, max_age_hours: Option<u64>) -> Result<SweepReport> {
        let orchestrator = self.orchestrator(self.open_store()?)?;
        let report = match max_age_hours {
            Some(hours) => orchestrator.sweep(Duration::from_secs(hours * 3600)).await?,
            None => orchestrator.sweep_expired().await?,
        };
        Ok(report)
    }

    pub async fn health_check(&self) -> Vec<HealthEntry> {
        let mut results = Vec::new();
        results.push(HealthEntry::ok(
            "node",
            format!(
                "{} ({})",
                self.config.system.node_name, self.config.system.environment
            ),
        ));
        results.push(self.check_path("reelsync.toml", &self.config_path));
        results.push(
            self.check_tool("ffmpeg", Path::new(&self.config.render.ffmpeg))
                .await,
        );
        results.push(
            self.check_tool("ffprobe", Path::new(&self.config.render.ffprobe))
                .await,
        );
        results.push(self.check_directory("work", &self.config.work_dir()));
        results.push(self.check_directory("output", &self.config.output_dir()));
        results.push(self.check_directory("logs", &self.config.logs_dir()));
        results.push(self.check_database("jobs.sqlite", &self.jobs_db));
        results.push(self.check_disk().await);
        results
    }

    fn check_path(&self, name: &str, path: &Path) -> HealthEntry {
        if path.exists() {
            HealthEntry::ok(name, format!("{}", path.display()))
        } else {
            HealthEntry::error(name, format!("{path} missing", path = path.display()))
        }
    }

    async fn check_tool(&self, name: &str, binary: &Path) -> HealthEntry {
        let args = vec!["-version".to_string()];
        match run_checked(self.executor.as_ref(), binary, &args).await {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let version = stdout.lines().next().unwrap_or("").trim().to_string();
                HealthEntry::ok(name, version)
            }
            Err(err) => HealthEntry::error(name, err.to_string()),
        }
    }

    fn check_directory(&self, name: &str, path: &Path) -> HealthEntry {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => HealthEntry::ok(name, format!("{}", path.display())),
            Ok(_) => HealthEntry::warn(
                name,
                format!("{path} is not a directory", path = path.display()),
            ),
            Err(_) => HealthEntry::warn(
                name,
                format!("{path} not found, created on first job", path = path.display()),
            ),
        }
    }

    fn check_database(&self, name: &str, path: &Path) -> HealthEntry {
        if !path.exists() {
            return HealthEntry::warn(name, format!("{path} not found", path = path.display()));
        }
        match Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY) {
            Ok(conn) => {
                let pragma: rusqlite::Result<String> =
                    conn.query_row("PRAGMA integrity_check;", [], |row| row.get(0));
                match pragma {
                    Ok(result) if result.to_lowercase() == "ok" => {
                        HealthEntry::ok(name, "integrity ok".to_string())
                    }
                    Ok(result) => HealthEntry::warn(name, format!("integrity_check: {result}")),
                    Err(err) => HealthEntry::warn(name, format!("error: {err}")),
                }
            }
            Err(err) => HealthEntry::error(name, format!("cannot open: {err}")),
        }
    }

    async fn check_disk(&self) -> HealthEntry {
        let probe = Arc::new(DfDiskProbe::new(self.executor.clone()));
        let controller = AdmissionController::new(probe, self.config.limits.min_free_disk_mb);
        match controller.check(&self.config.work_dir()).await {
            Ok(available) => HealthEntry::ok(
                "disk",
                format!(
                    "{available} MB free, {} MB required",
                    controller.min_free_mb()
                ),
            ),
            Err(err @ AdmissionError::InsufficientDisk { .. }) => {
                HealthEntry::error("disk", err.to_string())
            }
            Err(err) => HealthEntry::warn("disk", err.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub rows: Vec<PlanEntry>,
    pub total_estimated_seconds: f64,
}

#[derive(Debug, Serialize)]
pub struct PlanEntry {
    pub index: usize,
    pub words: usize,
    pub tone: String,
    pub estimated_seconds: f64,
    pub planned_image_count: usize,
    pub caption: String,
}

impl DisplayFallback for PlanReport {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "{} segments, ~{:.1}s of narration",
            self.rows.len(),
            self.total_estimated_seconds
        )];
        for row in &self.rows {
            lines.push(format!(
                "  #{index} {words} words, ~{secs:.1}s, {images} image(s), tone {tone}",
                index = row.index,
                words = row.words,
                secs = row.estimated_seconds,
                images = row.planned_image_count,
                tone = row.tone
            ));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct TimelineReport {
    pub total_duration: f64,
    pub fingerprint: String,
    pub degraded_segments: Vec<usize>,
    pub segments: Vec<TimelineEntry>,
    pub crossfades: Vec<CrossfadeEntry>,
}

#[derive(Debug, Serialize)]
pub struct TimelineEntry {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub audio_seconds: f64,
    pub freeze_frame_seconds: f64,
    pub images: usize,
    pub dropped_images: usize,
    pub degraded: bool,
}

#[derive(Debug, Serialize)]
pub struct CrossfadeEntry {
    pub boundary: usize,
    pub start: f64,
    pub duration: f64,
}

impl DisplayFallback for TimelineReport {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "Total: {:.3}s (fingerprint {})",
            self.total_duration,
            &self.fingerprint[..self.fingerprint.len().min(12)]
        )];
        for segment in &self.segments {
            let mut line = format!(
                "  #{} {:>8.3} -> {:>8.3}  audio {:.3}s, {} image(s)",
                segment.index, segment.start, segment.end, segment.audio_seconds, segment.images
            );
            if segment.freeze_frame_seconds > 0.0 {
                line.push_str(&format!(", hold {:.3}s", segment.freeze_frame_seconds));
            }
            if segment.degraded {
                line.push_str(" [degraded]");
            }
            lines.push(line);
        }
        for fade in &self.crossfades {
            lines.push(format!(
                "  fade {}->{} at {:.3}s for {:.3}s",
                fade.boundary,
                fade.boundary + 1,
                fade.start,
                fade.duration
            ));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct CaptionsReport {
    pub path: PathBuf,
    pub cues: usize,
    pub total_duration: f64,
}

impl DisplayFallback for CaptionsReport {
    fn display(&self) -> String {
        format!(
            "{} cues over {:.3}s written to {}",
            self.cues,
            self.total_duration,
            self.path.display()
        )
    }
}

#[derive(Debug, Serialize)]
pub struct RenderReport {
    pub job_id: JobId,
    pub state: JobState,
    pub backend_tier_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captions: Option<PathBuf>,
    pub degraded_segments: Vec<usize>,
    pub message: String,
}

impl DisplayFallback for RenderReport {
    fn display(&self) -> String {
        let mut lines = vec![format!("Job {}: {}", self.job_id, self.message)];
        if let Some(path) = &self.artifact {
            lines.push(format!("  video: {}", path.display()));
        }
        if let Some(path) = &self.captions {
            lines.push(format!("  captions: {}", path.display()));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct JobList {
    pub rows: Vec<JobEntry>,
}

#[derive(Debug, Serialize)]
pub struct JobEntry {
    pub job_id: JobId,
    pub state: JobState,
    pub progress_percent: u8,
    pub backend_tier_used: Option<String>,
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

impl DisplayFallback for JobList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No jobs recorded".to_string();
        }
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        for row in &self.rows {
            *counts.entry(row.state.as_str()).or_default() += 1;
            lines.push(format!(
                "{id} [{state}] {progress:>3}% {updated}  {message}",
                id = row.job_id,
                state = row.state.as_str(),
                progress = row.progress_percent,
                updated = row.updated_at.format("%Y-%m-%d %H:%M:%S"),
                message = row.message
            ));
        }
        let summary: Vec<String> = counts
            .iter()
            .map(|(state, count)| format!("{state}: {count}"))
            .collect();
        lines.insert(0, format!("Jobs ({})", summary.join(", ")));
        lines.join("\n")
    }
}

impl DisplayFallback for SweepReport {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "Removed {} job record(s) and {} work director(y/ies)",
            self.removed_jobs.len(),
            self.removed_dirs.len()
        )];
        for dir in &self.removed_dirs {
            lines.push(format!("  - {}", dir.display()));
        }
        lines.join("\n")
    }
}

impl DisplayFallback for Vec<HealthEntry> {
    fn display(&self) -> String {
        let mut lines = Vec::new();
        for entry in self {
            lines.push(format!(
                "[{status}] {name}: {detail}",
                status = entry.status,
                name = entry.name,
                detail = entry.detail
            ));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct HealthEntry {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub enum CheckStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Warn => "WARN",
            CheckStatus::Error => "ERROR",
        };
        write!(f, "{}", label)
    }
}

impl HealthEntry {
    fn ok(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Ok,
            detail: detail.into(),
        }
    }

    fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Warn,
            detail: detail.into(),
        }
    }

    fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Error,
            detail: detail.into(),
        }
    }
}
