pub mod error;
pub mod gather;
pub mod lock;
mod run;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::fs as async_fs;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info};

use crate::admission::{AdmissionController, AdmissionError, DfDiskProbe, DiskProbe};
use crate::captions::{CaptionAligner, CaptionConfig, CaptionMode};
use crate::collaborators::{ImageGenerator, PlaceholderPainter, RetryPolicy, SpeechSynthesizer};
use crate::config::ReelsyncConfig;
use crate::executor::{CommandExecutor, SystemCommandExecutor};
use crate::job::{InMemoryJobStore, JobId, JobState, JobStatus, JobStore, RenderJob};
use crate::media::{FfprobeProber, MediaProber};
use crate::render::{default_tiers, RenderBackend, RenderOptions, RenderSettings};
use crate::segment::{validate_segments, Segment};
use crate::timeline::{DurationReconciler, ReconcilerConfig};
use crate::transition::{TransitionCompositor, TransitionConfig};

pub use error::{NotReadyError, OrchestratorError};
pub use gather::MediaGatherer;
pub use lock::{JobLocks, RenderLockGuard, LOCK_FILE_NAME};

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub work_root: PathBuf,
    pub output_dir: PathBuf,
    /// Failed jobs leave their tier logs here, under the job id.
    pub logs_dir: PathBuf,
    pub default_caption_mode: CaptionMode,
    pub media_concurrency: usize,
    pub render_concurrency: usize,
    pub segment_timeout: Duration,
    pub job_timeout: Duration,
    pub attempt_timeout: Duration,
    pub max_attempts: u32,
    pub min_free_disk_mb: u64,
    pub verification_tolerance: f64,
    pub retention: Duration,
}

impl From<&ReelsyncConfig> for OrchestratorSettings {
    fn from(config: &ReelsyncConfig) -> Self {
        Self {
            work_root: config.work_dir(),
            output_dir: config.output_dir(),
            logs_dir: config.logs_dir(),
            default_caption_mode: config.captions.default_mode,
            media_concurrency: config.limits.media_concurrency.max(1),
            render_concurrency: config.limits.render_concurrency.max(1),
            segment_timeout: Duration::from_secs(config.limits.segment_timeout_seconds),
            job_timeout: Duration::from_secs(config.limits.job_timeout_seconds),
            attempt_timeout: Duration::from_secs(config.render.attempt_timeout_seconds),
            max_attempts: config.render.max_attempts.max(1),
            min_free_disk_mb: config.limits.min_free_disk_mb,
            verification_tolerance: config.verification.duration_tolerance_seconds,
            retention: Duration::from_secs(config.limits.job_retention_hours * 3600),
        }
    }
}

/// Cancellation switch and completion signal of a running job.
struct JobHandle {
    cancel: watch::Sender<bool>,
    done: watch::Receiver<bool>,
}

pub(crate) struct Shared {
    settings: OrchestratorSettings,
    store: Arc<dyn JobStore>,
    gatherer: MediaGatherer,
    prober: Arc<dyn MediaProber>,
    reconciler: DurationReconciler,
    compositor: TransitionCompositor,
    aligner: CaptionAligner,
    tiers: Vec<Arc<dyn RenderBackend>>,
    admission: AdmissionController,
    render_slots: Semaphore,
    locks: JobLocks,
    handles: Mutex<HashMap<JobId, JobHandle>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAck {
    pub job_id: JobId,
    pub state: JobState,
    /// False when the job had already reached a terminal state.
    pub accepted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorSummary {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub by_state: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub removed_jobs: Vec<JobId>,
    pub removed_dirs: Vec<PathBuf>,
}

pub struct OrchestratorBuilder {
    settings: OrchestratorSettings,
    render_settings: RenderSettings,
    reconciler: ReconcilerConfig,
    transitions: TransitionConfig,
    captions: CaptionConfig,
    retry: RetryPolicy,
    placeholder_font_size: u32,
    ffprobe: PathBuf,
    executor: Arc<dyn CommandExecutor>,
    store: Option<Arc<dyn JobStore>>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    images: Option<Arc<dyn ImageGenerator>>,
    prober: Option<Arc<dyn MediaProber>>,
    disk_probe: Option<Arc<dyn DiskProbe>>,
    tiers: Option<Vec<Arc<dyn RenderBackend>>>,
}

impl OrchestratorBuilder {
    pub fn new(config: &ReelsyncConfig) -> Self {
        Self {
            settings: OrchestratorSettings::from(config),
            render_settings: RenderSettings::from(config),
            reconciler: ReconcilerConfig::from(&config.timeline),
            transitions: TransitionConfig::from(&config.transitions),
            captions: CaptionConfig::from(&config.captions),
            retry: RetryPolicy::from(&config.collaborators),
            placeholder_font_size: config.collaborators.placeholder_font_size,
            ffprobe: PathBuf::from(&config.render.ffprobe),
            executor: Arc::new(SystemCommandExecutor),
            store: None,
            synthesizer: None,
            images: None,
            prober: None,
            disk_probe: None,
            tiers: None,
        }
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_image_generator(mut self, images: Arc<dyn ImageGenerator>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn with_prober(mut self, prober: Arc<dyn MediaProber>) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn with_disk_probe(mut self, probe: Arc<dyn DiskProbe>) -> Self {
        self.disk_probe = Some(probe);
        self
    }

    pub fn with_tiers(mut self, tiers: Vec<Arc<dyn RenderBackend>>) -> Self {
        self.tiers = Some(tiers);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn build(self) -> Result<AssemblyOrchestrator, OrchestratorError> {
        let synthesizer = self
            .synthesizer
            .ok_or(OrchestratorError::MissingCollaborator("speech synthesizer"))?;
        let images = self
            .images
            .ok_or(OrchestratorError::MissingCollaborator("image generator"))?;
        let executor = self.executor;
        let prober = self
            .prober
            .unwrap_or_else(|| Arc::new(FfprobeProber::new(&self.ffprobe, executor.clone())));
        let disk_probe = self
            .disk_probe
            .unwrap_or_else(|| Arc::new(DfDiskProbe::new(executor.clone())));
        let painter = PlaceholderPainter::new(&self.render_settings.ffmpeg, executor.clone())
            .with_size(self.render_settings.width, self.render_settings.height)
            .with_color(self.render_settings.card_color.clone())
            .with_font_size(self.placeholder_font_size);
        let tiers = self
            .tiers
            .unwrap_or_else(|| default_tiers(self.render_settings.clone(), executor.clone()));
        let settings = self.settings;

        let shared = Shared {
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryJobStore::new())),
            gatherer: MediaGatherer {
                synthesizer,
                images,
                prober: prober.clone(),
                painter: Arc::new(painter),
                retry: self.retry,
                segment_timeout: settings.segment_timeout,
            },
            prober,
            reconciler: DurationReconciler::new(self.reconciler),
            compositor: TransitionCompositor::new(self.transitions),
            aligner: CaptionAligner::new(self.captions),
            tiers,
            admission: AdmissionController::new(disk_probe, settings.min_free_disk_mb),
            render_slots: Semaphore::new(settings.render_concurrency.max(1)),
            locks: JobLocks::new(),
            handles: Mutex::new(HashMap::new()),
            settings,
        };
        Ok(AssemblyOrchestrator {
            shared: Arc::new(shared),
        })
    }
}

/// Owns render jobs from submission to artifact hand-off.
#[derive(Clone)]
pub struct AssemblyOrchestrator {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for AssemblyOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssemblyOrchestrator")
            .field("settings", &self.shared.settings)
            .field("tiers", &self.shared.tiers.len())
            .finish()
    }
}

impl AssemblyOrchestrator {
    pub fn builder(config: &ReelsyncConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.shared.settings
    }

    fn handles(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, JobHandle>> {
        self.shared
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates the segments, checks disk headroom and starts the job in
    /// the background. Rejected submissions leave no job record.
    pub async fn submit_job(
        &self,
        segments: Vec<Segment>,
        mut options: RenderOptions,
    ) -> Result<JobId, AdmissionError> {
        validate_segments(&segments)?;
        options
            .caption_mode
            .get_or_insert(self.shared.settings.default_caption_mode);
        let work_root = &self.shared.settings.work_root;
        self.shared.admission.check(work_root).await?;

        let job = RenderJob::new(segments, options, work_root);
        let id = job.id;
        self.shared.store.insert(&job)?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);
        self.handles().insert(
            id,
            JobHandle {
                cancel: cancel_tx,
                done: done_rx,
            },
        );
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            shared.drive(id, cancel_rx).await;
            let _ = done_tx.send(true);
        });
        info!(job_id = %id, segments = job.segments.len(), "job submitted");
        Ok(id)
    }

    pub fn get_status(&self, id: &JobId) -> Result<JobStatus, OrchestratorError> {
        self.shared
            .store
            .get(id)?
            .map(|job| job.status())
            .ok_or(OrchestratorError::UnknownJob(*id))
    }

    /// Hands over the finished artifact and forgets the job. The file itself
    /// stays in the output directory.
    pub fn get_artifact(&self, id: &JobId) -> Result<PathBuf, NotReadyError> {
        let job = self
            .shared
            .store
            .get(id)?
            .ok_or(NotReadyError::Unknown(*id))?;
        match (job.state, job.artifact_path) {
            (JobState::Completed, Some(path)) => {
                self.shared.store.remove(id)?;
                self.handles().remove(id);
                debug!(job_id = %id, "artifact retrieved, job released");
                Ok(path)
            }
            (JobState::Failed, _) => Err(NotReadyError::Failed {
                job_id: *id,
                kind: job
                    .failure
                    .map(|failure| failure.kind)
                    .unwrap_or(crate::job::FailureKind::Internal),
            }),
            (state, _) => Err(NotReadyError::InProgress { job_id: *id, state }),
        }
    }

    pub fn cancel(&self, id: &JobId) -> Result<CancelAck, OrchestratorError> {
        let status = self.get_status(id)?;
        if status.state.is_terminal() {
            return Ok(CancelAck {
                job_id: *id,
                state: status.state,
                accepted: false,
            });
        }
        let accepted = match self.handles().get(id) {
            Some(handle) => handle.cancel.send(true).is_ok(),
            None => false,
        };
        info!(job_id = %id, accepted, "cancellation requested");
        Ok(CancelAck {
            job_id: *id,
            state: status.state,
            accepted,
        })
    }

    /// Resolves once the job has reached a terminal state.
    pub async fn wait(&self, id: &JobId) -> Result<JobStatus, OrchestratorError> {
        let done = self.handles().get(id).map(|handle| handle.done.clone());
        if let Some(mut done) = done {
            // A closed channel means the driver task is gone either way.
            let _ = done.wait_for(|finished| *finished).await;
        }
        self.get_status(id)
    }

    /// Drops the job record and its work directory.
    pub async fn release(&self, id: &JobId) -> Result<bool, OrchestratorError> {
        let Some(job) = self.shared.store.get(id)? else {
            return Ok(false);
        };
        if !job.state.is_terminal() {
            if let Some(handle) = self.handles().get(id) {
                let _ = handle.cancel.send(true);
            }
            self.wait(id).await?;
        }
        self.handles().remove(id);
        run::remove_dir(&job.work_dir).await;
        Ok(self.shared.store.remove(id)?)
    }

    pub fn list_jobs(&self) -> Result<Vec<JobStatus>, OrchestratorError> {
        Ok(self
            .shared
            .store
            .list()?
            .iter()
            .map(RenderJob::status)
            .collect())
    }

    pub fn summary(&self) -> Result<OrchestratorSummary, OrchestratorError> {
        let mut summary = OrchestratorSummary::default();
        for job in self.shared.store.list()? {
            summary.total += 1;
            match job.state {
                JobState::Completed => summary.completed += 1,
                JobState::Failed => summary.failed += 1,
                _ => summary.active += 1,
            }
            *summary
                .by_state
                .entry(job.state.as_str().to_string())
                .or_default() += 1;
        }
        Ok(summary)
    }

    /// Removes terminal job records older than `max_age` and work
    /// directories not belonging to a live job.
    pub async fn sweep(&self, max_age: Duration) -> Result<SweepReport, OrchestratorError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::zero());
        let mut report = SweepReport::default();
        let jobs = self.shared.store.list()?;
        let mut live = Vec::new();
        for job in jobs {
            if job.state.is_terminal() && job.updated_at < cutoff {
                self.shared.store.remove(&job.id)?;
                self.handles().remove(&job.id);
                report.removed_jobs.push(job.id);
            } else if !job.state.is_terminal() {
                live.push(job.work_dir.clone());
            }
        }
        report.removed_dirs = sweep_work_root(&self.shared.settings.work_root, &live, max_age).await?;
        info!(
            jobs = report.removed_jobs.len(),
            dirs = report.removed_dirs.len(),
            "sweep finished"
        );
        Ok(report)
    }

    /// Retention window from configuration.
    pub async fn sweep_expired(&self) -> Result<SweepReport, OrchestratorError> {
        self.sweep(self.shared.settings.retention).await
    }
}

async fn sweep_work_root(
    work_root: &Path,
    live: &[PathBuf],
    max_age: Duration,
) -> Result<Vec<PathBuf>, OrchestratorError> {
    let mut removed = Vec::new();
    let mut entries = match async_fs::read_dir(work_root).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(removed),
        Err(err) => return Err(err.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = entry.metadata().await?;
        if !metadata.is_dir() || live.contains(&path) {
            continue;
        }
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .unwrap_or_default();
        if age >= max_age {
            async_fs::remove_dir_all(&path).await?;
            removed.push(path);
        }
    }
    Ok(removed)
}
