use std::path::Path;
use std::sync::Arc;

use tokio::fs as async_fs;
use tokio::sync::{watch, Semaphore};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::captions::{to_srt, CaptionCue, CaptionMode};
use crate::job::{AttemptOutcome, FailureKind, JobId, JobState, RenderAttempt, RenderJob};
use crate::render::{Artifact, BackendTier, RenderError, RenderErrorKind, RenderRequest};
use crate::timeline::Timeline;

use super::error::JobAbort;
use super::Shared;

impl Shared {
    /// Runs one job to a terminal state, honouring cancellation and the job
    /// timeout. Dropping the pipeline future kills any running ffmpeg.
    pub(crate) async fn drive(self: Arc<Self>, id: JobId, mut cancel: watch::Receiver<bool>) {
        let job_timeout = self.settings.job_timeout;
        let outcome = tokio::select! {
            result = timeout(job_timeout, self.execute(id)) => match result {
                Ok(result) => result,
                Err(_) => Err(JobAbort::new(
                    FailureKind::TimedOut,
                    format!("job exceeded {}s", job_timeout.as_secs()),
                )),
            },
            _ = wait_cancelled(&mut cancel) => Err(JobAbort::new(
                FailureKind::Cancelled,
                "cancelled on request",
            )),
        };
        if let Err(abort) = outcome {
            self.abort(id, abort).await;
        }
        self.locks.forget(&id);
    }

    async fn abort(&self, id: JobId, abort: JobAbort) {
        match self.store.get(&id) {
            Ok(Some(job)) if job.state == JobState::Completed => {
                debug!(job_id = %id, kind = %abort.kind, "job already completed, nothing to abort");
                return;
            }
            _ => {}
        }
        warn!(job_id = %id, kind = %abort.kind, message = %abort.message, "job failed");
        let job = match self.mutate(id, |job| {
            if let Some(attempt) = job.attempts.last_mut() {
                if attempt.outcome.is_none() {
                    attempt.finish(AttemptOutcome::Aborted {
                        reason: abort.kind.to_string(),
                    });
                }
            }
            job.artifact_path = None;
            job.captions_path = None;
            job.fail(abort.kind.clone(), abort.message.clone());
        }) {
            Ok(job) => job,
            Err(err) => {
                error!(job_id = %id, message = %err.message, "cannot record job failure");
                return;
            }
        };

        // A timeout or cancellation can land after the artifact was moved out.
        for extension in ["mp4", "srt"] {
            remove_file(&self.settings.output_dir.join(format!("{id}.{extension}"))).await;
        }

        let keep = job.options.retain_intermediates
            && !matches!(abort.kind, FailureKind::Cancelled | FailureKind::TimedOut);
        if !keep {
            self.preserve_logs(&job).await;
            remove_dir(&job.work_dir).await;
        }
    }

    /// Copies the tier logs out of a work directory that is about to go.
    async fn preserve_logs(&self, job: &RenderJob) {
        let source = job.work_dir.join("logs");
        let mut entries = match async_fs::read_dir(&source).await {
            Ok(entries) => entries,
            Err(_) => return,
        };
        let target = self.settings.logs_dir.join(job.id.to_string());
        if let Err(error) = async_fs::create_dir_all(&target).await {
            warn!(job_id = %job.id, %error, "cannot keep render logs");
            return;
        }
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("log") {
                continue;
            }
            if let Some(name) = path.file_name() {
                if let Err(error) = async_fs::copy(&path, target.join(name)).await {
                    warn!(job_id = %job.id, path = %path.display(), %error, "cannot keep render log");
                }
            }
        }
        debug!(job_id = %job.id, path = %target.display(), "render logs kept");
    }

    /// Load, change and store a job under the store's lock.
    pub(crate) fn mutate<F>(&self, id: JobId, change: F) -> Result<RenderJob, JobAbort>
    where
        F: FnOnce(&mut RenderJob),
    {
        let mut job = self
            .store
            .get(&id)?
            .ok_or_else(|| JobAbort::internal(format!("job {id} vanished from the store")))?;
        change(&mut job);
        self.store.update(&job)?;
        Ok(job)
    }

    async fn execute(&self, id: JobId) -> Result<(), JobAbort> {
        let job = self
            .store
            .get(&id)?
            .ok_or_else(|| JobAbort::internal(format!("job {id} vanished from the store")))?;
        async_fs::create_dir_all(&job.work_dir).await?;
        info!(job_id = %id, segments = job.segments.len(), "job started");

        let (timeline, captions) = self.build_timeline(&job).await?;
        let job = self.mutate(id, |job| job.transition(JobState::TimelineBuilt))?;

        let lock = self.locks.acquire(id, &job.work_dir).await?;
        let artifact = self
            .render_with_escalation(&job, &timeline, &captions)
            .await?;
        self.complete(id, &job, artifact, &captions).await?;
        drop(lock);

        if !job.options.retain_intermediates {
            remove_dir(&job.work_dir).await;
        }
        Ok(())
    }

    async fn build_timeline(
        &self,
        job: &RenderJob,
    ) -> Result<(Timeline, Vec<CaptionCue>), JobAbort> {
        let permits = Semaphore::new(self.settings.media_concurrency.max(1));
        let id = job.id;
        let audio = async {
            let audio = self
                .gatherer
                .gather_audio(&job.segments, &job.options, &job.work_dir, &permits)
                .await;
            self.mutate(id, RenderJob::mark_audio_ready)?;
            debug!(job_id = %id, "narration gathered");
            Ok::<_, JobAbort>(audio)
        };
        let images = async {
            let images = self
                .gatherer
                .gather_images(&job.segments, &job.options, &job.work_dir, &permits)
                .await;
            self.mutate(id, RenderJob::mark_images_ready)?;
            debug!(job_id = %id, "images gathered");
            Ok::<_, JobAbort>(images)
        };
        let (audio, images) = tokio::try_join!(audio, images)?;

        let segments: Vec<_> = job
            .segments
            .iter()
            .cloned()
            .zip(audio)
            .zip(images)
            .map(|((mut segment, audio), images)| {
                segment.audio_ref = audio;
                segment.image_refs = images;
                segment
            })
            .collect();

        let timeline = self
            .reconciler
            .reconcile(&segments)
            .map_err(|err| JobAbort::new(FailureKind::Reconcile, err.to_string()))?;
        let captions = self.aligner.align(&timeline);
        info!(
            job_id = %id,
            total_duration = timeline.total_duration,
            degraded = ?timeline.degraded_segments(),
            cues = captions.len(),
            "timeline built"
        );
        let (stored, cues) = (timeline.clone(), captions.clone());
        self.mutate(id, move |job| {
            job.segments = segments;
            job.timeline = Some(stored);
            job.captions = cues;
        })?;
        Ok((timeline, captions))
    }

    async fn render_with_escalation(
        &self,
        job: &RenderJob,
        timeline: &Timeline,
        captions: &[CaptionCue],
    ) -> Result<Artifact, JobAbort> {
        let request = RenderRequest {
            job_id: job.id.to_string(),
            timeline: timeline.clone(),
            transitions: self.compositor.compose(timeline),
            captions: captions.to_vec(),
            options: job.options.clone(),
            work_dir: job.work_dir.clone(),
        };

        let mut tier_index = 0usize;
        let mut last_failure = FailureKind::BackendsExhausted { last: None };
        let mut last_message = String::from("no render tier configured");
        for attempt_number in 0..self.settings.max_attempts {
            let Some(backend) = self.tiers.get(tier_index) else {
                break;
            };
            let tier = backend.tier();
            self.mutate(job.id, |job| {
                job.attempts.push(RenderAttempt::start(tier));
                job.transition(JobState::Rendering);
            })?;
            info!(job_id = %job.id, tier = %tier, attempt = attempt_number + 1, "render attempt");

            let result = {
                let _slot = self
                    .render_slots
                    .acquire()
                    .await
                    .map_err(|err| JobAbort::internal(err.to_string()))?;
                match timeout(self.settings.attempt_timeout, backend.render(&request)).await {
                    Ok(result) => result,
                    Err(_) => Err(RenderError::timeout(format!(
                        "{tier} render exceeded {}s",
                        self.settings.attempt_timeout.as_secs()
                    ))),
                }
            };

            let error = match result {
                Ok(artifact) => {
                    self.mutate(job.id, |job| job.transition(JobState::Verifying))?;
                    match self.verify(&artifact, timeline).await {
                        Ok(()) => {
                            self.finish_attempt(job.id, AttemptOutcome::Success)?;
                            return Ok(artifact);
                        }
                        Err(reason) => {
                            warn!(job_id = %job.id, tier = %tier, %reason, "verification failed");
                            self.finish_attempt(
                                job.id,
                                AttemptOutcome::VerificationFailed {
                                    reason: reason.clone(),
                                },
                            )?;
                            last_failure = FailureKind::VerificationFailed;
                            last_message = format!("{tier}: {reason}");
                            tier_index += 1;
                            continue;
                        }
                    }
                }
                Err(error) => error,
            };

            warn!(job_id = %job.id, tier = %tier, kind = %error.kind, message = %error.message, "render attempt failed");
            self.finish_attempt(
                job.id,
                AttemptOutcome::RenderFailed {
                    kind: error.kind,
                    message: error.message.clone(),
                },
            )?;
            last_failure = FailureKind::BackendsExhausted {
                last: Some(error.kind),
            };
            last_message = format!("{tier}: {error}");
            tier_index = self.next_tier(tier_index, error.kind);
        }
        Err(JobAbort::new(last_failure, last_message))
    }

    /// Lower tiers need narration as much as the failing one, so a missing
    /// track jumps straight to the emergency tier.
    fn next_tier(&self, current: usize, kind: RenderErrorKind) -> usize {
        if kind == RenderErrorKind::MissingAudioTrack {
            if let Some(offset) = self.tiers[current + 1..]
                .iter()
                .position(|backend| backend.tier() == BackendTier::Emergency)
            {
                return current + 1 + offset;
            }
        }
        current + 1
    }

    fn finish_attempt(&self, id: JobId, outcome: AttemptOutcome) -> Result<(), JobAbort> {
        self.mutate(id, |job| {
            if let Some(attempt) = job.attempts.last_mut() {
                attempt.finish(outcome);
            }
        })?;
        Ok(())
    }

    /// Video must span the timeline on every tier. Audio must match both
    /// the timeline and the video, except on the emergency tier.
    async fn verify(&self, artifact: &Artifact, timeline: &Timeline) -> Result<(), String> {
        let info = self
            .prober
            .probe(&artifact.path)
            .await
            .map_err(|err| err.to_string())?;
        if info.video_frames() == 0 {
            return Err("artifact has no video frames".to_string());
        }
        let tolerance = self.settings.verification_tolerance;
        let expected = timeline.total_duration;
        let video = info
            .video_duration()
            .ok_or_else(|| "artifact reports no video duration".to_string())?;
        if (video - expected).abs() > tolerance {
            return Err(format!(
                "video runs {video:.3}s against a {expected:.3}s timeline"
            ));
        }
        if artifact.tier == BackendTier::Emergency {
            return Ok(());
        }
        let audio = info
            .audio_duration()
            .ok_or_else(|| "artifact has no audio stream".to_string())?;
        if (audio - expected).abs() > tolerance {
            return Err(format!(
                "audio runs {audio:.3}s against a {expected:.3}s timeline"
            ));
        }
        if (audio - video).abs() > tolerance {
            return Err(format!("audio runs {audio:.3}s against {video:.3}s of video"));
        }
        Ok(())
    }

    async fn complete(
        &self,
        id: JobId,
        job: &RenderJob,
        artifact: Artifact,
        captions: &[CaptionCue],
    ) -> Result<(), JobAbort> {
        async_fs::create_dir_all(&self.settings.output_dir).await?;
        let destination = self.settings.output_dir.join(format!("{id}.mp4"));
        move_file(&artifact.path, &destination).await?;

        let captions_path = if job.options.resolved_caption_mode() == CaptionMode::Sidecar {
            let path = self.settings.output_dir.join(format!("{id}.srt"));
            async_fs::write(&path, to_srt(captions)).await?;
            Some(path)
        } else {
            None
        };

        let completed = self.mutate(id, |job| {
            job.artifact_path = Some(destination.clone());
            job.captions_path = captions_path.clone();
            job.backend_tier_used = Some(artifact.tier);
            job.transition(JobState::Completed);
        })?;
        info!(
            job_id = %id,
            tier = %artifact.tier,
            path = %destination.display(),
            message = %completed.message(),
            "job completed"
        );
        Ok(())
    }
}

async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match async_fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(_) => {
            // Output directory on another filesystem.
            async_fs::copy(from, to).await?;
            async_fs::remove_file(from).await
        }
    }
}

async fn remove_file(path: &Path) {
    match async_fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "partial output removed"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => warn!(path = %path.display(), %error, "failed to remove partial output"),
    }
}

pub(crate) async fn remove_dir(path: &Path) {
    match async_fs::remove_dir_all(path).await {
        Ok(()) => debug!(path = %path.display(), "work directory removed"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => warn!(path = %path.display(), %error, "failed to remove work directory"),
    }
}
