use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::collaborators::{ImageGenerator, PlaceholderPainter, RetryPolicy, SpeechSynthesizer};
use crate::media::MediaProber;
use crate::render::RenderOptions;
use crate::segment::{AudioRef, ImageRef, Segment};

/// Fetches narration and stills for one job through the collaborators.
/// Failures never propagate: a segment without audio is left for the
/// reconciler to degrade and a missing image becomes a painted placeholder.
pub struct MediaGatherer {
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub images: Arc<dyn ImageGenerator>,
    pub prober: Arc<dyn MediaProber>,
    pub painter: Arc<PlaceholderPainter>,
    pub retry: RetryPolicy,
    pub segment_timeout: Duration,
}

impl MediaGatherer {
    pub async fn gather_audio(
        &self,
        segments: &[Segment],
        options: &RenderOptions,
        work_dir: &Path,
        permits: &Semaphore,
    ) -> Vec<Option<AudioRef>> {
        let tasks = segments
            .iter()
            .map(|segment| self.audio_for(segment, options, work_dir, permits));
        join_all(tasks).await
    }

    pub async fn gather_images(
        &self,
        segments: &[Segment],
        options: &RenderOptions,
        work_dir: &Path,
        permits: &Semaphore,
    ) -> Vec<Vec<ImageRef>> {
        let tasks = segments
            .iter()
            .map(|segment| self.images_for(segment, options, work_dir, permits));
        join_all(tasks).await
    }

    async fn audio_for(
        &self,
        segment: &Segment,
        options: &RenderOptions,
        work_dir: &Path,
        permits: &Semaphore,
    ) -> Option<AudioRef> {
        let Ok(_permit) = permits.acquire().await else {
            return None;
        };
        let provided = segment
            .audio_ref
            .as_ref()
            .map(|audio| audio.path.clone())
            .filter(|path| path.exists());
        let path = match provided {
            Some(path) => path,
            None => self.synthesize(segment, options, work_dir).await?,
        };
        match timeout(self.segment_timeout, self.prober.duration(&path)).await {
            Ok(Ok(seconds)) if seconds.is_finite() && seconds > 0.0 => {
                debug!(segment = segment.index, seconds, "narration probed");
                Some(AudioRef::new(path, seconds))
            }
            Ok(Ok(seconds)) => {
                warn!(segment = segment.index, seconds, "narration has no usable length");
                None
            }
            Ok(Err(error)) => {
                warn!(segment = segment.index, %error, "narration probe failed");
                None
            }
            Err(_) => {
                warn!(segment = segment.index, "narration probe timed out");
                None
            }
        }
    }

    async fn synthesize(
        &self,
        segment: &Segment,
        options: &RenderOptions,
        work_dir: &Path,
    ) -> Option<PathBuf> {
        let dest = work_dir
            .join("audio")
            .join(format!("segment_{:03}.mp3", segment.index));
        if let Some(parent) = dest.parent() {
            if let Err(error) = tokio::fs::create_dir_all(parent).await {
                warn!(segment = segment.index, %error, "cannot create audio directory");
                return None;
            }
        }
        let speed = segment.emotional_tone.adjust_speed(options.speed);
        let voice = options.voice.as_deref();
        let attempt = self.retry.run("synthesize", |_| {
            self.synthesizer
                .synthesize(&segment.narration_text, voice, speed, &dest)
        });
        match timeout(self.segment_timeout, attempt).await {
            Ok(Ok(outcome)) => Some(outcome.result.path),
            Ok(Err(error)) => {
                warn!(segment = segment.index, %error, "synthesis failed, segment degraded");
                None
            }
            Err(_) => {
                warn!(segment = segment.index, "synthesis timed out, segment degraded");
                None
            }
        }
    }

    async fn images_for(
        &self,
        segment: &Segment,
        options: &RenderOptions,
        work_dir: &Path,
        permits: &Semaphore,
    ) -> Vec<ImageRef> {
        if !segment.image_refs.is_empty() {
            let mut images = Vec::with_capacity(segment.image_refs.len());
            for image in segment.ordered_images() {
                if image.path.exists() {
                    images.push(image.clone());
                } else {
                    warn!(
                        segment = segment.index,
                        path = %image.path.display(),
                        "supplied image missing, painting placeholder"
                    );
                    images.push(self.placeholder(segment, image.ordinal, work_dir).await);
                }
            }
            return images;
        }

        let prompts: Vec<String> = if segment.image_prompts.is_empty() {
            vec![segment.narration_text.clone(); segment.planned_image_count.max(1)]
        } else {
            segment.image_prompts.clone()
        };
        let tasks = prompts.iter().enumerate().map(|(ordinal, prompt)| {
            self.generate(segment, ordinal as u32, prompt, options, work_dir, permits)
        });
        join_all(tasks).await
    }

    async fn generate(
        &self,
        segment: &Segment,
        ordinal: u32,
        prompt: &str,
        options: &RenderOptions,
        work_dir: &Path,
        permits: &Semaphore,
    ) -> ImageRef {
        let dest = work_dir
            .join("images")
            .join(format!("segment_{:03}_{ordinal}.png", segment.index));
        let generated = match permits.acquire().await {
            Ok(_permit) => {
                if let Some(parent) = dest.parent() {
                    let _ = tokio::fs::create_dir_all(parent).await;
                }
                let style = options.style.as_deref();
                let attempt = self
                    .retry
                    .run("generate", |_| self.images.generate(prompt, style, &dest));
                match timeout(self.segment_timeout, attempt).await {
                    Ok(Ok(outcome)) if outcome.result.path.exists() => Some(outcome.result),
                    Ok(Ok(outcome)) => {
                        warn!(
                            segment = segment.index,
                            path = %outcome.result.path.display(),
                            "generator reported an image that is not on disk"
                        );
                        None
                    }
                    Ok(Err(error)) => {
                        warn!(segment = segment.index, ordinal, %error, "image generation failed");
                        None
                    }
                    Err(_) => {
                        warn!(segment = segment.index, ordinal, "image generation timed out");
                        None
                    }
                }
            }
            Err(_) => None,
        };
        match generated {
            Some(mut image) => {
                image.ordinal = ordinal;
                image
            }
            None => self.placeholder(segment, ordinal, work_dir).await,
        }
    }

    async fn placeholder(&self, segment: &Segment, ordinal: u32, work_dir: &Path) -> ImageRef {
        let dest = work_dir
            .join("placeholders")
            .join(format!("segment_{:03}_{ordinal}.png", segment.index));
        if let Err(error) = self.painter.paint(&segment.caption_text, &dest).await {
            // The emergency tier still renders a colour card for a missing file.
            warn!(segment = segment.index, %error, "placeholder could not be painted");
        }
        ImageRef::placeholder(dest, ordinal)
    }
}
