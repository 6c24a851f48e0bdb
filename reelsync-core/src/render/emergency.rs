use std::path::Path;
use std::sync::Arc;

use tokio::fs as async_fs;
use tracing::{info, warn};

use crate::executor::CommandExecutor;
use crate::timeline::Timeline;

use super::ffmpeg::{audio_mix_filter, audio_placements, FfmpegRunner};
use super::{Artifact, BackendTier, RenderBackend, RenderRequest, RenderResult, RenderSettings};

/// Last resort: one still per segment, hard cuts, whatever narration is on
/// disk. Missing images become colour cards and missing audio only drops
/// the audio stream, so the tier always yields a video.
#[derive(Debug)]
pub struct EmergencyBackend {
    runner: FfmpegRunner,
}

impl EmergencyBackend {
    pub fn new(settings: RenderSettings, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            runner: FfmpegRunner::new(settings, executor),
        }
    }

    /// Screen time of each segment once overlaps are removed; sums to the
    /// timeline total.
    fn exclusive_durations(timeline: &Timeline) -> Vec<f64> {
        (0..timeline.len())
            .filter_map(|position| timeline.exclusive_window(position))
            .map(|(start, end)| (end - start).max(0.0))
            .collect()
    }

    fn args(&self, request: &RenderRequest, output: &Path) -> (Vec<String>, bool) {
        let settings = self.runner.settings();
        let timeline = &request.timeline;
        let mut args = self.runner.base_args();
        let mut filters = Vec::new();
        let mut labels = String::new();
        let durations = Self::exclusive_durations(timeline);

        for (position, (segment, duration)) in timeline.segments.iter().zip(&durations).enumerate()
        {
            let still = segment
                .image_slices
                .first()
                .map(|slice| slice.image.path.clone())
                .filter(|path| path.exists());
            match still {
                Some(path) => args.extend([
                    "-loop".to_string(),
                    "1".to_string(),
                    "-framerate".to_string(),
                    settings.fps.to_string(),
                    "-t".to_string(),
                    format!("{duration:.3}"),
                    "-i".to_string(),
                    path.to_string_lossy().to_string(),
                ]),
                None => {
                    warn!(
                        job_id = %request.job_id,
                        segment = segment.index(),
                        "no image on disk, using colour card"
                    );
                    args.extend([
                        "-f".to_string(),
                        "lavfi".to_string(),
                        "-t".to_string(),
                        format!("{duration:.3}"),
                        "-i".to_string(),
                        format!(
                            "color=c={}:s={}x{}:r={}",
                            settings.card_color, settings.width, settings.height, settings.fps
                        ),
                    ]);
                }
            }
            filters.push(format!(
                "[{position}:v]{},fps={},trim=duration={duration:.3},setpts=PTS-STARTPTS[v{position}]",
                self.runner.fit_frame_filter(),
                settings.fps
            ));
            labels.push_str(&format!("[v{position}]"));
        }
        filters.push(format!(
            "{labels}concat=n={}:v=1:a=0,format={}[vout]",
            durations.len(),
            settings.pix_fmt
        ));

        let placements: Vec<_> = audio_placements(timeline)
            .into_iter()
            .filter(|placement| placement.path.exists())
            .collect();
        let has_audio = !placements.is_empty();
        for placement in &placements {
            args.push("-i".to_string());
            args.push(placement.path.to_string_lossy().to_string());
        }
        if has_audio {
            filters.push(audio_mix_filter(
                &placements,
                durations.len(),
                timeline.total_duration,
                settings.sample_rate,
                None,
            ));
        }

        args.push("-filter_complex".to_string());
        args.push(filters.join(";"));
        args.extend(["-map".to_string(), "[vout]".to_string()]);
        if has_audio {
            args.extend(["-map".to_string(), "[aout]".to_string()]);
        }
        args.extend(self.runner.video_encode_args());
        if has_audio {
            args.extend(self.runner.audio_encode_args());
        } else {
            args.push("-an".to_string());
        }
        args.extend([
            "-t".to_string(),
            format!("{:.3}", timeline.total_duration),
            "-movflags".to_string(),
            "+faststart".to_string(),
            output.to_string_lossy().to_string(),
        ]);
        (args, has_audio)
    }
}

#[async_trait::async_trait]
impl RenderBackend for EmergencyBackend {
    fn tier(&self) -> BackendTier {
        BackendTier::Emergency
    }

    async fn render(&self, request: &RenderRequest) -> RenderResult<Artifact> {
        async_fs::create_dir_all(&request.work_dir).await?;
        let output = request.work_dir.join(format!("{}.mp4", BackendTier::Emergency));
        let (args, has_audio) = self.args(request, &output);
        self.runner
            .run(BackendTier::Emergency, &request.work_dir, &args)
            .await?;
        info!(
            job_id = %request.job_id,
            has_audio,
            total_duration = request.timeline.total_duration,
            "emergency render finished"
        );
        Ok(Artifact {
            path: output,
            tier: BackendTier::Emergency,
            has_audio,
            duration_seconds: request.timeline.total_duration,
        })
    }
}
