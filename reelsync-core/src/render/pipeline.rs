use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs as async_fs;
use tracing::{debug, info};

use crate::executor::CommandExecutor;
use crate::timeline::TimedSegment;

use super::ffmpeg::{
    audio_mix_filter, audio_placements, subtitles_filter, write_captions, AudioPlacement,
    FfmpegRunner,
};
use super::{Artifact, BackendTier, RenderError, RenderRequest, RenderResult, RenderSettings};

/// What distinguishes the clip-based tiers from each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipStyle {
    pub zoom: bool,
    pub styled_captions: bool,
    pub loudnorm: bool,
}

/// Renders one intermediate clip per segment, then crossfades the clips and
/// lays the narration tracks under them.
#[derive(Debug)]
pub struct ClipPipeline {
    tier: BackendTier,
    style: ClipStyle,
    runner: FfmpegRunner,
}

impl ClipPipeline {
    pub fn new(
        tier: BackendTier,
        style: ClipStyle,
        settings: RenderSettings,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            tier,
            style,
            runner: FfmpegRunner::new(settings, executor),
        }
    }

    pub fn tier(&self) -> BackendTier {
        self.tier
    }

    pub async fn render(&self, request: &RenderRequest) -> RenderResult<Artifact> {
        let placements = audio_placements(&request.timeline);
        if placements.is_empty() {
            return Err(RenderError::missing_audio(
                "no segment has a narration track",
            ));
        }
        if let Some(missing) = placements.iter().find(|p| !p.path.exists()) {
            return Err(RenderError::missing_audio(format!(
                "narration for segment {} is gone: {}",
                missing.segment,
                missing.path.display()
            )));
        }

        let clips_dir = request.work_dir.join("clips").join(self.tier.as_str());
        async_fs::create_dir_all(&clips_dir).await?;

        let mut clips = Vec::with_capacity(request.timeline.len());
        for segment in &request.timeline.segments {
            let clip = clips_dir.join(format!("segment_{:03}.mp4", segment.index()));
            let args = self.clip_args(request, segment, &clip)?;
            self.runner.run(self.tier, &request.work_dir, &args).await?;
            debug!(
                job_id = %request.job_id,
                tier = %self.tier,
                segment = segment.index(),
                "segment clip rendered"
            );
            clips.push(clip);
        }

        let captions = if request.burn_captions() {
            Some(write_captions(&request.work_dir, &request.captions).await?)
        } else {
            None
        };

        let output = request.work_dir.join(format!("{}.mp4", self.tier));
        let args = self.assemble_args(request, &clips, &placements, captions.as_deref(), &output);
        self.runner.run(self.tier, &request.work_dir, &args).await?;
        info!(
            job_id = %request.job_id,
            tier = %self.tier,
            total_duration = request.timeline.total_duration,
            "render assembled"
        );
        Ok(Artifact {
            path: output,
            tier: self.tier,
            has_audio: true,
            duration_seconds: request.timeline.total_duration,
        })
    }

    fn clip_args(
        &self,
        request: &RenderRequest,
        segment: &TimedSegment,
        output: &Path,
    ) -> RenderResult<Vec<String>> {
        let settings = self.runner.settings();
        let mut args = self.runner.base_args();
        let mut filters = Vec::with_capacity(segment.image_slices.len() + 1);
        let mut labels = String::new();
        let zooms: Vec<_> = request.transitions.zooms_for(segment.index()).collect();

        for (position, slice) in segment.image_slices.iter().enumerate() {
            if !slice.image.path.exists() {
                return Err(RenderError::codec(format!(
                    "image for segment {} is missing: {}",
                    segment.index(),
                    slice.image.path.display()
                )));
            }
            let duration = slice.duration();
            args.extend([
                "-loop".to_string(),
                "1".to_string(),
                "-framerate".to_string(),
                settings.fps.to_string(),
                "-t".to_string(),
                format!("{duration:.3}"),
                "-i".to_string(),
                slice.image.path.to_string_lossy().to_string(),
            ]);
            let shape = match zooms.get(position).filter(|_| self.style.zoom) {
                Some(zoom) => {
                    let (w, h) = (settings.width * 2, settings.height * 2);
                    format!(
                        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},{},setsar=1",
                        zoom.zoompan_filter(settings.fps, settings.width, settings.height)
                    )
                }
                None => format!("{},fps={}", self.runner.fit_frame_filter(), settings.fps),
            };
            filters.push(format!(
                "[{position}:v]{shape},trim=duration={duration:.3},setpts=PTS-STARTPTS[v{position}]"
            ));
            labels.push_str(&format!("[v{position}]"));
        }
        filters.push(format!(
            "{labels}concat=n={}:v=1:a=0,format={}[vout]",
            segment.image_slices.len(),
            settings.pix_fmt
        ));

        args.push("-filter_complex".to_string());
        args.push(filters.join(";"));
        args.extend(["-map".to_string(), "[vout]".to_string(), "-an".to_string()]);
        args.extend(self.runner.video_encode_args());
        args.extend([
            "-t".to_string(),
            format!("{:.3}", segment.duration()),
            output.to_string_lossy().to_string(),
        ]);
        Ok(args)
    }

    fn assemble_args(
        &self,
        request: &RenderRequest,
        clips: &[PathBuf],
        placements: &[AudioPlacement],
        captions: Option<&Path>,
        output: &Path,
    ) -> Vec<String> {
        let settings = self.runner.settings();
        let timeline = &request.timeline;
        let mut args = self.runner.base_args();
        for clip in clips {
            args.push("-i".to_string());
            args.push(clip.to_string_lossy().to_string());
        }
        for placement in placements {
            args.push("-i".to_string());
            args.push(placement.path.to_string_lossy().to_string());
        }

        let mut filters = Vec::new();
        let mut current = "[0:v]".to_string();
        for next in 1..clips.len() {
            let label = format!("[x{next}]");
            let joint = match request.transitions.crossfade_after(next - 1) {
                Some(fade) if !fade.is_cut() => fade.xfade_filter(),
                _ => "concat=n=2:v=1:a=0".to_string(),
            };
            filters.push(format!("{current}[{next}:v]{joint}{label}"));
            current = label;
        }
        let mut finish = Vec::new();
        if let Some(path) = captions {
            let style = self
                .style
                .styled_captions
                .then(|| settings.captions.force_style());
            finish.push(subtitles_filter(path, style.as_deref()));
        }
        finish.push(format!("format={}", settings.pix_fmt));
        filters.push(format!("{current}{}[vout]", finish.join(",")));

        let loudnorm = (self.style.loudnorm && settings.loudnorm.enabled)
            .then_some(&settings.loudnorm);
        filters.push(audio_mix_filter(
            placements,
            clips.len(),
            timeline.total_duration,
            settings.sample_rate,
            loudnorm,
        ));

        args.push("-filter_complex".to_string());
        args.push(filters.join(";"));
        args.extend([
            "-map".to_string(),
            "[vout]".to_string(),
            "-map".to_string(),
            "[aout]".to_string(),
        ]);
        args.extend(self.runner.video_encode_args());
        args.extend(self.runner.audio_encode_args());
        args.extend([
            "-t".to_string(),
            format!("{:.3}", timeline.total_duration),
            "-movflags".to_string(),
            "+faststart".to_string(),
            output.to_string_lossy().to_string(),
        ]);
        args
    }
}
