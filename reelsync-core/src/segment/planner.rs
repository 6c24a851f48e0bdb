use tracing::debug;

use crate::config::PlannerSection;

use super::models::{ScriptBlock, Segment};
use super::{PlanResult, PlanningError};

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Speech rate used only for the provisional estimate. Voice and language
    /// dependent, so it is data rather than a constant.
    pub words_per_minute: f64,
    pub seconds_per_image: f64,
    pub max_images_per_segment: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            words_per_minute: 120.0,
            seconds_per_image: 6.0,
            max_images_per_segment: 3,
        }
    }
}

impl From<&PlannerSection> for PlannerConfig {
    fn from(section: &PlannerSection) -> Self {
        Self {
            words_per_minute: section.words_per_minute,
            seconds_per_image: section.seconds_per_image,
            max_images_per_segment: section.max_images_per_segment.max(1),
        }
    }
}

/// Turns script blocks into segments with a provisional duration estimate.
/// The estimate only decides how many images to request; final timing is
/// taken from the real audio by the reconciler.
#[derive(Debug, Clone)]
pub struct SegmentPlanner {
    config: PlannerConfig,
}

impl SegmentPlanner {
    pub fn new(config: PlannerConfig) -> PlanResult<Self> {
        if !(config.words_per_minute > 0.0) {
            return Err(PlanningError::InvalidRate(config.words_per_minute));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn plan(&self, blocks: &[ScriptBlock]) -> PlanResult<Vec<Segment>> {
        if blocks.is_empty() {
            return Err(PlanningError::EmptyScript);
        }
        let mut segments = Vec::with_capacity(blocks.len());
        for (index, block) in blocks.iter().enumerate() {
            let text = block.text.trim();
            if text.is_empty() {
                return Err(PlanningError::EmptyBlock { index });
            }
            let estimated_seconds = block
                .target_seconds
                .filter(|hint| *hint > 0.0)
                .unwrap_or_else(|| self.estimate_seconds(text));
            let planned_image_count = self.image_count_for(estimated_seconds);

            let mut image_prompts: Vec<String> = block
                .image_prompts
                .iter()
                .map(|prompt| prompt.trim())
                .filter(|prompt| !prompt.is_empty())
                .take(planned_image_count)
                .map(str::to_string)
                .collect();
            while image_prompts.len() < planned_image_count {
                image_prompts.push(text.to_string());
            }

            let caption_text = block
                .caption
                .as_deref()
                .map(str::trim)
                .filter(|caption| !caption.is_empty())
                .unwrap_or(text)
                .to_string();

            debug!(
                segment = index,
                estimated_seconds, planned_image_count, "planned segment"
            );
            segments.push(Segment {
                index,
                narration_text: text.to_string(),
                audio_ref: None,
                image_refs: Vec::new(),
                caption_text,
                emotional_tone: block.tone,
                image_prompts,
                planned_image_count,
                estimated_seconds,
            });
        }
        Ok(segments)
    }

    pub fn estimate_seconds(&self, text: &str) -> f64 {
        let words = text.split_whitespace().count() as f64;
        words / self.config.words_per_minute * 60.0
    }

    /// One image per started `seconds_per_image` of speech, at least one,
    /// capped at `max_images_per_segment`.
    pub fn image_count_for(&self, estimated_seconds: f64) -> usize {
        let per_image = self.config.seconds_per_image.max(f64::EPSILON);
        let count = (estimated_seconds / per_image).ceil();
        let count = if count.is_finite() && count >= 1.0 {
            count as usize
        } else {
            1
        };
        count.clamp(1, self.config.max_images_per_segment.max(1))
    }
}

/// Checks segments handed directly to the orchestrator: indices must run
/// densely from zero and every segment needs narration.
pub fn validate_segments(segments: &[Segment]) -> PlanResult<()> {
    if segments.is_empty() {
        return Err(PlanningError::EmptyScript);
    }
    for (expected, segment) in segments.iter().enumerate() {
        if segment.index != expected {
            return Err(PlanningError::SparseIndex {
                expected,
                found: segment.index,
            });
        }
        if segment.narration_text.trim().is_empty() {
            return Err(PlanningError::EmptyBlock { index: expected });
        }
    }
    Ok(())
}
