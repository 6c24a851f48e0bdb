use tracing::{debug, warn};

use crate::config::TimelineSection;
use crate::segment::{ImageRef, Segment};

use super::models::{ImageSlice, TimedSegment, Timeline};
use super::{ReconcileError, ReconcileResult};

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Shortest time any image stays on screen (`Dmin`).
    pub min_image_seconds: f64,
    pub transition_overlap_seconds: f64,
    /// Duration substituted when a segment has no usable audio.
    pub default_segment_seconds: f64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            min_image_seconds: 2.0,
            transition_overlap_seconds: 1.0,
            default_segment_seconds: 5.0,
        }
    }
}

impl From<&TimelineSection> for ReconcilerConfig {
    fn from(section: &TimelineSection) -> Self {
        Self {
            min_image_seconds: section.min_image_seconds,
            transition_overlap_seconds: section.transition_overlap_seconds.max(0.0),
            default_segment_seconds: section.default_segment_seconds,
        }
    }
}

/// Layout of one segment relative to its own start.
#[derive(Debug, Clone)]
struct SegmentLayout {
    audio_seconds: f64,
    audio_missing: bool,
    video_seconds: f64,
    freeze_frame_seconds: f64,
    dropped_images: usize,
    slices: Vec<(ImageRef, f64)>,
}

/// Builds the definitive timeline from measured audio durations.
///
/// Audio is authoritative and never time-stretched: when the images cannot
/// cover the narration the last image is held (freeze-frame), and when the
/// images would outlast it their slices shrink proportionally, never below
/// `min_image_seconds`.
#[derive(Debug, Clone, Default)]
pub struct DurationReconciler {
    config: ReconcilerConfig,
}

impl DurationReconciler {
    pub fn new(config: ReconcilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn reconcile(&self, segments: &[Segment]) -> ReconcileResult<Timeline> {
        if segments.is_empty() {
            return Err(ReconcileError::NoSegments);
        }
        let layouts = segments
            .iter()
            .map(|segment| self.layout_segment(segment))
            .collect::<ReconcileResult<Vec<_>>>()?;

        let overlaps: Vec<f64> = layouts
            .windows(2)
            .map(|pair| self.boundary_overlap(pair[0].video_seconds, pair[1].video_seconds))
            .collect();

        let mut timed = Vec::with_capacity(segments.len());
        let mut start = 0.0f64;
        for (position, (segment, layout)) in segments.iter().zip(layouts).enumerate() {
            let end = start + layout.video_seconds;
            let image_slices = place_slices(layout.slices, start, end);
            let degraded = layout.audio_missing || image_slices.iter().any(|s| s.image.placeholder);
            if degraded {
                warn!(
                    segment = segment.index,
                    audio_missing = layout.audio_missing,
                    "segment degraded"
                );
            }
            timed.push(TimedSegment {
                segment: segment.clone(),
                start_offset: start,
                end_offset: end,
                audio_seconds: layout.audio_seconds,
                degraded,
                audio_missing: layout.audio_missing,
                freeze_frame_seconds: layout.freeze_frame_seconds,
                dropped_images: layout.dropped_images,
                image_slices,
            });
            start = end - overlaps.get(position).copied().unwrap_or(0.0);
        }

        let total_duration = timed.last().map(|s| s.end_offset).unwrap_or(0.0);
        let timeline = Timeline {
            segments: timed,
            overlaps,
            total_duration,
        };
        timeline.check_invariants()?;
        debug!(
            segments = timeline.len(),
            total_duration = timeline.total_duration,
            "timeline reconciled"
        );
        Ok(timeline)
    }

    /// Crossfade length between two neighbours. Short neighbours get half of
    /// the shorter duration so neither runs out of screen time.
    pub fn boundary_overlap(&self, left_seconds: f64, right_seconds: f64) -> f64 {
        let overlap = self.config.transition_overlap_seconds;
        if overlap <= 0.0 {
            return 0.0;
        }
        let threshold = 2.0 * overlap;
        if left_seconds < threshold || right_seconds < threshold {
            left_seconds.min(right_seconds) / 2.0
        } else {
            overlap
        }
    }

    /// Number of images that fit into `audio_seconds` at `min_image_seconds`
    /// each, bounded by what is available.
    pub fn select_image_count(&self, audio_seconds: f64, available: usize) -> usize {
        if available == 0 {
            return 0;
        }
        let fit = (audio_seconds / self.config.min_image_seconds + EPSILON).floor();
        let fit = if fit.is_finite() && fit >= 1.0 {
            fit as usize
        } else {
            1
        };
        fit.clamp(1, available)
    }

    fn layout_segment(&self, segment: &Segment) -> ReconcileResult<SegmentLayout> {
        let measured = segment
            .audio_ref
            .as_ref()
            .map(|audio| audio.duration_seconds)
            .filter(|seconds| seconds.is_finite() && *seconds > 0.0);
        let audio_missing = measured.is_none();
        let audio_seconds = measured.unwrap_or(self.config.default_segment_seconds);

        let images = segment.ordered_images();
        if images.is_empty() {
            return Err(ReconcileError::NoImages {
                index: segment.index,
            });
        }
        let selected = self.select_image_count(audio_seconds, images.len());
        let chosen: Vec<ImageRef> = images.into_iter().take(selected).cloned().collect();
        let dropped_images = segment.image_refs.len() - chosen.len();

        let floor = self.config.min_image_seconds;
        let video_seconds = audio_seconds.max(chosen.len() as f64 * floor);
        let natural: Vec<f64> = chosen
            .iter()
            .map(|image| image.display_seconds.unwrap_or(floor).max(floor))
            .collect();
        let natural_total: f64 = natural.iter().sum();

        let (durations, freeze_frame_seconds) = if natural_total + EPSILON < video_seconds {
            // Too few images for the narration: hold the last one.
            let hold = video_seconds - natural_total;
            let mut durations = natural;
            if let Some(last) = durations.last_mut() {
                *last += hold;
            }
            (durations, hold)
        } else if natural_total > video_seconds + EPSILON {
            (shrink_to_fit(&natural, video_seconds, floor), 0.0)
        } else {
            (natural, 0.0)
        };

        Ok(SegmentLayout {
            audio_seconds,
            audio_missing,
            video_seconds,
            freeze_frame_seconds,
            dropped_images,
            slices: chosen.into_iter().zip(durations).collect(),
        })
    }
}

/// Proportionally scales `natural` down to `target`, pinning entries that
/// would fall below `floor` at the floor and rescaling the rest.
fn shrink_to_fit(natural: &[f64], target: f64, floor: f64) -> Vec<f64> {
    let mut pinned = vec![false; natural.len()];
    loop {
        let pinned_total = pinned.iter().filter(|p| **p).count() as f64 * floor;
        let free_total: f64 = natural
            .iter()
            .zip(&pinned)
            .filter(|(_, p)| !**p)
            .map(|(value, _)| *value)
            .sum();
        if free_total <= EPSILON {
            return vec![target / natural.len() as f64; natural.len()];
        }
        let scale = (target - pinned_total) / free_total;
        let mut changed = false;
        for (value, pin) in natural.iter().zip(pinned.iter_mut()) {
            if !*pin && value * scale < floor - EPSILON {
                *pin = true;
                changed = true;
            }
        }
        if !changed {
            return natural
                .iter()
                .zip(&pinned)
                .map(|(value, pin)| if *pin { floor } else { value * scale })
                .collect();
        }
    }
}

/// Lays durations end to end from `start`; the final slice is snapped to
/// `end` so rounding never leaves a gap.
fn place_slices(slices: Vec<(ImageRef, f64)>, start: f64, end: f64) -> Vec<ImageSlice> {
    let count = slices.len();
    let mut cursor = start;
    slices
        .into_iter()
        .enumerate()
        .map(|(position, (image, duration))| {
            let slice_start = cursor;
            let slice_end = if position + 1 == count {
                end
            } else {
                (cursor + duration).min(end)
            };
            cursor = slice_end;
            ImageSlice {
                image,
                slice_start,
                slice_end,
            }
        })
        .collect()
}
