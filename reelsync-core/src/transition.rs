use serde::{Deserialize, Serialize};

use crate::config::TransitionsSection;
use crate::timeline::Timeline;

/// Overlaps shorter than this are rendered as a hard cut.
pub const MIN_CROSSFADE_SECONDS: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct TransitionConfig {
    pub zoom_factor: f64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self { zoom_factor: 1.1 }
    }
}

impl From<&TransitionsSection> for TransitionConfig {
    fn from(section: &TransitionsSection) -> Self {
        Self {
            zoom_factor: section.zoom_factor.max(1.0),
        }
    }
}

/// Linear crossfade between segment `boundary` and `boundary + 1`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrossfadePlan {
    pub boundary: usize,
    pub start: f64,
    pub duration: f64,
}

impl CrossfadePlan {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn is_cut(&self) -> bool {
        self.duration < MIN_CROSSFADE_SECONDS
    }

    /// Opacity of the incoming segment at timeline time `t`.
    pub fn alpha_in(&self, t: f64) -> f64 {
        if self.is_cut() {
            return if t >= self.start { 1.0 } else { 0.0 };
        }
        ((t - self.start) / self.duration).clamp(0.0, 1.0)
    }

    /// Opacity of the outgoing segment at timeline time `t`.
    pub fn alpha_out(&self, t: f64) -> f64 {
        1.0 - self.alpha_in(t)
    }

    /// `xfade` filter arguments. The offset is measured on the output
    /// timeline of the chain, which is the incoming segment's start.
    pub fn xfade_filter(&self) -> String {
        format!(
            "xfade=transition=fade:duration={:.3}:offset={:.3}",
            self.duration, self.start
        )
    }
}

/// Slow push-in applied to one image slice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZoomPlan {
    pub segment: usize,
    pub slice: usize,
    pub start: f64,
    pub end: f64,
    pub from_scale: f64,
    pub to_scale: f64,
}

impl ZoomPlan {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn scale_at(&self, t: f64) -> f64 {
        let duration = self.duration();
        if duration <= 0.0 {
            return self.from_scale;
        }
        let progress = ((t - self.start) / duration).clamp(0.0, 1.0);
        self.from_scale + (self.to_scale - self.from_scale) * progress
    }

    pub fn frame_count(&self, fps: u32) -> u64 {
        (self.duration() * f64::from(fps)).round().max(1.0) as u64
    }

    /// `zoompan` filter for a looped still producing one output frame per
    /// input frame, centred on the image.
    pub fn zoompan_filter(&self, fps: u32, width: u32, height: u32) -> String {
        let frames = self.frame_count(fps);
        let zoom = if frames <= 1 || (self.to_scale - self.from_scale).abs() < f64::EPSILON {
            format!("{:.4}", self.from_scale)
        } else {
            format!(
                "{:.4}+{:.4}*on/{}",
                self.from_scale,
                self.to_scale - self.from_scale,
                frames - 1
            )
        };
        format!(
            "zoompan=z='{zoom}':d=1:x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':s={width}x{height}:fps={fps}"
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransitionSet {
    pub crossfades: Vec<CrossfadePlan>,
    pub zooms: Vec<ZoomPlan>,
}

impl TransitionSet {
    pub fn zooms_for(&self, segment: usize) -> impl Iterator<Item = &ZoomPlan> {
        self.zooms.iter().filter(move |zoom| zoom.segment == segment)
    }

    pub fn crossfade_after(&self, segment: usize) -> Option<&CrossfadePlan> {
        self.crossfades
            .iter()
            .find(|crossfade| crossfade.boundary == segment)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransitionCompositor {
    config: TransitionConfig,
}

impl TransitionCompositor {
    pub fn new(config: TransitionConfig) -> Self {
        Self { config }
    }

    pub fn compose(&self, timeline: &Timeline) -> TransitionSet {
        let crossfades = timeline
            .segments
            .windows(2)
            .enumerate()
            .map(|(boundary, pair)| CrossfadePlan {
                boundary,
                start: pair[1].start_offset,
                duration: timeline.overlap_after(boundary),
            })
            .collect();

        let zooms = timeline
            .segments
            .iter()
            .flat_map(|segment| {
                segment
                    .image_slices
                    .iter()
                    .enumerate()
                    .map(move |(slice, image)| ZoomPlan {
                        segment: segment.index(),
                        slice,
                        start: image.slice_start,
                        end: image.slice_end,
                        from_scale: 1.0,
                        to_scale: self.config.zoom_factor,
                    })
            })
            .collect();

        TransitionSet { crossfades, zooms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{AudioRef, ImageRef, Segment};
    use crate::timeline::{DurationReconciler, ReconcilerConfig};

    fn timeline() -> Timeline {
        let segments: Vec<Segment> = [4.0, 6.5, 3.2]
            .iter()
            .enumerate()
            .map(|(i, d)| {
                Segment::new(i, "narration")
                    .with_audio(AudioRef::new(format!("{i}.mp3"), *d))
                    .with_images(vec![
                        ImageRef::new(format!("{i}a.png"), 0),
                        ImageRef::new(format!("{i}b.png"), 1),
                    ])
            })
            .collect();
        DurationReconciler::new(ReconcilerConfig::default())
            .reconcile(&segments)
            .unwrap()
    }

    #[test]
    fn crossfades_follow_overlaps() {
        let set = TransitionCompositor::default().compose(&timeline());
        assert_eq!(set.crossfades.len(), 2);
        assert!((set.crossfades[0].start - 3.0).abs() < 1e-9);
        assert!((set.crossfades[0].end() - 4.0).abs() < 1e-9);
        assert_eq!(
            set.crossfades[1].xfade_filter(),
            "xfade=transition=fade:duration=1.000:offset=8.500"
        );
    }

    #[test]
    fn alpha_ramps_are_linear_and_complementary() {
        let fade = CrossfadePlan {
            boundary: 0,
            start: 3.0,
            duration: 1.0,
        };
        assert_eq!(fade.alpha_in(2.0), 0.0);
        assert!((fade.alpha_in(3.25) - 0.25).abs() < 1e-9);
        assert!((fade.alpha_out(3.25) - 0.75).abs() < 1e-9);
        assert_eq!(fade.alpha_in(5.0), 1.0);
    }

    #[test]
    fn zoom_runs_from_one_to_factor_over_each_slice() {
        let set = TransitionCompositor::default().compose(&timeline());
        assert_eq!(set.zooms_for(1).count(), 2);
        let zoom = set.zooms_for(0).next().unwrap();
        assert_eq!(zoom.scale_at(zoom.start), 1.0);
        assert!((zoom.scale_at(zoom.end) - 1.1).abs() < 1e-9);
        let mid = (zoom.start + zoom.end) / 2.0;
        assert!((zoom.scale_at(mid) - 1.05).abs() < 1e-9);
    }

    #[test]
    fn zoompan_expression_spans_all_frames() {
        let zoom = ZoomPlan {
            segment: 0,
            slice: 0,
            start: 0.0,
            end: 2.0,
            from_scale: 1.0,
            to_scale: 1.1,
        };
        assert_eq!(zoom.frame_count(24), 48);
        let filter = zoom.zoompan_filter(24, 1024, 576);
        assert!(filter.starts_with("zoompan=z='1.0000+0.1000*on/47':d=1"));
        assert!(filter.ends_with("s=1024x576:fps=24"));
    }

    #[test]
    fn zero_overlap_is_a_cut() {
        let fade = CrossfadePlan {
            boundary: 0,
            start: 2.0,
            duration: 0.0,
        };
        assert!(fade.is_cut());
        assert_eq!(fade.alpha_in(1.99), 0.0);
        assert_eq!(fade.alpha_in(2.0), 1.0);
    }
}
