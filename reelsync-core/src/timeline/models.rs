use hex::encode as hex_encode;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::segment::{ImageRef, Segment};

use super::{ReconcileError, ReconcileResult};

/// Allowed drift between the summed segment durations and the total.
pub const DURATION_TOLERANCE_SECONDS: f64 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageSlice {
    pub image: ImageRef,
    pub slice_start: f64,
    pub slice_end: f64,
}

impl ImageSlice {
    pub fn duration(&self) -> f64 {
        self.slice_end - self.slice_start
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimedSegment {
    pub segment: Segment,
    pub start_offset: f64,
    pub end_offset: f64,
    /// Seconds of narration the segment carries (the configured default when
    /// the audio was missing).
    pub audio_seconds: f64,
    /// Audio or image generation failed and was substituted.
    pub degraded: bool,
    /// No usable narration audio exists for this segment.
    pub audio_missing: bool,
    /// Extra time the last image is held to cover the narration.
    pub freeze_frame_seconds: f64,
    pub dropped_images: usize,
    pub image_slices: Vec<ImageSlice>,
}

impl TimedSegment {
    pub fn duration(&self) -> f64 {
        self.end_offset - self.start_offset
    }

    pub fn index(&self) -> usize {
        self.segment.index
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Timeline {
    pub segments: Vec<TimedSegment>,
    /// Crossfade length between segment `k` and `k + 1`.
    pub overlaps: Vec<f64>,
    pub total_duration: f64,
}

impl Timeline {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn overlap_after(&self, index: usize) -> f64 {
        self.overlaps.get(index).copied().unwrap_or(0.0)
    }

    /// Part of the segment not shared with the next one. Captions for a
    /// segment stay inside this window.
    pub fn exclusive_window(&self, index: usize) -> Option<(f64, f64)> {
        let segment = self.segments.get(index)?;
        let end = match self.segments.get(index + 1) {
            Some(next) => next.start_offset.min(segment.end_offset),
            None => segment.end_offset,
        };
        Some((segment.start_offset, end.min(self.total_duration)))
    }

    pub fn degraded_segments(&self) -> Vec<usize> {
        self.segments
            .iter()
            .filter(|segment| segment.degraded)
            .map(TimedSegment::index)
            .collect()
    }

    pub fn check_invariants(&self) -> ReconcileResult<()> {
        if self.segments.is_empty() {
            return Err(ReconcileError::NoSegments);
        }
        if self.overlaps.len() + 1 != self.segments.len() {
            return Err(ReconcileError::Invariant(format!(
                "{} overlaps for {} segments",
                self.overlaps.len(),
                self.segments.len()
            )));
        }
        for segment in &self.segments {
            if segment.end_offset <= segment.start_offset {
                return Err(ReconcileError::Invariant(format!(
                    "segment {} ends before it starts",
                    segment.index()
                )));
            }
            let mut cursor = segment.start_offset;
            for slice in &segment.image_slices {
                if (slice.slice_start - cursor).abs() > 1e-6 || slice.slice_end < slice.slice_start
                {
                    return Err(ReconcileError::Invariant(format!(
                        "segment {} image slices leave a gap at {cursor:.3}s",
                        segment.index()
                    )));
                }
                cursor = slice.slice_end;
            }
            if (cursor - segment.end_offset).abs() > 1e-6 {
                return Err(ReconcileError::Invariant(format!(
                    "segment {} image slices stop at {cursor:.3}s instead of {:.3}s",
                    segment.index(),
                    segment.end_offset
                )));
            }
        }
        let durations: f64 = self.segments.iter().map(TimedSegment::duration).sum();
        let overlaps: f64 = self.overlaps.iter().sum();
        let drift = (durations - overlaps - self.total_duration).abs();
        if drift > DURATION_TOLERANCE_SECONDS {
            return Err(ReconcileError::Invariant(format!(
                "segment durations minus overlaps drift {drift:.3}s from total"
            )));
        }
        Ok(())
    }

    /// Stable digest of the timeline structure. Identical inputs and
    /// configuration yield the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        match serde_json::to_vec(self) {
            Ok(bytes) => hasher.update(bytes),
            Err(_) => hasher.update(format!("{self:?}").as_bytes()),
        }
        hex_encode(hasher.finalize())
    }
}
