pub mod srt;

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CaptionsSection;
use crate::timeline::Timeline;

pub use srt::{format_timestamp, to_srt};

/// How captions reach the viewer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaptionMode {
    #[default]
    Burned,
    Sidecar,
    None,
}

impl CaptionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionMode::Burned => "burned",
            CaptionMode::Sidecar => "sidecar",
            CaptionMode::None => "none",
        }
    }
}

impl fmt::Display for CaptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptionCue {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
}

impl CaptionCue {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

#[derive(Debug, Clone)]
pub struct CaptionConfig {
    pub min_words_per_cue: usize,
    pub font_name: String,
    pub font_size: u32,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            min_words_per_cue: 3,
            font_name: "DejaVu Sans".to_string(),
            font_size: 28,
        }
    }
}

impl From<&CaptionsSection> for CaptionConfig {
    fn from(section: &CaptionsSection) -> Self {
        Self {
            min_words_per_cue: section.min_words_per_cue,
            font_name: section.font_name.clone(),
            font_size: section.font_size,
        }
    }
}

impl CaptionConfig {
    /// ASS style override used when burning captions in.
    pub fn force_style(&self) -> String {
        format!(
            "FontName={},FontSize={},PrimaryColour=&H00FFFFFF,OutlineColour=&H80000000,BorderStyle=1,Outline=2,Shadow=0,Alignment=2,MarginV=40",
            self.font_name, self.font_size
        )
    }
}

const MIN_CUE_SECONDS: f64 = 1e-3;

fn fragment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^.!?;:,\n]+[.!?;:,]*").expect("valid regex"))
}

/// Breaks caption text at punctuation and line breaks, then merges
/// fragments shorter than `min_words` into their neighbour.
pub fn split_fragments(text: &str, min_words: usize) -> Vec<String> {
    let raw: Vec<&str> = fragment_pattern()
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|fragment| fragment.chars().any(char::is_alphanumeric))
        .collect();

    let mut merged: Vec<String> = Vec::with_capacity(raw.len());
    let mut pending = String::new();
    for fragment in raw {
        if !pending.is_empty() {
            pending.push(' ');
        }
        pending.push_str(fragment);
        if pending.split_whitespace().count() >= min_words {
            merged.push(std::mem::take(&mut pending));
        }
    }
    if !pending.is_empty() {
        match merged.last_mut() {
            Some(last) => {
                last.push(' ');
                last.push_str(&pending);
            }
            None => merged.push(pending),
        }
    }
    merged
}

/// Places caption cues on the reconciled timeline.
#[derive(Debug, Clone, Default)]
pub struct CaptionAligner {
    config: CaptionConfig,
}

impl CaptionAligner {
    pub fn new(config: CaptionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CaptionConfig {
        &self.config
    }

    pub fn align(&self, timeline: &Timeline) -> Vec<CaptionCue> {
        let mut cues = Vec::new();
        for (position, segment) in timeline.segments.iter().enumerate() {
            let Some((window_start, window_end)) = timeline.exclusive_window(position) else {
                continue;
            };
            let window = window_end - window_start;
            if window <= MIN_CUE_SECONDS {
                continue;
            }
            let fragments =
                split_fragments(&segment.segment.caption_text, self.config.min_words_per_cue);
            let total_chars: usize = fragments.iter().map(|f| f.chars().count()).sum();
            if total_chars == 0 {
                continue;
            }
            let mut consumed = 0usize;
            for fragment in fragments {
                let length = fragment.chars().count();
                let start = window_start + window * consumed as f64 / total_chars as f64;
                consumed += length;
                let end = if consumed == total_chars {
                    window_end
                } else {
                    window_start + window * consumed as f64 / total_chars as f64
                };
                let start = start.clamp(0.0, timeline.total_duration);
                let end = end.clamp(0.0, timeline.total_duration);
                if end - start < MIN_CUE_SECONDS {
                    continue;
                }
                cues.push(CaptionCue {
                    start_time: start,
                    end_time: end,
                    text: fragment,
                });
            }
        }
        debug!(cues = cues.len(), "captions aligned");
        cues
    }
}
