use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum EmotionalTone {
    #[default]
    Neutral,
    Happy,
    Excited,
    Sad,
    Melancholy,
    Suspenseful,
    Dramatic,
}

impl EmotionalTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionalTone::Neutral => "neutral",
            EmotionalTone::Happy => "happy",
            EmotionalTone::Excited => "excited",
            EmotionalTone::Sad => "sad",
            EmotionalTone::Melancholy => "melancholy",
            EmotionalTone::Suspenseful => "suspenseful",
            EmotionalTone::Dramatic => "dramatic",
        }
    }

    /// Nudges the narration speed for the tone. Bright tones speak faster,
    /// sombre tones slower; tension keeps the base pace.
    pub fn adjust_speed(&self, base: f32) -> f32 {
        match self {
            EmotionalTone::Happy | EmotionalTone::Excited => (base + 0.1).min(1.3),
            EmotionalTone::Sad | EmotionalTone::Melancholy => (base - 0.1).max(0.7),
            _ => base,
        }
    }
}

impl fmt::Display for EmotionalTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionalTone {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tone = match s.trim().to_ascii_lowercase().as_str() {
            "happy" => EmotionalTone::Happy,
            "excited" => EmotionalTone::Excited,
            "sad" => EmotionalTone::Sad,
            "melancholy" => EmotionalTone::Melancholy,
            "suspenseful" => EmotionalTone::Suspenseful,
            "dramatic" => EmotionalTone::Dramatic,
            _ => EmotionalTone::Neutral,
        };
        Ok(tone)
    }
}

impl From<String> for EmotionalTone {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(tone) => tone,
            Err(never) => match never {},
        }
    }
}

/// Narration audio for one segment. The duration always comes from probing
/// the file itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioRef {
    pub path: PathBuf,
    pub duration_seconds: f64,
}

impl AudioRef {
    pub fn new(path: impl Into<PathBuf>, duration_seconds: f64) -> Self {
        Self {
            path: path.into(),
            duration_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRef {
    pub path: PathBuf,
    pub ordinal: u32,
    #[serde(default)]
    pub display_seconds: Option<f64>,
    #[serde(default)]
    pub placeholder: bool,
}

impl ImageRef {
    pub fn new(path: impl Into<PathBuf>, ordinal: u32) -> Self {
        Self {
            path: path.into(),
            ordinal,
            display_seconds: None,
            placeholder: false,
        }
    }

    pub fn with_display_seconds(mut self, seconds: f64) -> Self {
        self.display_seconds = Some(seconds);
        self
    }

    pub fn placeholder(path: impl Into<PathBuf>, ordinal: u32) -> Self {
        Self {
            placeholder: true,
            ..Self::new(path, ordinal)
        }
    }
}

/// One block of the raw script as handed over by the script writer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScriptBlock {
    pub text: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub tone: EmotionalTone,
    #[serde(default)]
    pub target_seconds: Option<f64>,
    #[serde(default)]
    pub image_prompts: Vec<String>,
}

impl ScriptBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            caption: None,
            tone: EmotionalTone::Neutral,
            target_seconds: None,
            image_prompts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub index: usize,
    pub narration_text: String,
    #[serde(default)]
    pub audio_ref: Option<AudioRef>,
    #[serde(default)]
    pub image_refs: Vec<ImageRef>,
    pub caption_text: String,
    #[serde(default)]
    pub emotional_tone: EmotionalTone,
    #[serde(default)]
    pub image_prompts: Vec<String>,
    #[serde(default = "default_image_count")]
    pub planned_image_count: usize,
    #[serde(default)]
    pub estimated_seconds: f64,
}

fn default_image_count() -> usize {
    1
}

impl Segment {
    pub fn new(index: usize, narration_text: impl Into<String>) -> Self {
        let narration_text = narration_text.into();
        Self {
            index,
            caption_text: narration_text.clone(),
            narration_text,
            audio_ref: None,
            image_refs: Vec::new(),
            emotional_tone: EmotionalTone::Neutral,
            image_prompts: Vec::new(),
            planned_image_count: 1,
            estimated_seconds: 0.0,
        }
    }

    pub fn with_audio(mut self, audio: AudioRef) -> Self {
        self.audio_ref = Some(audio);
        self
    }

    pub fn with_images(mut self, images: Vec<ImageRef>) -> Self {
        self.image_refs = images;
        self
    }

    pub fn word_count(&self) -> usize {
        self.narration_text.split_whitespace().count()
    }

    /// Images in display order.
    pub fn ordered_images(&self) -> Vec<&ImageRef> {
        let mut images: Vec<&ImageRef> = self.image_refs.iter().collect();
        images.sort_by_key(|image| image.ordinal);
        images
    }

    pub fn has_audio(&self) -> bool {
        self.audio_ref
            .as_ref()
            .map(|audio| audio.duration_seconds > 0.0)
            .unwrap_or(false)
    }
}
