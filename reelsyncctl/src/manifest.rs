use std::fs;
use std::path::{Path, PathBuf};

use reelsync_core::{
    AudioRef, EmotionalTone, GenerationError, ImageGenerator, ImageRef, PlanningError,
    RenderOptions, ScriptBlock, Segment, SpeechSynthesizer, SynthesisError,
};
use serde::Deserialize;

use crate::Result;

/// Pre-generated media for one render: narration and stills per segment,
/// with paths relative to the manifest file.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub segments: Vec<ManifestSegment>,
    #[serde(default)]
    pub options: RenderOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestSegment {
    pub text: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub tone: EmotionalTone,
    #[serde(default)]
    pub audio: Option<PathBuf>,
    #[serde(default)]
    pub images: Vec<PathBuf>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<(Self, PathBuf)> {
        let raw = fs::read_to_string(path)?;
        let manifest: Manifest = serde_json::from_str(&raw)?;
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok((manifest, base))
    }

    /// Segments ready for reconciliation. Audio durations are left at zero
    /// until probed.
    pub fn segments(&self, base: &Path) -> Vec<Segment> {
        self.segments
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let mut segment = Segment::new(index, entry.text.trim());
                if let Some(caption) = entry.caption.as_deref().map(str::trim) {
                    if !caption.is_empty() {
                        segment.caption_text = caption.to_string();
                    }
                }
                segment.emotional_tone = entry.tone;
                segment.audio_ref = entry
                    .audio
                    .as_ref()
                    .map(|audio| AudioRef::new(resolve(base, audio), 0.0));
                segment.image_refs = entry
                    .images
                    .iter()
                    .enumerate()
                    .map(|(ordinal, image)| ImageRef::new(resolve(base, image), ordinal as u32))
                    .collect();
                segment.planned_image_count = segment.image_refs.len().max(1);
                segment
            })
            .collect()
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScriptFile {
    Blocks(Vec<ScriptBlock>),
    Wrapped { blocks: Vec<ScriptBlock> },
}

/// Reads a script either as a bare array of blocks or as `{"blocks": [...]}`.
pub fn load_script(path: &Path) -> Result<Vec<ScriptBlock>> {
    let raw = fs::read_to_string(path)?;
    let script: ScriptFile = serde_json::from_str(&raw)
        .map_err(|err| PlanningError::Script(format!("{}: {err}", path.display())))?;
    Ok(match script {
        ScriptFile::Blocks(blocks) | ScriptFile::Wrapped { blocks } => blocks,
    })
}

/// Collaborators for the command line: everything must already be on disk,
/// so any request for fresh media is refused and the segment degrades.
#[derive(Debug, Clone, Copy, Default)]
pub struct PregeneratedMedia;

#[async_trait::async_trait]
impl SpeechSynthesizer for PregeneratedMedia {
    async fn synthesize(
        &self,
        text: &str,
        _voice: Option<&str>,
        _speed: f32,
        _dest: &Path,
    ) -> std::result::Result<AudioRef, SynthesisError> {
        Err(SynthesisError::Unavailable(format!(
            "no narration file supplied for \"{}\"",
            excerpt(text)
        )))
    }
}

#[async_trait::async_trait]
impl ImageGenerator for PregeneratedMedia {
    async fn generate(
        &self,
        prompt: &str,
        _style: Option<&str>,
        _dest: &Path,
    ) -> std::result::Result<ImageRef, GenerationError> {
        Err(GenerationError::Unavailable(format!(
            "no image supplied for \"{}\"",
            excerpt(prompt)
        )))
    }
}

fn excerpt(text: &str) -> String {
    let mut words = text.split_whitespace();
    let head: Vec<&str> = words.by_ref().take(6).collect();
    if words.next().is_some() {
        format!("{}…", head.join(" "))
    } else {
        head.join(" ")
    }
}
