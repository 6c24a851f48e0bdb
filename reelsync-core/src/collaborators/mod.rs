pub mod placeholder;
pub mod retry;

use std::path::Path;

use thiserror::Error;

use crate::segment::{AudioRef, ImageRef};

pub use placeholder::PlaceholderPainter;
pub use retry::{RetryOutcome, RetryPolicy};

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("speech service unavailable: {0}")]
    Unavailable(String),
    #[error("speech request rejected: {0}")]
    Rejected(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("image service unavailable: {0}")]
    Unavailable(String),
    #[error("image request rejected: {0}")]
    Rejected(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("placeholder could not be painted: {0}")]
    Placeholder(String),
}

/// Text-to-speech service. Implementations write the narration to `dest`;
/// the returned duration is advisory and gets re-probed.
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        voice: Option<&str>,
        speed: f32,
        dest: &Path,
    ) -> Result<AudioRef, SynthesisError>;
}

/// Image generation service writing one still to `dest`.
#[async_trait::async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        style: Option<&str>,
        dest: &Path,
    ) -> Result<ImageRef, GenerationError>;
}
