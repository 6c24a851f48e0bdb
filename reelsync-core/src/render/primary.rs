use std::sync::Arc;

use crate::executor::CommandExecutor;

use super::pipeline::{ClipPipeline, ClipStyle};
use super::{Artifact, BackendTier, RenderBackend, RenderRequest, RenderResult, RenderSettings};

/// Zoomed clips, crossfades, styled burned-in captions and loudness
/// normalised narration.
#[derive(Debug)]
pub struct PrimaryBackend {
    pipeline: ClipPipeline,
}

impl PrimaryBackend {
    pub fn new(settings: RenderSettings, executor: Arc<dyn CommandExecutor>) -> Self {
        let style = ClipStyle {
            zoom: true,
            styled_captions: true,
            loudnorm: true,
        };
        Self {
            pipeline: ClipPipeline::new(BackendTier::Primary, style, settings, executor),
        }
    }
}

#[async_trait::async_trait]
impl RenderBackend for PrimaryBackend {
    fn tier(&self) -> BackendTier {
        self.pipeline.tier()
    }

    async fn render(&self, request: &RenderRequest) -> RenderResult<Artifact> {
        self.pipeline.render(request).await
    }
}
