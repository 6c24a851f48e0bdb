use std::sync::Arc;

use crate::executor::CommandExecutor;

use super::pipeline::{ClipPipeline, ClipStyle};
use super::{Artifact, BackendTier, RenderBackend, RenderRequest, RenderResult, RenderSettings};

/// Same clip layout as the primary tier with the fragile parts removed: no
/// zoom, plain captions, narration mixed as recorded.
#[derive(Debug)]
pub struct FallbackBackend {
    pipeline: ClipPipeline,
}

impl FallbackBackend {
    pub fn new(settings: RenderSettings, executor: Arc<dyn CommandExecutor>) -> Self {
        let style = ClipStyle {
            zoom: false,
            styled_captions: false,
            loudnorm: false,
        };
        Self {
            pipeline: ClipPipeline::new(BackendTier::Fallback, style, settings, executor),
        }
    }
}

#[async_trait::async_trait]
impl RenderBackend for FallbackBackend {
    fn tier(&self) -> BackendTier {
        self.pipeline.tier()
    }

    async fn render(&self, request: &RenderRequest) -> RenderResult<Artifact> {
        self.pipeline.render(request).await
    }
}
