use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Splits a narrative into ordered panel descriptions.
#[async_trait]
pub trait StorySegmenter: Send + Sync {
    async fn segment(&self, story: &str) -> Result<Vec<String>>;
}

/// Summarises the protagonist's visible traits from a reference image.
#[async_trait]
pub trait TraitExtractor: Send + Sync {
    async fn extract_traits(&self, image: &str) -> Result<String>;
}

/// Renders one panel. Returns a displayable image URL (http(s) or `data:`).
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    async fn synthesize(&self, prompt: &str, reference_image: Option<&str>) -> Result<String>;
}

#[derive(Clone)]
pub struct AiServices {
    pub segmenter: Arc<dyn StorySegmenter>,
    pub traits: Arc<dyn TraitExtractor>,
    pub synthesizer: Arc<dyn ImageSynthesizer>,
}
