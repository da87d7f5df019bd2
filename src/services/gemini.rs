use crate::core::config::Config;
use crate::services::ai::{AiServices, ImageSynthesizer, StorySegmenter, TraitExtractor};
use crate::utils::data_url::DataUrl;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const TRAIT_PROMPT: &str = "Analyze this character image. Provide a comma-separated list of key visual features to maintain consistency (e.g., 'short black hair, red glasses, blue hoodie, denim jeans, white sneakers'). Focus ONLY on physical appearance and clothing. Do not mention pose or background.";

pub fn create_ai_services(config: &Config) -> Result<AiServices> {
    match config.ai.provider.as_str() {
        "gemini" => {
            let cfg = config.ai.gemini.as_ref().context("Gemini config missing")?;
            let api_key = cfg.resolved_api_key().with_context(|| {
                format!(
                    "Gemini API key missing. Set ai.gemini.api_key in config.yml or {}",
                    crate::core::config::API_KEY_ENV
                )
            })?;
            let client = Arc::new(GeminiClient::new(&api_key, &cfg.text_model, &cfg.image_model));
            Ok(AiServices {
                segmenter: client.clone(),
                traits: client.clone(),
                synthesizer: client,
            })
        }
        _ => Err(anyhow!("Unknown AI provider: {}", config.ai.provider)),
    }
}

pub fn segmentation_prompt(story: &str) -> String {
    format!(
        "You are a professional storyboard artist. Break down the following user research story into 3-6 distinct visual scenes for a comic strip.\n\
         \n\
         Return a JSON array of objects with \"description\" field.\n\
         Each description should be visual, describing what is seen in the panel.\n\
         \n\
         Story: {}",
        story
    )
}

pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("```json") {
        s.trim_start_matches("```json").trim_end_matches("```").trim().to_string()
    } else if s.starts_with("```") {
        s.trim_start_matches("```").trim_end_matches("```").trim().to_string()
    } else {
        s.to_string()
    }
}

#[derive(Deserialize)]
struct SegmentItem {
    #[serde(default)]
    description: String,
}

/// Parses the segmentation reply. Blank descriptions are dropped and an empty
/// result is an error.
pub fn parse_segments(response: &str) -> Result<Vec<String>> {
    let clean_json = strip_code_blocks(response);
    let items: Vec<SegmentItem> = serde_json::from_str(&clean_json)
        .with_context(|| format!("Failed to parse segmentation JSON: {}", clean_json))?;
    let descriptions: Vec<String> = items
        .into_iter()
        .map(|i| i.description.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect();
    if descriptions.is_empty() {
        return Err(anyhow!("Segmentation returned no scenes"));
    }
    Ok(descriptions)
}

#[derive(Debug)]
pub struct GeminiClient {
    api_key: String,
    text_model: String,
    image_model: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: &str, text_model: &str, image_model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            text_model: text_model.to_string(),
            image_model: image_model.to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn generate(&self, model: &str, request: &GeminiRequest) -> Result<GeminiResponse> {
        let url = format!("{}/{}:generateContent?key={}", API_BASE, model, self.api_key);
        debug!("POST {}/{}:generateContent", API_BASE, model);

        let resp = self.client.post(&url).json(request).send().await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Gemini API error: {}", error_text));
        }

        let response_text = resp.text().await?;
        let result: GeminiResponse = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                return Err(anyhow!(
                    "Failed to parse Gemini response: {}. Body: {}",
                    e,
                    response_text
                ))
            }
        };

        if let Some(err) = &result.error {
            return Err(anyhow!("Gemini API returned error: {}", err.message));
        }
        Ok(result)
    }

    async fn render(&self, prompt: &str, reference: Option<&DataUrl>) -> Result<String> {
        let mut parts = Vec::new();
        if let Some(image) = reference {
            parts.push(GeminiPart::inline(image));
        }
        parts.push(GeminiPart::text(prompt));

        let request = GeminiRequest {
            contents: vec![GeminiContent::user(parts)],
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["IMAGE".to_string(), "TEXT".to_string()]),
                ..Default::default()
            }),
        };
        let response = self.generate(&self.image_model, &request).await?;
        response.first_image()
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn user(parts: Vec<GeminiPart>) -> Self {
        Self {
            role: "user".to_string(),
            parts,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl GeminiPart {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }

    fn inline(image: &DataUrl) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: image.mime_type.clone(),
                data: image.data.clone(),
            }),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

impl GeminiResponse {
    fn first_candidate(&self) -> Result<&GeminiCandidate> {
        self.candidates
            .as_ref()
            .and_then(|c| c.first())
            .ok_or_else(|| anyhow!("Gemini response format unexpected or empty"))
    }

    fn parts(&self) -> Result<&[GeminiPartResponse]> {
        let first = self.first_candidate()?;
        match &first.content {
            Some(content) if !content.parts.is_empty() => Ok(&content.parts),
            _ => {
                let reason = first.finish_reason.as_deref().unwrap_or("UNKNOWN");
                Err(anyhow!("Gemini response empty. Finish reason: {}", reason))
            }
        }
    }

    fn text(&self) -> Result<String> {
        let text: String = self.parts()?.iter().filter_map(|p| p.text.as_deref()).collect();
        Ok(text)
    }

    fn first_image(&self) -> Result<String> {
        self.parts()?
            .iter()
            .find_map(|p| p.inline_data.as_ref())
            .map(|d| {
                let mime = if d.mime_type.is_empty() { "image/png" } else { &d.mime_type };
                format!("data:{};base64,{}", mime, d.data)
            })
            .ok_or_else(|| anyhow!("No image in response"))
    }
}

#[async_trait]
impl StorySegmenter for GeminiClient {
    async fn segment(&self, story: &str) -> Result<Vec<String>> {
        let request = GeminiRequest {
            contents: vec![GeminiContent::user(vec![GeminiPart::text(&segmentation_prompt(story))])],
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(serde_json::json!({
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": { "description": { "type": "STRING" } }
                    }
                })),
                ..Default::default()
            }),
        };
        let response = self.generate(&self.text_model, &request).await?;
        parse_segments(&response.text()?)
    }
}

#[async_trait]
impl TraitExtractor for GeminiClient {
    async fn extract_traits(&self, image: &str) -> Result<String> {
        let image = DataUrl::parse(image).context("Reference image is not a base64 data URL")?;
        let request = GeminiRequest {
            contents: vec![GeminiContent::user(vec![
                GeminiPart::text(TRAIT_PROMPT),
                GeminiPart::inline(&image),
            ])],
            generation_config: None,
        };
        let response = self.generate(&self.text_model, &request).await?;
        Ok(response.text()?.trim().to_string())
    }
}

#[async_trait]
impl ImageSynthesizer for GeminiClient {
    async fn synthesize(&self, prompt: &str, reference_image: Option<&str>) -> Result<String> {
        let reference = match reference_image.map(DataUrl::parse) {
            Some(Ok(image)) => Some(image),
            Some(Err(e)) => {
                warn!("Ignoring unusable reference image: {:#}", e);
                None
            }
            None => None,
        };

        match self.render(prompt, reference.as_ref()).await {
            Ok(url) => Ok(url),
            // Some prompts are refused with an image attached; try once without it.
            Err(e) if reference.is_some() => {
                warn!("Generation with reference image failed, retrying text-only: {:#}", e);
                self.render(prompt, None).await
            }
            Err(e) => Err(e),
        }
    }
}
