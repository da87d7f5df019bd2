use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default)]
    pub unattended: bool,

    pub ai: AiConfig,

    #[serde(default)]
    pub gallery: Option<GalleryConfig>,

    #[serde(default)]
    pub preview: Option<PreviewConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AiConfig {
    pub provider: String, // "gemini"
    pub gemini: Option<GeminiConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
}

impl GeminiConfig {
    /// The configured key, falling back to the environment when left blank.
    pub fn resolved_api_key(&self) -> Option<String> {
        let key = self.api_key.trim();
        if !key.is_empty() {
            return Some(key.to_string());
        }
        std::env::var(API_KEY_ENV)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GalleryConfig {
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_table")]
    pub table: String,
    pub public_base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PreviewConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    pub origin: String,
}

fn default_output() -> String {
    "output".to_string()
}
fn default_text_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}
fn default_table() -> String {
    "saved_images".to_string()
}
fn default_listen() -> String {
    "127.0.0.1:3000".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config.yml")
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("{} not found. Please create one.", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(content)?)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }
}
