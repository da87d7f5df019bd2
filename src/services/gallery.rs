use crate::core::config::{Config, GalleryConfig};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedImage {
    pub id: String,
    pub image_url: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Remote store of shared panels, keyed by an opaque id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<Option<SavedImage>>;
    async fn save(&self, image_url: &str, caption: &str) -> Result<SavedImage>;
}

pub fn create_record_store(config: &Config) -> Result<Arc<dyn RecordStore>> {
    let cfg = config.gallery.as_ref().context("Gallery config missing")?;
    Ok(Arc::new(SupabaseStore::new(cfg)?))
}

pub fn share_url(public_base_url: &str, id: &str) -> String {
    format!("{}/gallery/{}", public_base_url.trim_end_matches('/'), id)
}

/// PostgREST-style table access (`/rest/v1/<table>`).
pub struct SupabaseStore {
    table_url: Url,
    api_key: String,
    client: reqwest::Client,
}

impl SupabaseStore {
    pub fn new(config: &GalleryConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(anyhow!("Gallery api_key is empty"));
        }
        let base = Url::parse(&format!("{}/", config.url.trim_end_matches('/')))
            .with_context(|| format!("Invalid gallery url: {}", config.url))?;
        let table_url = base
            .join(&format!("rest/v1/{}", config.table))
            .context("Invalid gallery table name")?;
        Ok(Self {
            table_url,
            api_key: config.api_key.clone(),
            client: reqwest::Client::new(),
        })
    }

    pub fn lookup_url(&self, id: &str) -> Url {
        let mut url = self.table_url.clone();
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{}", id))
            .append_pair("select", "id,image_url,caption,created_at");
        url
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }
}

#[derive(Serialize)]
struct NewRecord<'a> {
    image_url: &'a str,
    caption: &'a str,
}

#[async_trait]
impl RecordStore for SupabaseStore {
    async fn fetch(&self, id: &str) -> Result<Option<SavedImage>> {
        let url = self.lookup_url(id);
        debug!("GET {}", url);
        let resp = self.request(reqwest::Method::GET, url).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await?;
            return Err(anyhow!("Record store error ({}): {}", status, error_text));
        }

        let rows: Vec<SavedImage> = resp.json().await.context("Failed to parse record")?;
        Ok(rows.into_iter().next())
    }

    async fn save(&self, image_url: &str, caption: &str) -> Result<SavedImage> {
        let resp = self
            .request(reqwest::Method::POST, self.table_url.clone())
            .header("Prefer", "return=representation")
            .json(&NewRecord { image_url, caption })
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await?;
            return Err(anyhow!("Record store error ({}): {}", status, error_text));
        }

        let rows: Vec<SavedImage> = resp.json().await.context("Failed to parse saved record")?;
        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("Record store returned no row for the saved image"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> GalleryConfig {
        GalleryConfig {
            url: url.to_string(),
            api_key: "anon".to_string(),
            table: "saved_images".to_string(),
            public_base_url: None,
        }
    }

    #[test]
    fn test_lookup_url_encodes_id() {
        let store = SupabaseStore::new(&config("https://xyz.supabase.co/")).unwrap();
        let url = store.lookup_url("abc 1&x");
        assert_eq!(url.path(), "/rest/v1/saved_images");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("id".to_string(), "eq.abc 1&x".to_string()));
        assert_eq!(pairs[1].0, "select");
        assert!(!url.as_str().contains("abc 1&x"));
    }

    #[test]
    fn test_store_requires_key_and_valid_url() {
        let mut cfg = config("https://xyz.supabase.co");
        cfg.api_key = " ".to_string();
        assert!(SupabaseStore::new(&cfg).is_err());
        assert!(SupabaseStore::new(&config("not a url")).is_err());
    }

    #[test]
    fn test_share_url() {
        assert_eq!(share_url("https://storyboard.example/", "42"), "https://storyboard.example/gallery/42");
    }

    #[test]
    fn test_record_parsing_tolerates_missing_fields() {
        let rows: Vec<SavedImage> =
            serde_json::from_str(r#"[{"id": "7", "image_url": "https://img/7.png"}]"#).unwrap();
        assert_eq!(rows[0].caption, None);
        assert_eq!(rows[0].created_at, None);
    }
}
