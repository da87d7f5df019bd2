//! Link-preview rewriting for shared gallery pages.
//!
//! The app is rendered client-side, so unfurlers fetching `/gallery/<id>` would
//! only see the generic shell. This router fills in per-item title and
//! Open Graph / Twitter tags and proxies every other path untouched.

use crate::core::config::{Config, PreviewConfig};
use crate::services::gallery::{RecordStore, SavedImage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use log::{error, info, warn};
use std::sync::Arc;
use url::Url;

pub const DEFAULT_TITLE: &str = "StoryBoard AI";
const TITLE_LIMIT: usize = 50;
const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

#[derive(Debug, Clone)]
pub struct OriginResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Where the static app shell is served from.
#[async_trait]
pub trait Origin: Send + Sync {
    async fn get(&self, path_and_query: &str) -> Result<OriginResponse>;
}

pub struct HttpOrigin {
    base: Url,
    client: reqwest::Client,
}

impl HttpOrigin {
    pub fn new(base: &str) -> Result<Self> {
        Ok(Self {
            base: Url::parse(base).with_context(|| format!("Invalid origin url: {}", base))?,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn get(&self, path_and_query: &str) -> Result<OriginResponse> {
        let url = self.base.join(path_and_query)?;
        let resp = self.client.get(url).send().await?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().await?.to_vec();
        Ok(OriginResponse {
            status,
            content_type,
            body,
        })
    }
}

#[derive(Clone)]
pub struct PreviewState {
    pub store: Arc<dyn RecordStore>,
    pub origin: Arc<dyn Origin>,
}

pub fn router(state: PreviewState) -> Router {
    Router::new()
        .route("/gallery/*rest", get(gallery_page))
        .fallback(passthrough)
        .with_state(state)
}

pub async fn serve(config: &Config, store: Arc<dyn RecordStore>) -> Result<()> {
    let preview: &PreviewConfig = config.preview.as_ref().context("Preview config missing")?;
    let state = PreviewState {
        store,
        origin: Arc::new(HttpOrigin::new(&preview.origin)?),
    };

    let listener = tokio::net::TcpListener::bind(&preview.listen)
        .await
        .with_context(|| format!("Failed to bind {}", preview.listen))?;
    info!("Preview server listening on http://{} (origin {})", preview.listen, preview.origin);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// The record id addressed by a gallery path: its last segment, unless that
/// segment is empty or looks like a file.
pub fn gallery_id(path: &str) -> Option<&str> {
    let id = path.rsplit('/').next()?;
    if id.is_empty() || id.contains('.') {
        None
    } else {
        Some(id)
    }
}

/// Escapes text for use in element content and double-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Caption (or the app name) cut to the title limit, then escaped.
pub fn page_title(caption: Option<&str>) -> String {
    let caption = caption.filter(|c| !c.is_empty()).unwrap_or(DEFAULT_TITLE);
    let truncated: String = caption.chars().take(TITLE_LIMIT).collect();
    escape_html(&truncated)
}

pub fn meta_tags(record: &SavedImage) -> String {
    let title = page_title(record.caption.as_deref());
    let description = format!("Check out this comic panel: &quot;{}...&quot;", title);
    let image = escape_html(&record.image_url);

    format!(
        "\n<title>{title}</title>\n\
         <meta property=\"og:title\" content=\"{title}\" />\n\
         <meta property=\"og:description\" content=\"{description}\" />\n\
         <meta property=\"og:image\" content=\"{image}\" />\n\
         <meta property=\"og:image:width\" content=\"1024\" />\n\
         <meta property=\"og:image:height\" content=\"1024\" />\n\
         <meta name=\"twitter:card\" content=\"summary_large_image\" />\n\
         <meta name=\"twitter:title\" content=\"{title}\" />\n\
         <meta name=\"twitter:description\" content=\"{description}\" />\n\
         <meta name=\"twitter:image\" content=\"{image}\" />\n",
        title = title,
        description = description,
        image = image,
    )
}

/// Inserts the record's tags before the first `</head>`. A shell without a
/// head is returned unchanged.
pub fn inject_meta(html: &str, record: &SavedImage) -> String {
    html.replacen("</head>", &format!("{}</head>", meta_tags(record)), 1)
}

async fn gallery_page(State(state): State<PreviewState>, uri: Uri) -> Response {
    let Some(id) = gallery_id(uri.path()) else {
        return forward(&state, &uri).await;
    };

    let record = match state.store.fetch(id).await {
        Ok(Some(record)) => record,
        Ok(None) => return forward(&state, &uri).await,
        Err(e) => {
            warn!("Record lookup for {} failed: {:#}", id, e);
            return forward(&state, &uri).await;
        }
    };

    let shell = match state.origin.get("/index.html").await {
        Ok(resp) if (200..300).contains(&resp.status) => String::from_utf8_lossy(&resp.body).into_owned(),
        Ok(resp) => {
            warn!("App shell returned status {}", resp.status);
            return forward(&state, &uri).await;
        }
        Err(e) => {
            warn!("Failed to fetch app shell: {:#}", e);
            return forward(&state, &uri).await;
        }
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, NO_CACHE),
        ],
        inject_meta(&shell, &record),
    )
        .into_response()
}

/// Proxies GET and HEAD to the origin. Other methods get a 405.
async fn passthrough(State(state): State<PreviewState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, "GET, HEAD")]).into_response();
    }
    forward(&state, &uri).await
}

async fn forward(state: &PreviewState, uri: &Uri) -> Response {
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    match state.origin.get(path).await {
        Ok(resp) => {
            let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::BAD_GATEWAY);
            let mut response = (status, resp.body).into_response();
            if let Some(content_type) = resp.content_type.and_then(|c| c.parse().ok()) {
                response.headers_mut().insert(header::CONTENT_TYPE, content_type);
            }
            response
        }
        Err(e) => {
            error!("Origin request for {} failed: {:#}", path, e);
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}
