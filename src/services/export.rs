use crate::core::io::Storage;
use crate::core::state::Scene;
use crate::utils::data_url::{extension_for_mime, DataUrl};
use anyhow::{anyhow, Context, Result};
use futures_util::StreamExt;
use log::{error, info};
use std::path::Path;

const MAX_CONCURRENT_DOWNLOADS: usize = 4;

/// Outcome of exporting a storyboard. Failures carry the 0-based panel index.
#[derive(Debug, Default)]
pub struct ExportSummary {
    pub written: Vec<String>,
    pub failed: Vec<(usize, anyhow::Error)>,
}

/// Writes one panel to `<output_folder>/storyboard_panel_<index + 1>.<ext>`.
pub async fn export_panel(
    image_url: &str,
    index: usize,
    output_folder: &str,
    storage: &dyn Storage,
    client: &reqwest::Client,
) -> Result<String> {
    let (bytes, ext) = load_image(image_url, client).await?;
    let path = Path::new(output_folder)
        .join(format!("storyboard_panel_{}.{}", index + 1, ext))
        .to_string_lossy()
        .to_string();
    storage.write(&path, &bytes).await?;
    Ok(path)
}

/// Writes every generated panel, numbered by position in the storyboard.
/// Scenes without an image are skipped. A failing panel does not stop the others.
pub async fn export_panels(
    scenes: &[Scene],
    output_folder: &str,
    storage: &dyn Storage,
    client: &reqwest::Client,
) -> ExportSummary {
    let panels: Vec<(usize, &str)> = scenes
        .iter()
        .enumerate()
        .filter_map(|(i, scene)| scene.image_url.as_deref().map(|url| (i, url)))
        .collect();

    let mut results: Vec<(usize, Result<String>)> = futures_util::stream::iter(panels)
        .map(|(i, url)| async move { (i, export_panel(url, i, output_folder, storage, client).await) })
        .buffer_unordered(MAX_CONCURRENT_DOWNLOADS)
        .collect()
        .await;
    results.sort_by_key(|(i, _)| *i);

    let mut summary = ExportSummary::default();
    for (i, res) in results {
        match res {
            Ok(path) => summary.written.push(path),
            Err(e) => {
                error!("Panel {} export failed: {:#}", i + 1, e);
                summary.failed.push((i, e));
            }
        }
    }

    info!(
        "Exported {} panels to {} ({} failed)",
        summary.written.len(),
        output_folder,
        summary.failed.len()
    );
    summary
}

async fn load_image(url: &str, client: &reqwest::Client) -> Result<(Vec<u8>, &'static str)> {
    if url.starts_with("data:") {
        let data = DataUrl::parse(url)?;
        return Ok((data.decode()?, data.extension()));
    }

    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download {}", url))?;
    if !resp.status().is_success() {
        return Err(anyhow!("Download of {} failed with status {}", url, resp.status()));
    }
    let ext = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|mime| extension_for_mime(mime.split(';').next().unwrap_or("").trim()))
        .unwrap_or("png");
    Ok((resp.bytes().await?.to_vec(), ext))
}
