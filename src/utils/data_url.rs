use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// An inline `data:<mime>;base64,<payload>` resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    pub data: String,
}

impl DataUrl {
    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("data:")
            .ok_or_else(|| anyhow!("Not a data URL"))?;
        let (mime_type, data) = rest
            .split_once(";base64,")
            .ok_or_else(|| anyhow!("Data URL is not base64 encoded"))?;
        if mime_type.is_empty() || data.is_empty() {
            return Err(anyhow!("Data URL is missing its mime type or payload"));
        }
        Ok(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }

    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(&self.data)?)
    }

    /// File extension for the payload, defaulting to png.
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

impl std::fmt::Display for DataUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

pub fn mime_for_path(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/png",
    }
}
