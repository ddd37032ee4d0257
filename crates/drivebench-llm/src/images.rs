use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::{LlmError, Result};

/// Read an image and return it base64-encoded.
pub(crate) async fn encode_base64(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| LlmError::Image {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(STANDARD.encode(bytes))
}

/// MIME type guessed from the file extension.
pub(crate) fn mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}
