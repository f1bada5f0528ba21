use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use std::path::Path;

pub const JPEG: &str = "image/jpeg";

/// Wraps raw image bytes into a `data:` URL that can live inside the recipe JSON.
pub fn embed_image(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, B64.encode(bytes))
}

/// Splits a base64 `data:` URL back into its MIME type and bytes.
pub fn decode_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    let bytes = B64.decode(payload).ok()?;
    Some((mime.to_string(), bytes))
}

pub fn image_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some(JPEG),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}
