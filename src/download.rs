//! Download links that embed the saved deck as a base64 data URI.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::pptx::MIME_TYPE;

/// `data:` URI carrying a `.pptx` payload
pub fn data_uri(bytes: &[u8]) -> String {
    format!("data:{MIME_TYPE};base64,{}", STANDARD.encode(bytes))
}

/// HTML anchor that downloads `bytes` under the name `file_name`.
pub fn link_html(bytes: &[u8], file_name: &str, label: &str) -> String {
    format!(
        r#"<a href="{}" download="{}">{}</a>"#,
        data_uri(bytes),
        html_escape::encode_double_quoted_attribute(file_name),
        html_escape::encode_text(label)
    )
}

/// Read a saved deck and build its download anchor.
pub fn download_link(path: &Path, label: &str) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(link_html(&bytes, &path.display().to_string(), label))
}
