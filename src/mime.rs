use crate::models::DEFAULT_CONTENT_TYPE;
use image::ImageFormat;
use std::path::Path;

/// Content type for an artifact: sniffed from its leading bytes, then from
/// the file extension, then the generic binary type.
pub fn detect_content_type(bytes: &[u8], path: &Path) -> &'static str {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type();
    }

    match ImageFormat::from_path(path) {
        Ok(format) => format.to_mime_type(),
        Err(_) => {
            tracing::warn!(
                "Unrecognized image format for {} (first 4 bytes: {:02X?}), sending as {}",
                path.display(),
                &bytes[..bytes.len().min(4)],
                DEFAULT_CONTENT_TYPE
            );
            DEFAULT_CONTENT_TYPE
        }
    }
}
