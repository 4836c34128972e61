use std::fs::File;
use std::io::Read;
use std::path::Path;

use morph_contracts::image::MAX_SOURCE_BYTES;
use morph_contracts::{SourceImage, TransformError};

use crate::estimator::read_dimensions;

/// Builds a [`SourceImage`] from bytes already in memory.
///
/// `mime_type` is what the caller's file picker reported; when absent the
/// type is sniffed from the bytes.
pub fn load_source(
    bytes: Vec<u8>,
    mime_type: Option<&str>,
) -> Result<SourceImage, TransformError> {
    let mime_type = match mime_type.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => value.to_string(),
        None => sniff_mime(&bytes)
            .ok_or_else(|| TransformError::Decode("unrecognized image format".to_string()))?
            .to_string(),
    };
    if !mime_type.to_ascii_lowercase().starts_with("image/") {
        return Err(TransformError::InvalidInput(format!(
            "expected an image file, got '{mime_type}'"
        )));
    }
    if bytes.len() > MAX_SOURCE_BYTES {
        return Err(TransformError::InvalidInput(format!(
            "image is {} bytes; the limit is {MAX_SOURCE_BYTES} bytes (5MB)",
            bytes.len()
        )));
    }
    let (width, height) = read_dimensions(&bytes)?;
    SourceImage::new(bytes, mime_type, width, height)
}

/// Reads an image file fully into memory.
pub fn open_source(path: &Path) -> Result<SourceImage, TransformError> {
    let read_error = |err: std::io::Error| {
        TransformError::Encode(format!("failed reading {}: {err}", path.display()))
    };
    let file = File::open(path).map_err(read_error)?;
    let declared_len = file.metadata().map(|meta| meta.len()).unwrap_or(0);
    if declared_len > MAX_SOURCE_BYTES as u64 {
        return Err(TransformError::InvalidInput(format!(
            "{} is {declared_len} bytes; the limit is {MAX_SOURCE_BYTES} bytes (5MB)",
            path.display()
        )));
    }

    let mut bytes = Vec::with_capacity(declared_len as usize);
    // One byte past the ceiling is enough to know the file grew beyond it.
    file.take(MAX_SOURCE_BYTES as u64 + 1)
        .read_to_end(&mut bytes)
        .map_err(read_error)?;

    let mime_type = mime_for_path(path).or_else(|| sniff_mime(&bytes));
    load_source(bytes, mime_type)
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
}
