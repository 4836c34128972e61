use std::io::Cursor;

use image::ImageReader;
use morph_contracts::{AspectRatioTag, SourceImage, TransformError};

/// Picks the supported output proportions closest to the source photo so the
/// model does not crop or pad it.
pub fn estimate(image: &SourceImage) -> Result<AspectRatioTag, TransformError> {
    estimate_dimensions(image.width(), image.height())
}

pub fn estimate_dimensions(width: u32, height: u32) -> Result<AspectRatioTag, TransformError> {
    if width == 0 || height == 0 {
        return Err(TransformError::Decode(format!(
            "image has zero dimension ({width}x{height})"
        )));
    }
    let ratio = f64::from(width) / f64::from(height);
    Ok(AspectRatioTag::nearest(ratio))
}

/// Reads pixel dimensions from the image header without decoding pixel data.
pub fn read_dimensions(bytes: &[u8]) -> Result<(u32, u32), TransformError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| TransformError::Decode(err.to_string()))?;
    if reader.format().is_none() {
        return Err(TransformError::Decode(
            "unrecognized image format".to_string(),
        ));
    }
    reader
        .into_dimensions()
        .map_err(|err| TransformError::Decode(err.to_string()))
}
