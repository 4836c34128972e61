use std::io::Read;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use morph_contracts::{EncodedImage, SourceImage, TransformError};

/// Base64 payload for the request's `inlineData` part.
pub fn encode(image: &SourceImage) -> Result<EncodedImage, TransformError> {
    encode_reader(image.bytes(), image.mime_type())
}

/// Reads `reader` to the end and encodes everything it produced.
pub fn encode_reader<R: Read>(
    mut reader: R,
    mime_type: &str,
) -> Result<EncodedImage, TransformError> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|err| TransformError::Encode(err.to_string()))?;
    Ok(EncodedImage {
        data: BASE64.encode(&bytes),
        mime_type: mime_type.to_string(),
    })
}
