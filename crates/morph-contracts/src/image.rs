use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::TransformError;

/// Largest accepted source file; base64 inflates it by a third on the wire.
pub const MAX_SOURCE_BYTES: usize = 5 * 1024 * 1024;

/// The service always hands back PNG data.
pub const RESULT_MIME_TYPE: &str = "image/png";

/// User-supplied image held fully in memory. Cloning shares the bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    bytes: Arc<[u8]>,
    mime_type: String,
    width: u32,
    height: u32,
}

impl SourceImage {
    pub fn new(
        bytes: impl Into<Arc<[u8]>>,
        mime_type: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Result<Self, TransformError> {
        let bytes = bytes.into();
        let mime_type = mime_type.into().trim().to_ascii_lowercase();
        if !mime_type.starts_with("image/") {
            return Err(TransformError::InvalidInput(format!(
                "expected an image file, got '{mime_type}'"
            )));
        }
        if bytes.is_empty() {
            return Err(TransformError::InvalidInput("image file is empty".to_string()));
        }
        if bytes.len() > MAX_SOURCE_BYTES {
            return Err(TransformError::InvalidInput(format!(
                "image is {} bytes; the limit is {MAX_SOURCE_BYTES} bytes (5MB)",
                bytes.len()
            )));
        }
        Ok(Self {
            bytes,
            mime_type,
            width,
            height,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn summary(&self) -> SourceSummary {
        SourceSummary {
            mime_type: self.mime_type.clone(),
            width: self.width,
            height: self.height,
            byte_len: self.bytes.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub byte_len: usize,
}

/// Transport form of a source image: raw base64 (no data-URL prefix) plus MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub data: String,
    pub mime_type: String,
}

/// Image returned by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub data: String,
    pub mime_type: String,
}

impl GeneratedImage {
    pub fn png(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: RESULT_MIME_TYPE.to_string(),
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>, TransformError> {
        BASE64
            .decode(self.data.as_bytes())
            .map_err(|err| TransformError::Decode(format!("generated image payload: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_rejects_non_image_and_oversized_input() {
        let err = SourceImage::new(vec![1u8, 2, 3], "text/plain", 1, 1).err();
        assert!(matches!(err, Some(TransformError::InvalidInput(_))));

        let err = SourceImage::new(Vec::<u8>::new(), "image/png", 1, 1).err();
        assert!(matches!(err, Some(TransformError::InvalidInput(_))));

        let oversized = vec![0u8; MAX_SOURCE_BYTES + 1];
        let err = SourceImage::new(oversized, "image/jpeg", 10, 10).err();
        assert!(matches!(err, Some(TransformError::InvalidInput(_))));

        let at_limit = vec![0u8; MAX_SOURCE_BYTES];
        assert!(SourceImage::new(at_limit, "image/jpeg", 10, 10).is_ok());
    }

    #[test]
    fn source_normalizes_mime_and_shares_bytes() -> anyhow::Result<()> {
        let source = SourceImage::new(vec![9u8; 16], " Image/JPEG ", 4, 3)?;
        let clone = source.clone();
        assert_eq!(source.mime_type(), "image/jpeg");
        assert_eq!(clone.bytes().as_ptr(), source.bytes().as_ptr());
        assert_eq!(
            source.summary(),
            SourceSummary {
                mime_type: "image/jpeg".to_string(),
                width: 4,
                height: 3,
                byte_len: 16,
            }
        );
        Ok(())
    }

    #[test]
    fn generated_image_exposes_png_data_url() -> anyhow::Result<()> {
        let image = GeneratedImage::png(BASE64.encode(b"png-bytes"));
        assert_eq!(image.data_url(), "data:image/png;base64,cG5nLWJ5dGVz");
        assert_eq!(image.decode_bytes()?, b"png-bytes".to_vec());

        let broken = GeneratedImage::png("not base64!");
        assert!(matches!(
            broken.decode_bytes(),
            Err(TransformError::Decode(_))
        ));
        Ok(())
    }
}
