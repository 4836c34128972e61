use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};
use morph_contracts::{
    AspectRatioTag, EncodedImage, GeneratedImage, TransformError, TransportFailure,
};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::StatusCode;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::config::TransformConfig;

/// Style instruction sent with every request.
pub const STYLE_PROMPT: &str = include_str!("../resources/style_prompt.txt");

const ERROR_BODY_MAX_CHARS: usize = 512;

/// One fully-formed call to the image service. Built fresh per attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRequest {
    pub prompt: &'static str,
    pub image: EncodedImage,
    pub aspect_ratio: AspectRatioTag,
}

impl TransformRequest {
    pub fn new(image: EncodedImage, aspect_ratio: AspectRatioTag) -> Self {
        Self {
            prompt: STYLE_PROMPT,
            image,
            aspect_ratio,
        }
    }
}

/// A backend that turns a photo into a stylized image in one round trip.
pub trait TransformProvider: Send + Sync {
    fn name(&self) -> &str;
    fn transform(&self, request: &TransformRequest) -> Result<GeneratedImage, TransformError>;
}

pub struct GeminiTransformer {
    config: TransformConfig,
    http: HttpClient,
}

impl GeminiTransformer {
    pub fn new(config: TransformConfig) -> Self {
        Self {
            config,
            http: HttpClient::new(),
        }
    }

    fn endpoint(&self) -> String {
        let trimmed = self.config.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.config.api_base, model_path)
    }

    pub fn build_payload(request: &TransformRequest) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": request.prompt },
                    {
                        "inlineData": {
                            "mimeType": request.image.mime_type,
                            "data": request.image.data,
                        }
                    }
                ]
            }],
            "generationConfig": {
                "imageConfig": {
                    "aspectRatio": request.aspect_ratio.as_str(),
                }
            }
        })
    }

    fn post(
        &self,
        endpoint: &str,
        api_key: &str,
        payload: &Value,
    ) -> Result<HttpResponse, TransformError> {
        self.http
            .post(endpoint)
            .query(&[("key", api_key)])
            .timeout(self.config.request_timeout())
            .json(payload)
            .send()
            .map_err(|err| {
                // The URL carries the key as a query parameter; keep it out of messages.
                let err = err.without_url();
                TransformError::transport(
                    TransportFailure::Network,
                    format!("Gemini request failed ({endpoint}): {err}"),
                )
            })
    }
}

impl TransformProvider for GeminiTransformer {
    fn name(&self) -> &str {
        "gemini"
    }

    fn transform(&self, request: &TransformRequest) -> Result<GeneratedImage, TransformError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(TransformError::credential(format!(
                "API key not set; export one of {}",
                TransformConfig::credential_env_keys().join(", ")
            )));
        };
        let endpoint = self.endpoint();
        let payload = Self::build_payload(request);
        tracing::debug!(
            endpoint = %endpoint,
            aspect_ratio = request.aspect_ratio.as_str(),
            mime_type = %request.image.mime_type,
            payload_chars = request.image.data.len(),
            "dispatching image transform"
        );

        let response = self.post(&endpoint, api_key, &payload)?;
        let response_payload = response_json_or_error("Gemini", response)?;
        let outcome = interpret_response(&response_payload);
        match &outcome {
            Ok(_) => tracing::debug!("Gemini returned an image part"),
            Err(err) => tracing::debug!(kind = err.kind_label(), "Gemini response unusable"),
        }
        outcome
    }
}

/// Turns a `generateContent` response body into an image or a classified failure.
///
/// Only the first candidate is considered. The first part with inline image
/// data wins; otherwise the first text part is treated as a refusal.
pub fn interpret_response(payload: &Value) -> Result<GeneratedImage, TransformError> {
    let parts = payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .filter(|parts| !parts.is_empty())
        .ok_or(TransformError::EmptyResponse)?;

    let image_data = parts.iter().find_map(|part| {
        part.get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(|inline| inline.get("data"))
            .and_then(Value::as_str)
            .filter(|data| !data.is_empty())
    });
    if let Some(data) = image_data {
        return Ok(GeneratedImage::png(data));
    }

    let refusal = parts.iter().find_map(|part| {
        part.get("text")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
    });
    if let Some(text) = refusal {
        return Err(TransformError::Refusal(text.to_string()));
    }

    Err(TransformError::NoImageData)
}

fn response_json_or_error(
    provider: &str,
    response: HttpResponse,
) -> Result<Value, TransformError> {
    let status = response.status();
    let body = response.text().map_err(|err| {
        TransformError::transport(
            TransportFailure::MalformedBody,
            format!("{provider} response body read failed: {}", err.without_url()),
        )
    })?;
    if !status.is_success() {
        return Err(classify_status(provider, status, &body));
    }
    serde_json::from_str(&body).map_err(|err| {
        TransformError::transport(
            TransportFailure::MalformedBody,
            format!("{provider} returned invalid JSON payload: {err}"),
        )
    })
}

fn classify_status(provider: &str, status: StatusCode, body: &str) -> TransformError {
    let code = status.as_u16();
    let detail = truncate_text(body.trim(), ERROR_BODY_MAX_CHARS);
    let names_bad_key = body.contains("API_KEY_INVALID") || body.contains("API key not valid");
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN || names_bad_key {
        return TransformError::credential(format!(
            "API key rejected by {provider} ({code}): {detail}"
        ));
    }
    TransformError::transport(
        TransportFailure::Status(code),
        format!("{provider} request failed ({code}): {detail}"),
    )
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

/// Offline stand-in: answers every request with a flat PNG in the requested
/// proportions, coloured from the source bytes.
pub struct DryrunTransformer;

impl DryrunTransformer {
    fn dims_for(tag: AspectRatioTag) -> (u32, u32) {
        match tag {
            AspectRatioTag::Square => (64, 64),
            AspectRatioTag::Portrait3x4 => (48, 64),
            AspectRatioTag::Landscape4x3 => (64, 48),
            AspectRatioTag::Portrait9x16 => (36, 64),
            AspectRatioTag::Landscape16x9 => (64, 36),
        }
    }
}

impl TransformProvider for DryrunTransformer {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn transform(&self, request: &TransformRequest) -> Result<GeneratedImage, TransformError> {
        let (width, height) = Self::dims_for(request.aspect_ratio);
        let (r, g, b) = color_from_payload(&request.image.data);
        let mut canvas = RgbImage::new(width, height);
        for pixel in canvas.pixels_mut() {
            *pixel = Rgb([r, g, b]);
        }
        let mut encoded = Vec::new();
        canvas
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
            .map_err(|err| TransformError::Encode(format!("dryrun png encode failed: {err}")))?;
        Ok(GeneratedImage::png(BASE64.encode(encoded)))
    }
}

fn color_from_payload(payload: &str) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}
