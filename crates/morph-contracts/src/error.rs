use thiserror::Error;

/// Why a call to the image service failed before a usable response arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    /// Connection, DNS, TLS or timeout failure.
    Network,
    /// Missing, rejected or invalid API key.
    Credential,
    /// Non-success HTTP status other than a credential rejection.
    Status(u16),
    /// The body could not be read or was not valid JSON.
    MalformedBody,
}

/// Every way a single transformation attempt can fail.
///
/// None of these are recovered locally: each one ends the attempt and is
/// handed to the workflow, which keeps its rendered message for display.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// Source bytes are not a readable image.
    #[error("could not decode image: {0}")]
    Decode(String),

    /// Source bytes could not be fully read for encoding.
    #[error("could not read image bytes: {0}")]
    Encode(String),

    /// Source was rejected before any decoding (wrong type, too large).
    #[error("unsupported input: {0}")]
    InvalidInput(String),

    #[error("{message}")]
    Transport {
        kind: TransportFailure,
        message: String,
    },

    #[error("No content received from the model.")]
    EmptyResponse,

    #[error("No valid image data found in response.")]
    NoImageData,

    /// The model declined and explained why; the text is kept verbatim.
    #[error("{0}")]
    Refusal(String),
}

impl TransformError {
    pub fn transport(kind: TransportFailure, message: impl Into<String>) -> Self {
        TransformError::Transport {
            kind,
            message: message.into(),
        }
    }

    /// Credential failures always mention `API key` so callers matching on text still work.
    pub fn credential(detail: impl AsRef<str>) -> Self {
        let detail = detail.as_ref().trim();
        let message = if detail.contains("API key") {
            detail.to_string()
        } else {
            format!("API key problem: {detail}")
        };
        TransformError::transport(TransportFailure::Credential, message)
    }

    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            TransformError::Transport {
                kind: TransportFailure::Credential,
                ..
            }
        )
    }

    /// Short stable label used in event payloads.
    pub fn kind_label(&self) -> &'static str {
        match self {
            TransformError::Decode(_) => "decode",
            TransformError::Encode(_) => "encode",
            TransformError::InvalidInput(_) => "invalid_input",
            TransformError::Transport {
                kind: TransportFailure::Credential,
                ..
            } => "credential",
            TransformError::Transport { .. } => "transport",
            TransformError::EmptyResponse => "empty_response",
            TransformError::NoImageData => "no_image_data",
            TransformError::Refusal(_) => "refusal",
        }
    }
}
