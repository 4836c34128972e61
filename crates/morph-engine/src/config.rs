use std::env;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

const CREDENTIAL_ENV_KEYS: [&str; 3] = ["API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY"];
const DEFAULT_TIMEOUT_S: f64 = 90.0;
const MIN_TIMEOUT_S: f64 = 15.0;
const MAX_TIMEOUT_S: f64 = 300.0;

/// Settings for talking to the image service, resolved once at startup.
#[derive(Clone, PartialEq)]
pub struct TransformConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub request_timeout_s: f64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_IMAGE_MODEL.to_string(),
            request_timeout_s: DEFAULT_TIMEOUT_S,
        }
    }
}

impl std::fmt::Debug for TransformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("request_timeout_s", &self.request_timeout_s)
            .finish()
    }
}

impl TransformConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same resolution as [`Self::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let api_key = CREDENTIAL_ENV_KEYS.into_iter().find_map(|key| non_empty(key));
        let api_base = non_empty("GEMINI_API_BASE")
            .map(|value| normalize_api_base(&value))
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let model =
            non_empty("MORPH_IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string());
        let request_timeout_s = non_empty("MORPH_REQUEST_TIMEOUT")
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .map(|value| value.clamp(MIN_TIMEOUT_S, MAX_TIMEOUT_S))
            .unwrap_or(DEFAULT_TIMEOUT_S);

        Self {
            api_key,
            api_base,
            model,
            request_timeout_s,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model.trim().to_string();
        }
        self
    }

    pub fn with_api_base(mut self, api_base: impl AsRef<str>) -> Self {
        let normalized = normalize_api_base(api_base.as_ref());
        if !normalized.is_empty() {
            self.api_base = normalized;
        }
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.api_key = Some(api_key.trim().to_string()).filter(|value| !value.is_empty());
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_s)
    }

    /// Environment variables consulted for the API key, in priority order.
    pub fn credential_env_keys() -> &'static [&'static str] {
        &CREDENTIAL_ENV_KEYS
    }
}

fn normalize_api_base(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}
