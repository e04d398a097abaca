use std::env;

use serde::{Deserialize, Serialize};

use crate::types::ModelParams;

/// Built-in gateway endpoint used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
/// Per-attempt timeout applied when none is configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;
/// Additional attempts granted after the first failure.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Connection configuration for [`crate::client::OpenRouterClient`].
///
/// `api_key` and `default_model` are required and checked at client
/// construction; everything else falls back to built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Gateway API key, sent as a bearer token.
    pub api_key: String,
    /// Model used when a call does not name one.
    pub default_model: String,
    /// Gateway endpoint; trailing slashes are trimmed, blank falls back to
    /// [`DEFAULT_BASE_URL`].
    #[serde(default)]
    pub base_url: Option<String>,
    /// Tuning knobs applied to every call unless overridden per call.
    #[serde(default)]
    pub default_params: ModelParams,
    /// Per-attempt timeout in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Number of retry attempts after the initial request.
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Application name sent in the `X-Title` attribution header.
    #[serde(default)]
    pub app_name: Option<String>,
    /// Application URL sent in the `HTTP-Referer` attribution header.
    #[serde(default)]
    pub app_url: Option<String>,
}

impl OpenRouterConfig {
    /// Minimal configuration from the two required fields.
    pub fn new(api_key: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            default_model: default_model.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from `OPENROUTER_*` environment variables.
    ///
    /// Recognized variables: `OPENROUTER_API_KEY`,
    /// `OPENROUTER_DEFAULT_MODEL`, `OPENROUTER_BASE_URL`,
    /// `OPENROUTER_TIMEOUT_MS`, `OPENROUTER_MAX_RETRIES`,
    /// `OPENROUTER_APP_NAME`, `OPENROUTER_APP_URL`. Blank values are treated
    /// as unset; missing required values surface at client construction.
    pub fn from_env() -> Self {
        Self {
            api_key: env_var("OPENROUTER_API_KEY").unwrap_or_default(),
            default_model: env_var("OPENROUTER_DEFAULT_MODEL").unwrap_or_default(),
            base_url: env_var("OPENROUTER_BASE_URL"),
            default_params: ModelParams::default(),
            timeout_ms: env_var("OPENROUTER_TIMEOUT_MS").and_then(|raw| raw.parse().ok()),
            max_retries: env_var("OPENROUTER_MAX_RETRIES").and_then(|raw| raw.parse().ok()),
            app_name: env_var("OPENROUTER_APP_NAME"),
            app_url: env_var("OPENROUTER_APP_URL"),
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Trims trailing slashes, falling back to the default endpoint when blank.
pub(crate) fn normalize_base_url(base_url: Option<&str>) -> String {
    let normalized = base_url
        .unwrap_or(DEFAULT_BASE_URL)
        .trim()
        .trim_end_matches('/');
    if normalized.is_empty() {
        DEFAULT_BASE_URL.to_string()
    } else {
        normalized.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slashes_are_trimmed() {
        assert_eq!(
            normalize_base_url(Some("https://openrouter.ai/api/v1///")),
            "https://openrouter.ai/api/v1"
        );
        assert_eq!(
            normalize_base_url(Some("https://proxy.internal/api")),
            "https://proxy.internal/api"
        );
    }

    #[test]
    fn blank_base_url_falls_back_to_default() {
        assert_eq!(normalize_base_url(None), DEFAULT_BASE_URL);
        assert_eq!(normalize_base_url(Some("   ")), DEFAULT_BASE_URL);
        assert_eq!(normalize_base_url(Some("/")), DEFAULT_BASE_URL);
    }

    #[test]
    fn config_deserializes_with_optional_fields_absent() {
        let config: OpenRouterConfig = serde_json::from_value(serde_json::json!({
            "api_key": "k",
            "default_model": "openai/gpt-4.1-mini"
        }))
        .expect("minimal config parses");

        assert_eq!(config.api_key, "k");
        assert!(config.base_url.is_none());
        assert!(config.timeout_ms.is_none());
        assert_eq!(config.default_params, ModelParams::default());
    }
}
