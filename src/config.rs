//! Endpoint configuration for the extraction client.
//!
//! Everything the client needs to reach the model lives in [`EndpointConfig`],
//! built via its [`EndpointConfigBuilder`]. The configuration is immutable once
//! a client owns it; per-call knobs (retries, deadline) are overridden with
//! [`crate::client::InvokeOptions`] instead of mutating shared state.
//!
//! Reading the process environment is confined to [`EndpointConfig::from_env`],
//! which only the composition root (the `vlm-extract` binary, or the host
//! application's `main`) should call.

use crate::error::ExtractError;
use std::fmt;
use std::time::Duration;

/// Environment variable holding the endpoint base URL.
pub const ENV_BASE_URL: &str = "OPENROUTER_BASE_URL";
/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "OPENROUTER_API_KEY";
/// Environment variable holding the model identifier.
pub const ENV_MODEL: &str = "OPENROUTER_MODEL";

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "anthropic/claude-3.5-sonnet";
pub const DEFAULT_REFERER: &str = "https://localhost:8000";
pub const DEFAULT_TITLE: &str = "edgequake-vlm-extract";

/// Connection settings for a chat-completions endpoint.
///
/// # Example
/// ```rust
/// use edgequake_vlm_extract::EndpointConfig;
///
/// let config = EndpointConfig::builder()
///     .api_key("sk-or-...")
///     .model("anthropic/claude-3.5-sonnet")
///     .timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.chat_completions_url(), "https://openrouter.ai/api/v1/chat/completions");
/// ```
#[derive(Clone)]
pub struct EndpointConfig {
    /// Base URL; `/chat/completions` is appended. Default: OpenRouter.
    pub base_url: String,

    /// Bearer token sent in the `Authorization` header.
    pub api_key: String,

    /// Model identifier forwarded verbatim in the request body.
    pub model: String,

    /// Value of the `HTTP-Referer` attribution header.
    ///
    /// Gateways such as OpenRouter use it for app attribution only; it has no
    /// effect on the model output.
    pub referer: String,

    /// Value of the `X-Title` attribution header.
    pub title: String,

    /// Hard deadline for one HTTP round trip in seconds. Default: 60.
    ///
    /// A multimodal request with several page crops can take tens of seconds,
    /// but an unbounded call would stall the pipeline stage that issued it.
    pub timeout_secs: u64,

    /// Retries on transient failures (transport, timeout, 429, 5xx). Default: 0.
    ///
    /// Extraction is best-effort enrichment, so the default is a single
    /// attempt. Callers that need it raise this globally or per call.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s.
    pub retry_backoff_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            title: DEFAULT_TITLE.to_string(),
            timeout_secs: 60,
            max_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("referer", &self.referer)
            .field("title", &self.title)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

fn redact(key: &str) -> &'static str {
    if key.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl EndpointConfig {
    /// Create a new builder for `EndpointConfig`.
    pub fn builder() -> EndpointConfigBuilder {
        EndpointConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a configuration from `OPENROUTER_BASE_URL`, `OPENROUTER_API_KEY`
    /// and `OPENROUTER_MODEL`, falling back to the defaults for unset or empty
    /// variables. The API key is required.
    pub fn from_env() -> Result<Self, ExtractError> {
        let mut builder = Self::builder();
        if let Some(base) = non_empty_env(ENV_BASE_URL) {
            builder = builder.base_url(base);
        }
        if let Some(key) = non_empty_env(ENV_API_KEY) {
            builder = builder.api_key(key);
        }
        if let Some(model) = non_empty_env(ENV_MODEL) {
            builder = builder.model(model);
        }
        builder.build()
    }

    /// Full URL of the chat-completions route.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Builder for [`EndpointConfig`].
#[derive(Debug)]
pub struct EndpointConfigBuilder {
    config: EndpointConfig,
}

impl EndpointConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.config.referer = referer.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<EndpointConfig, ExtractError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(ExtractError::InvalidConfig(format!(
                "Base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.api_key.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(format!(
                "API key must not be empty (set {ENV_API_KEY})"
            )));
        }
        if c.model.trim().is_empty() {
            return Err(ExtractError::InvalidConfig("Model must not be empty".into()));
        }
        if c.timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig("Timeout must be ≥ 1s".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = EndpointConfig::default();
        assert_eq!(c.base_url, DEFAULT_BASE_URL);
        assert_eq!(c.model, DEFAULT_MODEL);
        assert_eq!(c.timeout_secs, 60);
        assert_eq!(c.max_retries, 0);
        assert_eq!(c.retry_backoff_ms, 500);
    }

    #[test]
    fn builder_requires_api_key() {
        let err = EndpointConfig::builder().build().unwrap_err();
        assert!(err.to_string().contains(ENV_API_KEY), "got: {err}");
    }

    #[test]
    fn builder_rejects_bad_base_url() {
        let err = EndpointConfig::builder()
            .api_key("k")
            .base_url("openrouter.ai/api/v1")
            .build()
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(EndpointConfig::builder()
            .api_key("k")
            .timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn url_tolerates_trailing_slash() {
        let c = EndpointConfig::builder()
            .api_key("k")
            .base_url("http://localhost:9000/v1/")
            .build()
            .unwrap();
        assert_eq!(c.chat_completions_url(), "http://localhost:9000/v1/chat/completions");
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = EndpointConfig::builder().api_key("sk-secret-123").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret-123"));
        assert!(dbg.contains("<redacted>"));
    }
}
