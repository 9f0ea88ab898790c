//! The extraction client: prompt + images + schema → JSON object.
//!
//! [`ExtractionService`] is the calling contract the surrounding pipeline
//! depends on; [`ExtractionClient`] is the implementation that talks to an
//! OpenAI-compatible chat-completions gateway over HTTP.
//!
//! ## Two entry points
//!
//! * [`ExtractionService::try_invoke`] returns a tagged
//!   `Result<Extraction, ExtractionFailure>` and touches no caller state. Use
//!   it when the failure reason matters (tests, the CLI, retry policies of
//!   your own).
//! * [`ExtractionService::invoke`] is the pipeline-facing form: it merges usage
//!   into the caller's [`UsageSink`] on success, and on any failure logs a
//!   warning and returns an empty map. Extraction is best-effort enrichment;
//!   a stage that gets `{}` simply proceeds without it.
//!
//! ## Retry Strategy
//!
//! Transport errors, timeouts, HTTP 429 and 5xx are retried with exponential
//! backoff: retry `n` (1-based) waits `retry_backoff_ms * 2^(n - 1)`. Anything
//! else fails immediately: a bad key or a model that ignored the JSON
//! instruction will not improve on a second identical request.

use crate::config::EndpointConfig;
use crate::error::{ExtractError, ExtractionFailure};
use crate::pipeline::request::{self, ChatRequest};
use crate::pipeline::{encode, response};
use crate::schema::ResponseSchema;
use crate::usage::{UsageDelta, UsageSink};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use image::{DynamicImage, GenericImageView};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// One extraction job: what to ask, what to show, what shape to answer in.
#[derive(Clone)]
pub struct ExtractionRequest {
    pub prompt: String,
    /// Sent after the prompt, in this order.
    pub images: Vec<DynamicImage>,
    /// JSON Schema document embedded in the system instruction.
    pub schema: Value,
}

// Pixel buffers would flood logs; print dimensions only.
impl fmt::Debug for ExtractionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sizes: Vec<(u32, u32)> = self.images.iter().map(|i| i.dimensions()).collect();
        f.debug_struct("ExtractionRequest")
            .field("prompt", &self.prompt)
            .field("images", &sizes)
            .field("schema", &self.schema)
            .finish()
    }
}

impl ExtractionRequest {
    pub fn new(prompt: impl Into<String>, schema: impl ResponseSchema) -> Self {
        Self {
            prompt: prompt.into(),
            images: Vec::new(),
            schema: schema.json_schema(),
        }
    }

    pub fn with_image(mut self, image: DynamicImage) -> Self {
        self.images.push(image);
        self
    }

    pub fn with_images(mut self, images: impl IntoIterator<Item = DynamicImage>) -> Self {
        self.images.extend(images);
        self
    }
}

/// Per-call overrides of the endpoint defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvokeOptions {
    /// Overrides [`EndpointConfig::max_retries`].
    pub max_retries: Option<u32>,
    /// Overrides [`EndpointConfig::timeout_secs`] for each attempt. Must be
    /// non-zero.
    pub timeout: Option<Duration>,
}

impl InvokeOptions {
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A successful extraction and what it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub value: Map<String, Value>,
    pub usage: UsageDelta,
}

/// Model-backed structured extraction.
///
/// Backends differ in transport; the contract does not.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Encode an image the way this backend ships it on the wire.
    fn encode_image(&self, image: &DynamicImage) -> Result<String, image::ImageError> {
        encode::encode_image(image)
    }

    /// Run one extraction and report exactly why it failed, if it did.
    async fn try_invoke(
        &self,
        request: &ExtractionRequest,
        options: InvokeOptions,
    ) -> Result<Extraction, ExtractionFailure>;

    /// Run one extraction, recording usage on success and returning `{}` on
    /// any failure. Never propagates an error.
    async fn invoke(
        &self,
        request: &ExtractionRequest,
        usage: &mut (dyn UsageSink + Send),
        options: InvokeOptions,
    ) -> Map<String, Value> {
        match self.try_invoke(request, options).await {
            Ok(extraction) => {
                usage.record_usage(extraction.usage);
                extraction.value
            }
            Err(failure) => {
                warn!(kind = failure.kind(), "VLM extraction failed: {}", failure);
                Map::new()
            }
        }
    }
}

/// HTTP client for OpenAI-compatible chat-completions gateways (OpenRouter
/// and friends).
///
/// Cheap to clone; clones share one connection pool and one configuration.
#[derive(Debug, Clone)]
pub struct ExtractionClient {
    http: reqwest::Client,
    config: Arc<EndpointConfig>,
}

impl ExtractionClient {
    pub fn new(config: EndpointConfig) -> Result<Self, ExtractError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("edgequake-vlm-extract/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExtractError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// Shorthand for `ExtractionClient::new(EndpointConfig::from_env()?)`.
    pub fn from_env() -> Result<Self, ExtractError> {
        Self::new(EndpointConfig::from_env()?)
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Validate the request and build the wire body. No network I/O.
    pub fn build_request(&self, req: &ExtractionRequest) -> Result<ChatRequest, ExtractionFailure> {
        if req.prompt.trim().is_empty() {
            return Err(ExtractionFailure::InvalidRequest("prompt must not be empty".into()));
        }

        let encoded = req
            .images
            .iter()
            .enumerate()
            .map(|(index, img)| {
                self.encode_image(img).map_err(|e| ExtractionFailure::Encode {
                    index,
                    detail: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "Built extraction request: model={}, {} image(s)",
            self.config.model,
            encoded.len()
        );

        Ok(request::build_request(
            &self.config.model,
            &req.prompt,
            encoded,
            &req.schema,
        ))
    }

    /// Run many extractions with at most `concurrency` in flight.
    ///
    /// Results come back in input order. Usage is not recorded; each
    /// [`Extraction`] carries its own delta for the caller to route to the
    /// right block.
    pub async fn try_invoke_all(
        &self,
        requests: &[ExtractionRequest],
        concurrency: usize,
        options: InvokeOptions,
    ) -> Vec<Result<Extraction, ExtractionFailure>> {
        stream::iter(requests.iter().map(|req| self.try_invoke(req, options)))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    /// One HTTP round trip, decoded through both JSON layers.
    async fn send_once(
        &self,
        body: &ChatRequest,
        timeout: Duration,
    ) -> Result<Extraction, ExtractionFailure> {
        let start = Instant::now();

        let resp = self
            .http
            .post(self.config.chat_completions_url())
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| classify_transport(&e, start))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| classify_transport(&e, start))?;

        if !status.is_success() {
            return Err(ExtractionFailure::protocol(
                status.as_u16(),
                &String::from_utf8_lossy(&bytes),
            ));
        }

        let reply = response::parse_envelope(&bytes)?;
        let value = response::parse_content(&reply.content)?;

        Ok(Extraction {
            value,
            usage: UsageDelta::single_request(reply.total_tokens),
        })
    }
}

#[async_trait]
impl ExtractionService for ExtractionClient {
    async fn try_invoke(
        &self,
        request: &ExtractionRequest,
        options: InvokeOptions,
    ) -> Result<Extraction, ExtractionFailure> {
        let start = Instant::now();
        let max_retries = options.max_retries.unwrap_or(self.config.max_retries);
        let timeout = options.timeout.unwrap_or_else(|| self.config.timeout());
        if timeout.is_zero() {
            return Err(ExtractionFailure::InvalidRequest("timeout must be greater than zero".into()));
        }

        let body = self.build_request(request)?;

        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 {
                let backoff = self
                    .config
                    .retry_backoff_ms
                    .saturating_mul(2u64.saturating_pow(attempt - 1));
                warn!("Extraction retry {}/{} after {}ms", attempt, max_retries, backoff);
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.send_once(&body, timeout).await {
                Ok(extraction) => {
                    info!(
                        "Extraction succeeded: {} keys, {} tokens, {} retries, {:?}",
                        extraction.value.len(),
                        extraction.usage.tokens_used,
                        attempt,
                        start.elapsed()
                    );
                    return Ok(extraction);
                }
                Err(failure) if failure.is_retryable() && attempt < max_retries => {
                    warn!("Extraction attempt {} failed: {}", attempt + 1, failure);
                    attempt += 1;
                }
                Err(failure) => return Err(failure),
            }
        }
    }
}

/// Map a reqwest error that happened before a full response was read.
fn classify_transport(e: &reqwest::Error, start: Instant) -> ExtractionFailure {
    if e.is_timeout() {
        return ExtractionFailure::Timeout {
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
    }

    let mut detail = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    ExtractionFailure::Transport(detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::request::ContentPart;
    use crate::usage::BlockUsage;
    use image::{Rgba, RgbaImage};
    use serde_json::json;

    fn client() -> ExtractionClient {
        ExtractionClient::new(
            EndpointConfig::builder()
                .api_key("test-key")
                .base_url("http://127.0.0.1:9")
                .build()
                .unwrap(),
        )
        .unwrap()
    }

    fn solid(r: u8) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([r, 0, 0, 255])))
    }

    #[test]
    fn build_request_orders_images_after_prompt() {
        let c = client();
        let req = ExtractionRequest::new("what is shown?", json!({"type": "object"}))
            .with_images([solid(1), solid(2), solid(3)]);
        let body = c.build_request(&req).unwrap();

        let parts = &body.messages[0].content;
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], ContentPart::Text { text: "what is shown?".into() });
        for (i, r) in [1u8, 2, 3].into_iter().enumerate() {
            let expected = encode::encode_image(&solid(r)).unwrap();
            assert_eq!(parts[i + 1], ContentPart::Image { image: expected });
        }
        assert_eq!(body.model, crate::config::DEFAULT_MODEL);
        assert!(!body.stream);
    }

    #[test]
    fn single_image_request() {
        let req = ExtractionRequest::new("p", json!({})).with_image(solid(9));
        let body = client().build_request(&req).unwrap();
        assert_eq!(body.messages[0].content.len(), 2);
    }

    #[test]
    fn empty_prompt_fails_without_network() {
        let c = client();
        let req = ExtractionRequest::new("   ", json!({}));
        let result = tokio_test::block_on(c.try_invoke(&req, InvokeOptions::default()));
        assert_eq!(result.unwrap_err().kind(), "invalid_request");
    }

    #[test]
    fn invoke_options_builder() {
        let o = InvokeOptions::default()
            .max_retries(2)
            .timeout(Duration::from_secs(5));
        assert_eq!(o.max_retries, Some(2));
        assert_eq!(o.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn zero_timeout_override_fails_without_network() {
        let req = ExtractionRequest::new("p", json!({}));
        let options = InvokeOptions::default().timeout(Duration::ZERO);
        let result = tokio_test::block_on(client().try_invoke(&req, options));
        assert_eq!(result.unwrap_err().kind(), "invalid_request");
    }

    #[test]
    fn request_debug_omits_pixels() {
        let req = ExtractionRequest::new("p", json!({})).with_images([solid(1), solid(2)]);
        let dbg = format!("{req:?}");
        assert!(dbg.contains("[(4, 4), (4, 4)]"), "got: {dbg}");
        assert!(!dbg.contains("ImageRgba8"));
    }

    /// Canned backend used to exercise the provided `invoke`.
    struct Canned(Result<Extraction, ExtractionFailure>);

    #[async_trait]
    impl ExtractionService for Canned {
        async fn try_invoke(
            &self,
            _request: &ExtractionRequest,
            _options: InvokeOptions,
        ) -> Result<Extraction, ExtractionFailure> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn invoke_records_usage_on_success() {
        let mut value = Map::new();
        value.insert("field".into(), json!("value"));
        let svc = Canned(Ok(Extraction {
            value: value.clone(),
            usage: UsageDelta::single_request(42),
        }));

        let mut block = BlockUsage::default();
        let req = ExtractionRequest::new("p", json!({}));
        let out = svc.invoke(&req, &mut block, InvokeOptions::default()).await;

        assert_eq!(out, value);
        assert_eq!(block, BlockUsage { llm_request_count: 1, llm_tokens_used: 42 });
    }

    #[tokio::test]
    async fn invoke_swallows_failure_and_leaves_sink_alone() {
        let svc = Canned(Err(ExtractionFailure::Content("not json".into())));
        let mut block = BlockUsage { llm_request_count: 3, llm_tokens_used: 7 };
        let req = ExtractionRequest::new("p", json!({}));
        let out = svc.invoke(&req, &mut block, InvokeOptions::default()).await;

        assert!(out.is_empty());
        assert_eq!(block, BlockUsage { llm_request_count: 3, llm_tokens_used: 7 });
    }

    #[test]
    fn service_is_object_safe() {
        let svc: Arc<dyn ExtractionService> = Arc::new(client());
        let encoded = svc.encode_image(&solid(5)).unwrap();
        assert!(!encoded.is_empty());
    }
}
