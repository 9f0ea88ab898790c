//! # edgequake-vlm-extract
//!
//! Structured JSON extraction with Vision Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! Document pipelines regularly hit regions that rule-based code cannot
//! interpret: a chart, a handwritten table, a garbled scan. This crate hands
//! such a region to a multimodal model together with a JSON Schema, and gets
//! back a JSON object shaped by that schema, plus the token count the call
//! cost. Failures never abort the pipeline: the default entry point returns an
//! empty object and logs why.
//!
//! ## Call Overview
//!
//! ```text
//! prompt + images + schema
//!  │
//!  ├─ 1. Encode   images → base64 PNG (lossless, order preserved)
//!  ├─ 2. Request  user turn [text, image…] + schema system instruction
//!  ├─ 3. HTTP     POST {base}/chat/completions, JSON mode, bounded deadline
//!  ├─ 4. Decode   envelope JSON → message content → JSON object
//!  └─ 5. Account  +1 request, +total_tokens onto the caller's usage sink
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_vlm_extract::{
//!     schema_of, BlockUsage, ExtractionClient, ExtractionRequest, ExtractionService, InvokeOptions,
//! };
//!
//! #[derive(schemars::JsonSchema)]
//! struct Caption {
//!     text: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads OPENROUTER_BASE_URL / OPENROUTER_API_KEY / OPENROUTER_MODEL
//!     let client = ExtractionClient::from_env()?;
//!     let image = image::open("figure.png")?;
//!
//!     let request = ExtractionRequest::new("Caption this figure.", schema_of::<Caption>())
//!         .with_image(image);
//!     let mut usage = BlockUsage::default();
//!     let value = client.invoke(&request, &mut usage, InvokeOptions::default()).await;
//!
//!     println!("{}", serde_json::Value::Object(value));
//!     eprintln!("tokens: {}", usage.llm_tokens_used);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `vlm-extract` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod schema;
pub mod usage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{Extraction, ExtractionClient, ExtractionRequest, ExtractionService, InvokeOptions};
pub use config::{EndpointConfig, EndpointConfigBuilder};
pub use error::{ExtractError, ExtractionFailure};
pub use schema::{schema_of, ResponseSchema};
pub use usage::{BlockUsage, UsageDelta, UsageSink};
