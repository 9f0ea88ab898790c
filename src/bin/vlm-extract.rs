//! CLI binary for edgequake-vlm-extract.
//!
//! A thin shim over the library crate: maps CLI flags and environment to an
//! `EndpointConfig`, runs one extraction, prints the JSON object.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_vlm_extract::{
    BlockUsage, EndpointConfig, ExtractionClient, ExtractionRequest, ExtractionService,
    InvokeOptions, UsageSink,
};
use serde_json::Value;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Caption a figure
  vlm-extract --prompt "Caption this figure" --image fig.png --schema caption.schema.json

  # Several images, sent in the given order
  vlm-extract -p "Compare the two tables" -i left.png -i right.png -s diff.schema.json

  # Text-only request with a different model
  vlm-extract -p "Extract the invoice total from: ..." -s total.schema.json \
      --model openai/gpt-4.1-mini

ENVIRONMENT VARIABLES:
  OPENROUTER_BASE_URL   Endpoint base URL (default https://openrouter.ai/api/v1)
  OPENROUTER_API_KEY    API key (required)
  OPENROUTER_MODEL      Model ID (default anthropic/claude-3.5-sonnet)
"#;

/// Extract a schema-shaped JSON object from a prompt and images using a Vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "vlm-extract",
    version,
    about = "Extract schema-shaped JSON from a prompt and images using Vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Instruction sent as the text part of the user message.
    #[arg(short, long)]
    prompt: String,

    /// Image file to attach; repeat for several (order is preserved).
    #[arg(short, long = "image")]
    images: Vec<PathBuf>,

    /// Path to a JSON Schema document describing the expected reply.
    #[arg(short, long)]
    schema: PathBuf,

    /// Endpoint base URL.
    #[arg(long, env = "OPENROUTER_BASE_URL")]
    base_url: Option<String>,

    /// API key.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model ID.
    #[arg(long, env = "OPENROUTER_MODEL")]
    model: Option<String>,

    /// Per-attempt timeout in seconds.
    #[arg(long, env = "VLM_EXTRACT_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Retries on transient failures (network, timeout, 429, 5xx).
    #[arg(long, env = "VLM_EXTRACT_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Print `{}` and exit 0 on failure instead of exiting non-zero.
    #[arg(long)]
    lenient: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "VLM_EXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build client ─────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    let client = ExtractionClient::new(config).context("Failed to create extraction client")?;

    // ── Load inputs ──────────────────────────────────────────────────────
    let schema_text = tokio::fs::read_to_string(&cli.schema)
        .await
        .with_context(|| format!("Failed to read schema from {:?}", cli.schema))?;
    let schema: Value = serde_json::from_str(&schema_text)
        .with_context(|| format!("Schema file {:?} is not valid JSON", cli.schema))?;

    let mut images = Vec::with_capacity(cli.images.len());
    for path in &cli.images {
        let img = image::open(path).with_context(|| format!("Failed to open image {:?}", path))?;
        images.push(img);
    }

    let request = ExtractionRequest::new(cli.prompt.clone(), schema).with_images(images);
    let options = InvokeOptions::default()
        .max_retries(cli.max_retries)
        .timeout(Duration::from_secs(cli.timeout.max(1)));

    // ── Run extraction ───────────────────────────────────────────────────
    let mut usage = BlockUsage::default();
    let value = match client.try_invoke(&request, options).await {
        Ok(extraction) => {
            usage.record_usage(extraction.usage);
            extraction.value
        }
        Err(failure) if cli.lenient => {
            tracing::warn!(kind = failure.kind(), "Extraction failed: {}", failure);
            Default::default()
        }
        Err(failure) => {
            let kind = failure.kind();
            return Err(failure).context(format!("Extraction failed ({kind})"));
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&Value::Object(value)).context("Failed to serialise output")?
    );

    if !cli.quiet {
        eprintln!(
            "{} request(s)  /  {} tokens",
            usage.llm_request_count, usage.llm_tokens_used
        );
    }

    Ok(())
}

/// Map CLI args (already merged with env by clap) to `EndpointConfig`.
fn build_config(cli: &Cli) -> Result<EndpointConfig> {
    let mut builder = EndpointConfig::builder().timeout_secs(cli.timeout.max(1));

    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }

    builder.build().context("Invalid configuration")
}
