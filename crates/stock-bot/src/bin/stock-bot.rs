//! KakaoTalk stock quote skill server
//!
//! # Usage
//!
//! ```bash
//! # Summaries through Gemini (default)
//! export GEMINI_API_KEY="..."
//!
//! # Or any OpenAI-compatible endpoint
//! export LLM_PROVIDER=openai
//! export OPENAI_API_KEY="..."
//! export OPENAI_MODEL="gpt-4o-mini"
//!
//! cargo run --bin stock-bot -- --port 3000
//! ```

use anyhow::{Context, bail};
use bot_llm::LLMProvider;
use bot_llm::providers::{GeminiProvider, OpenAIProvider};
use bot_utils::{LogFormat, init_tracing, load_dotenv};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use stock_bot::StockConfig;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "stock-bot", version, about = "KakaoTalk stock quote skill server")]
struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Emit JSON log lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Summarization backend: gemini or openai
    #[arg(long, env = "LLM_PROVIDER", default_value = "gemini")]
    llm_provider: String,
}

/// Provider and the model name requests should carry
fn select_provider(name: &str) -> anyhow::Result<(Arc<dyn LLMProvider>, Option<String>)> {
    match name.to_ascii_lowercase().as_str() {
        "gemini" => {
            let provider = GeminiProvider::from_env()?;
            let model = provider.config().default_model.clone();
            Ok((Arc::new(provider), Some(model)))
        }
        "openai" => {
            let provider = OpenAIProvider::from_env()?;
            info!("Using OpenAI-compatible endpoint {}", provider.config().api_base);
            let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
            Ok((Arc::new(provider), Some(model)))
        }
        other => bail!("unknown LLM_PROVIDER {other:?} (expected gemini or openai)"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = load_dotenv();
    let args = Args::parse();
    init_tracing(LogFormat::from_json_flag(args.log_json));

    if let Some(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    let (llm, provider_model) = select_provider(&args.llm_provider)?;
    let mut config = StockConfig::from_env()?;
    // An explicit STOCK_BOT_MODEL wins over the provider's default
    if let (Err(_), Some(model)) = (std::env::var("STOCK_BOT_MODEL"), provider_model) {
        config.model = model;
    }
    info!(
        provider = llm.name(),
        model = %config.model,
        budget = ?config.analysis_budget,
        "Configuration loaded"
    );

    let handler = Arc::new(stock_bot::build_handler(&config, llm)?);
    let app = stock_bot::platforms::router(handler);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", args.host, args.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("Stock bot listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
