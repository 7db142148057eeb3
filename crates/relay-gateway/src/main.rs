//! relay-gateway: Messenger Relay Main Binary
//!
//! Usage:
//!   relay-gateway           - Start the webhook server
//!   relay-gateway --help    - Show help
//!   relay-gateway --version - Show version

use std::sync::Arc;

use relay_core::Config;
use relay_facebook::MessageHandler;
use tracing_subscriber::EnvFilter;

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    /// Webhook server
    Server,
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match parse_args(std::env::args().skip(1)) {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("relay-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Loads .env, then relay-gateway.toml or the environment
    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    run_server(config).await
}

/// Parse command line arguments
fn parse_args(args: impl IntoIterator<Item = String>) -> RunMode {
    for arg in args {
        match arg.as_str() {
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => {}
        }
    }

    RunMode::Server
}

/// Print help message
fn print_help() {
    println!("relay-gateway - Facebook Messenger webhook relay");
    println!();
    println!("Usage:");
    println!("  relay-gateway           Start the webhook server");
    println!("  relay-gateway --help    Show this help message");
    println!("  relay-gateway --version Show version");
    println!();
    println!("Environment Variables:");
    println!("  FACEBOOK_PAGE_ACCESS_TOKEN  Page access token for the Send API");
    println!("  FACEBOOK_VERIFY_TOKEN       Webhook verify token (default: verify-token)");
    println!("  FACEBOOK_GRAPH_URL          Graph API base URL (default: https://graph.facebook.com/v15.0)");
    println!("  GEMINI_API_KEY              Gemini API key (optional, enables AI replies)");
    println!("  GEMINI_MODEL                Gemini model (default: gemini-2.0-flash)");
    println!("  GEMINI_BASE_URL             Custom Gemini endpoint");
    println!("  HOST                        Listen address (default: 0.0.0.0)");
    println!("  PORT                        Listen port (default: 3000)");
    println!("  HTTP_TIMEOUT_SECS           Outbound request timeout (default: 30)");
    println!("  RUST_LOG                    Log filter (default: info)");
}

/// Run the webhook server until Ctrl+C or SIGTERM
async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting relay-gateway...");

    if config.facebook.page_access_token.is_none() {
        tracing::warn!("FACEBOOK_PAGE_ACCESS_TOKEN is not set; replies will not be delivered");
    }
    if config.llm_enabled() {
        tracing::info!("Gemini replies enabled (model: {})", config.llm.model);
    } else {
        tracing::info!("Gemini replies disabled (no GEMINI_API_KEY configured)");
    }

    let handler = MessageHandler::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create message handler: {}", e))?;

    relay_facebook::serve(&config.bind_addr(), Arc::new(handler), shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutting down...");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        assert_eq!(parse_args(args(&[])), RunMode::Server);
        assert_eq!(parse_args(args(&["--help"])), RunMode::Help);
        assert_eq!(parse_args(args(&["-v"])), RunMode::Version);
        assert_eq!(parse_args(args(&["--unknown", "-h"])), RunMode::Help);
    }
}
