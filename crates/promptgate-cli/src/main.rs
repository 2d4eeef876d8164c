//! promptgate - interactive chat with a security scan in front of the model.

mod report;
mod session;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use promptgate_gateway::{Gateway, GatewayConfig, Provider};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::BufReader;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

/// Chat with an LLM; every message is scanned by the AI runtime security API first.
#[derive(Debug, Parser)]
#[command(name = "promptgate", version, about)]
struct Args {
    /// TOML file with tunables ([scan] and [generation] sections)
    #[arg(long, env = "PROMPTGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Generation provider: openai or perplexity
    #[arg(long)]
    provider: Option<Provider>,

    /// Log output format (logs go to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    /// Do not read a .env file from the working directory
    #[arg(long)]
    no_dotenv: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let dotenv = (!args.no_dotenv).then(dotenvy::dotenv);
    init_tracing(args.log_format);

    match dotenv {
        Some(Ok(path)) => info!(path = %path.display(), "Loaded environment from file"),
        Some(Err(err)) if err.not_found() => {}
        Some(Err(err)) => warn!(error = %err, "Could not load .env file"),
        None => {}
    }

    let config = GatewayConfig::load(args.config.as_deref(), args.provider)
        .context("configuration is incomplete or invalid")?;
    let gateway = Gateway::from_config(&config).context("failed to initialise the gateway")?;

    let mut out = std::io::stdout();
    print_banner(&mut out, &config)?;

    let mut input = BufReader::new(tokio::io::stdin());

    tokio::select! {
        result = session::run(&gateway, &mut input, &mut out) => {
            let summary = result.context("terminal I/O failed")?;
            info!(turns = summary.turns, end = ?summary.end, "Session ended");
        }
        _ = shutdown_signal() => {
            println!("\nInterrupted. Session terminated.");
        }
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("promptgate=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn print_banner<W: Write>(out: &mut W, config: &GatewayConfig) -> std::io::Result<()> {
    let rule = "=".repeat(60);
    writeln!(out, "{rule}")?;
    writeln!(out, "PROMPTGATE READY")?;
    writeln!(out, "{rule}")?;
    writeln!(out, "Scan endpoint:  {}", config.scan.endpoint)?;
    writeln!(out, "Profile:        {}", config.scan.profile_name)?;
    writeln!(
        out,
        "Retries:        {} (backoff from {} ms)",
        config.scan.retry.max_retries(),
        config.scan.retry.base_delay().as_millis()
    )?;
    writeln!(out, "Provider:       {}", config.generation.provider)?;
    writeln!(out, "Model:          {}", config.generation.model)?;
    writeln!(out, "{rule}")?;
    writeln!(out, "Every message is scanned before it reaches the model.")?;
    writeln!(out, "No conversation history is kept. Type '{}' to quit.", session::EXIT_SENTINEL)
}

/// Resolve on Ctrl+C or SIGTERM.
///
/// `main` races this against the session, so when it fires the session future
/// is dropped: the in-flight turn is cancelled along with its scan request,
/// backoff sleep or generation call, and nothing further is read from stdin.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, abandoning session"),
        _ = terminate => info!("Received SIGTERM, abandoning session"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "promptgate",
            "--provider",
            "perplexity",
            "--log-format",
            "json",
            "--no-dotenv",
        ])
        .unwrap();
        assert_eq!(args.provider, Some(Provider::Perplexity));
        assert!(matches!(args.log_format, LogFormat::Json));
        assert!(args.no_dotenv);
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        assert!(Args::try_parse_from(["promptgate", "--provider", "bard"]).is_err());
    }
}
