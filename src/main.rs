//! masc - MySQL diagnostic snapshot collector
//!
//! This is the main entry point for the `masc` binary.

use anyhow::Result;
use clap::Parser;
use masc_cli::Cli;
use masc_config::GlobalConfig;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config discovery logs before the configured level and format are
    // known, so it runs under a plain stderr subscriber.
    let bootstrap = tracing_subscriber::registry()
        .with(env_filter(cli.verbose, DEFAULT_LEVEL))
        .with(fmt::layer().with_writer(std::io::stderr));
    let config = tracing::subscriber::with_default(bootstrap, || cli.load_config())?;

    init_logging(&config.global, cli.verbose);

    cli.run(config).await?;

    Ok(())
}

const DEFAULT_LEVEL: &str = "info";

/// Level used when `RUST_LOG` is unset
fn fallback_level(verbose: bool, configured: &str) -> &str {
    if verbose { "debug" } else { configured }
}

/// `RUST_LOG` wins, then `--verbose`, then the configured level.
fn env_filter(verbose: bool, configured: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(fallback_level(verbose, configured)))
}

/// Logs go to stderr so structured output on stdout stays parseable.
fn init_logging(global: &GlobalConfig, verbose: bool) {
    let registry = tracing_subscriber::registry().with(env_filter(verbose, &global.log_level));
    if global.json_logs {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
