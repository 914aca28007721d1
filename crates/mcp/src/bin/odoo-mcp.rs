// Standalone MCP server binary

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use odoo_mcp::config::{resolve_config_path, ConfigLoader, EnvDefaults, CONFIG_FILE_ENV};
use odoo_mcp::{Dispatcher, McpServer};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "odoo-mcp")]
#[command(about = "MCP server for Odoo JSON-2 operations across multiple companies", long_about = None)]
struct Args {
    /// Path to the company configuration file [default: odoo-mcp.toml]
    #[arg(short, long, env = CONFIG_FILE_ENV)]
    config: Option<PathBuf>,

    /// Log output format (logs go to stderr)
    #[arg(long, value_enum, default_value = "compact")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries the protocol, so logs go to stderr
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "odoo_mcp=info,odoo_client=info".into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    match args.log_format {
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Json => subscriber.json().init(),
    }

    tracing::info!("Odoo MCP server starting...");

    let config_path = resolve_config_path(args.config.as_deref());
    let registry = ConfigLoader::new(EnvDefaults::from_process()).load(&config_path);
    if registry.is_empty() {
        tracing::warn!(
            "No companies configured; only odoo_list_companies will be useful. Check {}",
            config_path.display()
        );
    }

    let dispatcher =
        Dispatcher::new(Arc::new(registry)).context("failed to build Odoo clients")?;

    let server = McpServer::new(Arc::new(dispatcher));
    server.run_stdio().await?;

    tracing::info!("Input closed, shutting down");
    Ok(())
}
