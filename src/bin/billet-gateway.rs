use std::sync::Arc;

use anyhow::{Context, Result};
use billet_gateway::client::billing_client::BillingClient;
use billet_gateway::config::client::{resolve_private_key, ClientConfig};
use billet_gateway::server;
use billet_gateway::utils::config_loader;
use billet_gateway::utils::constants::{ENV_CLIENT_ID, ENV_HOST, ENV_PRIVATE_KEY, ENV_PRIVATE_KEY_FILE};
use billet_gateway::utils::logging;
use billet_gateway::utils::logging::LogLevel;
use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "billet-gateway.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
    /// Bank API base URL
    #[arg(long, env = ENV_HOST)]
    host: Option<String>,
    #[arg(long, env = ENV_CLIENT_ID)]
    client_id: Option<String>,
    /// PEM-encoded RSA private key
    #[arg(long, env = ENV_PRIVATE_KEY, hide_env_values = true)]
    private_key: Option<String>,
    #[arg(long, env = ENV_PRIVATE_KEY_FILE)]
    private_key_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML settings
    // -------------------------------

    let args = Args::parse();
    let settings = config_loader::run(&args.config).await?;
    logging::run(&settings, args.log_level);

    // -------------------------------
    // 2. Build the signed bank client
    // -------------------------------

    let config = ClientConfig {
        host: args.host,
        client_id: args.client_id,
        private_key: resolve_private_key(args.private_key, args.private_key_file)?,
        ..ClientConfig::default()
    }
    .with_settings(&settings);
    let client = BillingClient::new(config).context("cannot start billet client")?;

    // -------------------------------
    // 3. Serve until Ctrl-C
    // -------------------------------

    info!("Service starting...");
    server::server::start(&settings, Arc::new(client)).await
}
