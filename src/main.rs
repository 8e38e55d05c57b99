use std::sync::Arc;

use clap::Parser;
use scenarist::{ChromeBrowser, ServerConfig, SessionRegistry};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "scenarist", about = "Headless browser scenario execution service")]
struct Cli {
    /// Interface to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("scenarist=info,tower_http=warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
    };

    let registry: Arc<SessionRegistry<ChromeBrowser>> = Arc::new(SessionRegistry::new());

    let handle = scenarist::server::start(config, registry).await?;
    info!(addr = %handle.addr, "ready for scenarios");
    handle.wait().await;

    Ok(())
}
