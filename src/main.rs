use anyhow::Result;
use apod_proxy::config::Config;
use apod_proxy::server::Server;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "apod-proxy", version, about = "Proxy for NASA's Astronomy Picture of the Day API")]
struct Cli {
    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Default log level when RUST_LOG is unset (overrides LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let mut config = Config::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(log_level) = cli.log_level {
        config.log_level = log_level;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("apod_proxy={},tower_http=debug", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    install_panic_hook();

    tracing::info!("Starting APOD proxy");
    tracing::info!(
        "Configuration: port={}, environment={}, cors_origin={}, rate_limit={}/{}s",
        config.port,
        config.environment,
        config.cors_origin,
        config.rate_limit_max,
        config.rate_limit_window_secs
    );
    if !config.has_custom_api_key() {
        tracing::warn!(
            "NASA_API_KEY is not set; using the shared DEMO_KEY, which has a very low request quota"
        );
    }

    let server = Server::new(config)
        .map_err(|e| anyhow::anyhow!("Failed to create server: {}", e))?;

    server
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

/// Route panics through tracing before the default hook runs.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown".to_string());
        tracing::error!(location = %location, "Panic: {}", info);
        default_hook(info);
    }));
}
