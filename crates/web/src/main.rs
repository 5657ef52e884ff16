use std::net::SocketAddr;

use conveyor_common::PanelConfig;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // File first, then CONVEYOR_* overrides.
    let config_path = PanelConfig::default_path();
    let mut config = PanelConfig::load(&config_path)?;
    config.apply_env()?;

    let web_addr: SocketAddr = config.listen_addr.parse()?;

    info!(
        "Starting Conveyor plan panel on http://{} (config: {})",
        web_addr,
        config_path.display()
    );

    conveyor_web::server::serve(web_addr, config).await
}
