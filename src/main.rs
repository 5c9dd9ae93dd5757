use farm_chef::{Settings, start_server};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,farm_chef=debug")),
        )
        .init();

    info!("Starting Farm Chef...");
    let settings = Settings::load()?;
    start_server(settings).await
}
