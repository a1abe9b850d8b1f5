use echarts_renderd::config::ServiceConfig;
use echarts_renderd::server::{app, AppState};
use std::net::SocketAddr;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ServiceConfig::from_env();
    info!(
        "starting: bundle={} chrome={} concurrency={}",
        config.echarts_path.display(),
        config
            .chrome_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "auto".into()),
        config.max_concurrent_renders
    );

    let state = AppState::from_config(&config)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("ECharts renderer listening on :{}", config.port);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
