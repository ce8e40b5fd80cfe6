mod config;

use anyhow::Context as _;
use clap::Parser as _;
use config::Config;
use recsys_router::{
    AppState, build_metrics_layer_and_handle, build_metrics_router, build_router,
    catalog::CatalogClient,
    client::create_hyper_client,
    registry::{ConfigFile, ModelRegistry},
    router::RecsysRouter,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, instrument, warn};

#[tokio::main]
#[instrument]
pub async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse().validate()?;
    info!("Starting recommendation router with config: {:?}", config);

    let config_file = ConfigFile::from_path(&config.config).await?;
    let registry = ModelRegistry::from_config(&config_file)
        .context("Failed to build recommender model registry")?;
    let recsys = RecsysRouter::new(registry, config_file.default_model.as_deref());

    let admin_keys = config_file.admin_keys();
    if admin_keys.is_empty() {
        warn!("No admin keys configured, model administration endpoints are unauthenticated");
    }

    let http_client = create_hyper_client(config.pool());
    let catalog = CatalogClient::new(
        config_file.catalog.base_url.clone(),
        http_client.clone(),
        config.request_timeout(),
    );

    let app_state = AppState::with_client(
        recsys,
        http_client,
        Arc::new(catalog),
        config.request_timeout(),
    )
    .with_admin_keys(admin_keys);
    let mut router = build_router(app_state, &config.api_prefix);

    if config.metrics {
        let (prometheus_layer, handle) = build_metrics_layer_and_handle(config.metrics_prefix.clone());
        router = router.layer(prometheus_layer);

        let metrics_addr = format!("0.0.0.0:{}", config.metrics_port);
        let metrics_listener = TcpListener::bind(&metrics_addr)
            .await
            .with_context(|| format!("Failed to bind metrics listener to {metrics_addr}"))?;
        info!("Metrics listening on {}", metrics_addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(metrics_listener, build_metrics_router(handle)).await {
                error!("Metrics server stopped: {}", e);
            }
        });
    }

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Recommendation router listening on {}", bind_addr);

    axum::serve(listener, router).await?;

    Ok(())
}
