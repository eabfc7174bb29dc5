use std::sync::Arc;

use leadpulse::{
    dashboard_router, init_logging, log_app_bind, log_app_shutdown, log_app_start,
    log_upstream_configured, logging_config_from_env, HttpAnalyticsSource, Poller, ServiceConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;

    let service_cfg = ServiceConfig::from_env()?;
    log_app_start(&logging_cfg, &service_cfg);
    log_upstream_configured(&service_cfg);

    let source = Arc::new(HttpAnalyticsSource::new(&service_cfg.http_source_config())?);
    let poller = Arc::new(Poller::new(source, service_cfg.poller_config()));
    poller.start();

    let app = dashboard_router(Arc::clone(&poller));
    let listener = tokio::net::TcpListener::bind(service_cfg.bind_addr).await?;
    let bound_addr = listener.local_addr()?;

    log_app_bind(bound_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    poller.stop();
    log_app_shutdown();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(
            component = "dashboard_server",
            event = "app.signal.error",
            error = %err
        );
    }
}
