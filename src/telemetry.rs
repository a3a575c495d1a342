use tracing_subscriber::EnvFilter;

pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[cfg(feature = "metrics-exporter")]
pub fn init_metrics(listen: &str) -> anyhow::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let addr: std::net::SocketAddr = listen.parse()?;
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    tracing::info!(%addr, "prometheus exporter listening");
    metrics::gauge!("funding_board_up").set(1.0);
    Ok(())
}

#[cfg(not(feature = "metrics-exporter"))]
pub fn init_metrics(_listen: &str) -> anyhow::Result<()> {
    Ok(())
}
