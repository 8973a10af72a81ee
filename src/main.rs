use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use gigl_portal::config::PortalConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let cfg = PortalConfig::from_env();
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "portal",
        "GIGL portal starting: RUST_LOG='{}', http_port={}, data_root='{}', admin_handle='{}', admin_role='{}', session_ttl_days={}",
        rust_log, cfg.http_port, cfg.data_root, cfg.admin_handle, cfg.admin_role, cfg.session_ttl_days
    );

    gigl_portal::server::run_with_config(cfg).await
}
