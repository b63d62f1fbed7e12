use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Config path: first CLI argument, then env, then the conventional default.
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("IMAGECAT_CONFIG").ok())
        .unwrap_or_else(|| "config.json".to_string());

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let settings = imagecat::config::Settings::load(&config_path)?;
    info!(
        target: "imagecat",
        "imagecat starting: RUST_LOG='{}', config='{}', listen={}, auth_enabled={}",
        rust_log,
        config_path,
        settings.listen_addr(),
        settings.authentication.enabled
    );
    info!(target: "imagecat", "loaded configuration: {}", settings.show());

    imagecat::server::run(Arc::new(settings)).await
}
