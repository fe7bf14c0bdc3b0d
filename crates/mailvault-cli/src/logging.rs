use std::io;
use tracing_subscriber::EnvFilter;

pub const LOG_LEVEL_ENV: &str = "MAILVAULT_LOG_LEVEL";

/// `RUST_LOG` wins, then `MAILVAULT_LOG_LEVEL`, then the config file, then `info`.
pub fn resolve_level(configured: Option<&str>) -> String {
    std::env::var(LOG_LEVEL_ENV)
        .ok()
        .filter(|level| !level.trim().is_empty())
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| "info".to_string())
}

pub fn init_logging(configured: Option<&str>) {
    let level = resolve_level(configured);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("log_init_error: a global subscriber is already installed");
    }
}
