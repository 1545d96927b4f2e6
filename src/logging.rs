//! Logging initialisation for the binary

use crate::config::LoggingConfig;
use log::info;
use std::path::Path;

/// Initialise log4rs from the configured file, or fall back to env_logger
/// (`RUST_LOG`, default `info`) when the file does not exist.
pub fn init(config: &LoggingConfig) {
    let path = Path::new(&config.config_file);
    if path.exists() {
        match log4rs::init_file(path, Default::default()) {
            Ok(()) => {
                info!("Logging configured from {}", path.display());
                return;
            }
            Err(e) => eprintln!("Failed to load {}: {}. Falling back to env_logger.", path.display(), e),
        }
    }

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
