mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Upper bound on both the batch size and the pool's concurrency.
pub const MAX_CONCURRENCY: usize = 10;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./pixluna.toml",
        "./config.toml",
        "~/.config/pixluna/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if !(1..=MAX_CONCURRENCY).contains(&config.max_concurrency) {
        anyhow::bail!(
            "max_concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY,
            config.max_concurrency
        );
    }

    if !(0.0..=1.0).contains(&config.r18_probability) {
        anyhow::bail!(
            "r18_probability must be within [0, 1], got {}",
            config.r18_probability
        );
    }

    if config.image_processing.compression_level > 9 {
        anyhow::bail!(
            "image_processing.compression_level must be between 0 and 9, got {}",
            config.image_processing.compression_level
        );
    }

    if config.proxy.enabled && config.proxy.host.trim().is_empty() {
        anyhow::bail!("Proxy is enabled but proxy.host is empty");
    }

    for alias in &config.default_source_provider {
        if alias.trim().is_empty() {
            anyhow::bail!("default_source_provider contains an empty alias");
        }
    }

    if config.default_source_provider.is_empty() {
        tracing::warn!("No default source provider configured; an explicit source is required");
    }

    Ok(())
}
