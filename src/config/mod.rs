mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    parse_config(&content).with_context(|| format!("Invalid config file: {:?}", path))
}

/// Parse and validate configuration text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./framepull.toml", "~/.config/framepull/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

fn validate_config(config: &Config) -> Result<()> {
    if config.demux.sample_buffer_target == 0 {
        anyhow::bail!("demux.sample_buffer_target cannot be 0");
    }
    if config.demux.extraction_batch == 0 {
        anyhow::bail!("demux.extraction_batch cannot be 0");
    }
    if config.demux.read_chunk_size == 0 {
        anyhow::bail!("demux.read_chunk_size cannot be 0");
    }
    if config.demux.extraction_batch > config.demux.sample_buffer_target {
        tracing::warn!(
            "demux.extraction_batch ({}) exceeds sample_buffer_target ({}); \
             the buffer will overshoot its target by up to one batch",
            config.demux.extraction_batch,
            config.demux.sample_buffer_target
        );
    }

    if config.scheduler.frame_window_depth == 0 {
        anyhow::bail!("scheduler.frame_window_depth cannot be 0");
    }
    if config.scheduler.decode_queue_depth == 0 {
        anyhow::bail!("scheduler.decode_queue_depth cannot be 0");
    }
    if config.scheduler.refill_interval_ms == 0 || config.scheduler.render_interval_ms == 0 {
        anyhow::bail!("scheduler intervals must be at least 1ms");
    }

    Ok(())
}
