//! Configuration loading
//!
//! Defaults, then an optional layered config file, then the recognized
//! environment keys. Environment always wins.

use std::path::{Path, PathBuf};

use webpilot_core_types::EngineConfig;

use crate::engine::EngineError;

/// Default state directory: `~/.local/share/webpilot` (platform
/// equivalent), falling back to a relative directory.
pub fn default_state_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("webpilot"))
        .unwrap_or_else(|| PathBuf::from(".webpilot"))
}

/// Resolve the engine configuration.
pub fn load_config(file: Option<&Path>) -> Result<EngineConfig, EngineError> {
    let mut builder = config::Config::builder()
        .add_source(config::Config::try_from(&EngineConfig::default()).map_err(config_err)?);
    if let Some(path) = file {
        builder = builder.add_source(config::File::from(path));
    }
    let mut resolved: EngineConfig = builder
        .build()
        .map_err(config_err)?
        .try_deserialize()
        .map_err(config_err)?;

    resolved = resolved.apply_env(|key| std::env::var(key).ok());
    if resolved.state_dir == PathBuf::from(".webpilot") {
        resolved.state_dir = default_state_dir();
    }
    Ok(resolved)
}

fn config_err(err: config::ConfigError) -> EngineError {
    EngineError::Config(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn file_layer_sits_under_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("webpilot.toml");
        std::fs::write(&path, "max_heal_rounds = 5\ndrift_threshold = 0.2\n").unwrap();

        std::env::set_var("MAX_HEAL_ROUNDS", "2");
        let config = load_config(Some(&path)).unwrap();
        std::env::remove_var("MAX_HEAL_ROUNDS");

        // Env beat the file; the file beat the default.
        assert_eq!(config.max_heal_rounds, 2);
        assert_eq!(config.drift_threshold, 0.2);
    }

    #[test]
    #[serial]
    fn defaults_load_without_a_file() {
        let config = load_config(None).unwrap();
        assert_eq!(config.max_heal_rounds, 3);
        assert_eq!(config.cache_ttl_hot_s, 3600);
    }
}
