//! babel configuration system.
//!
//! TOML-based configuration with full validation. All config sections use
//! defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use babel_config::load_config;
//!
//! let config = load_config().expect("failed to load config");
//! println!("{}", config.service.websocket_url());
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    BabelConfig, LogLevel, LoggingConfig, ParticipantConfig, ServiceConfig, TimeoutConfig,
    TtsFormat,
};

use std::path::Path;

use babel_common::ConfigError;

/// Load and validate config from the platform default path, creating a
/// default file if none exists.
pub fn load_config() -> Result<BabelConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Load and validate config from an explicit path.
pub fn load_config_from(path: &Path) -> Result<BabelConfig, ConfigError> {
    let config = toml_loader::load_from_path(path)?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &BabelConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_json_contains_all_sections() {
        let json = config_to_json(&BabelConfig::default());
        assert!(json.contains("\"service\""));
        assert!(json.contains("\"participant\""));
        assert!(json.contains("\"timeouts\""));
        assert!(json.contains("\"logging\""));
    }

    #[test]
    fn load_config_from_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[timeouts]\nleave_secs = 0\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
