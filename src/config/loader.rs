//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::PoolConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable that overrides every descriptor password, so the
/// secret can stay out of the config file.
pub const PASSWORD_ENV: &str = "DB_PASSWORD";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
///
/// If `DB_PASSWORD` is set in the environment it replaces the password of
/// every descriptor after parsing and before validation.
pub fn load_config(path: &Path) -> Result<PoolConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: PoolConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        for descriptor in &mut config.descriptors {
            descriptor.password = password.clone();
        }
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
