use std::{env, fs};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_env")]
    pub env: String,
    #[serde(default = "default_address")]
    pub address: String,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

fn default_env() -> String {
    "local".to_string()
}

fn default_address() -> String {
    "127.0.0.1:8080".to_string()
}

/// Loads the config from the path in `CONFIG_PATH`, falling back to
/// `config.toml` next to the working directory.
pub fn load() -> Result<Config> {
    let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let raw =
        fs::read_to_string(&path).with_context(|| format!("failed to read config file {path}"))?;
    let config: Config =
        toml::from_str(&raw).with_context(|| format!("failed to parse config file {path}"))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let raw = r#"
            env = "prod"
            address = "0.0.0.0:9090"

            [database]
            url = "sqlite:clicks.db"
        "#;

        let config: Config = toml::from_str(raw).expect("config should parse");
        assert_eq!(config.env, "prod");
        assert_eq!(config.address, "0.0.0.0:9090");
        assert_eq!(config.database.url, "sqlite:clicks.db");
    }

    #[test]
    fn env_and_address_default_when_omitted() {
        let raw = r#"
            [database]
            url = "sqlite:clicks.db"
        "#;

        let config: Config = toml::from_str(raw).expect("config should parse");
        assert_eq!(config.env, "local");
        assert_eq!(config.address, "127.0.0.1:8080");
    }

    #[test]
    fn missing_database_section_is_an_error() {
        let result = toml::from_str::<Config>("env = \"local\"");
        assert!(result.is_err());
    }
}
