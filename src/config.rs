use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::resource::RESOURCE_PATH_ENV;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Settings for marshalling and unmarshalling helpers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BindingConfig {
    /// Log validation events instead of failing the call
    pub tolerant: bool,
    /// Resource path of the XML schema used for validation
    pub schema_resource_path: Option<String>,
    /// Indent marshalled documents
    pub formatted_output: bool,
    /// Namespace of marshalled root elements, also used for `xsi:schemaLocation`
    pub schema_namespace: Option<String>,
    /// Directories searched for resources; empty means the environment default
    pub resource_roots: Vec<PathBuf>,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            tolerant: true,
            schema_resource_path: None,
            formatted_output: false,
            schema_namespace: None,
            resource_roots: Vec::new(),
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment
    pub fn load_config() -> Result<BindingConfig> {
        let mut config = Self::find_config_file()?.unwrap_or_default();

        config = Self::apply_environment_overrides(config)?;

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub fn load_from_file(path: &Path) -> Result<BindingConfig> {
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<BindingConfig>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub fn find_config_file() -> Result<Option<BindingConfig>> {
        let config_names = [
            "bind-xml.toml",
            "bind-xml.json",
            ".bind-xml.toml",
            ".bind-xml.json",
        ];

        // Check current directory first
        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path)?));
            }
        }

        // Check user config directory
        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("bind-xml");
            for name in &config_names {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path)?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: BindingConfig) -> Result<BindingConfig> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: BindingConfig,
    ) -> Result<BindingConfig> {
        if let Some(tolerant) = env.get("BIND_XML_TOLERANT") {
            config.tolerant = tolerant.parse().map_err(|_| {
                ConfigError::Environment(format!("Invalid BIND_XML_TOLERANT value: {}", tolerant))
            })?;
        }

        if let Some(schema) = env.get("BIND_XML_SCHEMA") {
            config.schema_resource_path = Some(schema);
        }

        if let Some(formatted) = env.get("BIND_XML_FORMATTED_OUTPUT") {
            config.formatted_output = formatted.parse().map_err(|_| {
                ConfigError::Environment(format!(
                    "Invalid BIND_XML_FORMATTED_OUTPUT value: {}",
                    formatted
                ))
            })?;
        }

        if let Some(namespace) = env.get("BIND_XML_SCHEMA_NAMESPACE") {
            config.schema_namespace = Some(namespace);
        }

        if let Some(roots) = env.get(RESOURCE_PATH_ENV) {
            config.resource_roots = std::env::split_paths(&roots)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate_config(config: &BindingConfig) -> Result<()> {
        if let Some(path) = &config.schema_resource_path {
            if path.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "Schema resource path cannot be empty".to_string(),
                ));
            }
        }

        if let Some(namespace) = &config.schema_namespace {
            if namespace.is_empty() {
                return Err(ConfigError::Validation(
                    "Schema namespace cannot be empty".to_string(),
                ));
            }
            if namespace.chars().any(char::is_whitespace) {
                return Err(ConfigError::Validation(format!(
                    "Schema namespace cannot contain whitespace: {}",
                    namespace
                )));
            }
        }

        if !config.tolerant && config.schema_resource_path.is_none() {
            return Err(ConfigError::Validation(
                "Strict validation requires a schema resource path".to_string(),
            ));
        }

        Ok(())
    }
}
