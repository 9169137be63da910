//! Configuration schema (sqlinfer.toml)

use serde::{Deserialize, Serialize};

/// Environment variable holding the catalog connection string
pub const DATABASE_URL_ENV: &str = "SQLINFER_DATABASE_URL";

/// How unresolvable references are handled during resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResolveMode {
    /// Fail on the first unresolved source, column, function or type
    #[default]
    Strict,

    /// Drop unresolved sources and fall back to `Unknown` types
    Lenient,
}

/// Catalog connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// libpq key/value string or `postgres://` URL
    pub connection: String,

    /// Connect over TLS
    #[serde(default)]
    pub tls: bool,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Schema assumed for unqualified table names
    #[serde(default = "default_schema")]
    pub default_schema: String,

    /// Schemas searched, in order, for unqualified names
    #[serde(default = "default_search_path")]
    pub search_path: Vec<String>,

    /// Resolution mode
    #[serde(default)]
    pub mode: ResolveMode,

    /// Catalog connection (optional; absent when resolving against fixtures)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<CatalogConfig>,
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_search_path() -> Vec<String> {
    vec!["public".to_string(), "pg_catalog".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_schema: default_schema(),
            search_path: default_search_path(),
            mode: ResolveMode::default(),
            catalog: None,
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Build a config from the environment.
    ///
    /// Reads `.env` if present, then `SQLINFER_DATABASE_URL` for the catalog connection.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();

        let connection = std::env::var(DATABASE_URL_ENV)
            .map_err(|_| ConfigError::MissingEnv(DATABASE_URL_ENV.to_string()))?;

        Ok(Self::default().with_catalog(CatalogConfig {
            tls: connection.contains("sslmode=require"),
            connection,
        }))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Set the catalog connection
    pub fn with_catalog(mut self, catalog: CatalogConfig) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Set the resolution mode
    pub fn with_mode(mut self, mode: ResolveMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Environment variable not set: {0}")]
    MissingEnv(String),
}
