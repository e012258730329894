use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SCREENER_ENDPOINT: &str = "https://chartink.com/screener/process";
pub const DEFAULT_DISPLAY_TIMEZONE: &str = "Asia/Kolkata";
// Not part of the shipped catalog, so a bare /download posts an empty scan.
pub const DEFAULT_DOWNLOAD_SCREENER: &str = "episodic_pivot";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("unknown display timezone '{0}'")]
    InvalidTimezone(String),
}

// YAML-serializable configuration structure
#[derive(Serialize, Deserialize, Debug)]
pub struct ConfigYaml {
    pub node_name: Option<String>,
    pub environment: Option<String>,
    pub port: Option<u16>,
    pub screener_endpoint: Option<String>,
    pub display_timezone: Option<String>,
    pub default_download_screener: Option<String>,
    pub http_timeout_secs: Option<u64>,
    pub random_agent: Option<bool>,
    pub screener_catalog_file: Option<String>,
}

// Holds application-wide settings
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub node_name: String,
    pub environment: String,
    pub port: u16,
    pub screener_endpoint: String,
    pub display_timezone: Tz,
    pub default_download_screener: String,
    /// `None` leaves the transport default in place.
    pub http_timeout: Option<Duration>,
    pub random_agent: bool,
    pub screener_catalog_file: Option<String>,
}

pub type SharedConfig = Arc<AppConfig>;

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_name: "screener-proxy".to_string(),
            environment: "development".to_string(),
            port: 8000,
            screener_endpoint: DEFAULT_SCREENER_ENDPOINT.to_string(),
            display_timezone: chrono_tz::Asia::Kolkata,
            default_download_screener: DEFAULT_DOWNLOAD_SCREENER.to_string(),
            http_timeout: None,
            random_agent: true,
            screener_catalog_file: None,
        }
    }
}

impl AppConfig {
    // Load configuration from YAML file or environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Check for CONFIG_FILE environment variable first
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            Self::from_yaml(&config_file)
        } else {
            Self::from_env()
        }
    }

    pub fn from_yaml(file_path: &str) -> Result<Self, ConfigError> {
        let yaml_content = fs::read_to_string(file_path).map_err(|source| ConfigError::Read {
            path: file_path.to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml_content)
    }

    pub fn from_yaml_str(yaml_content: &str) -> Result<Self, ConfigError> {
        let yaml_config: ConfigYaml = serde_yaml::from_str(yaml_content)?;
        let defaults = Self::default();

        let display_timezone = match yaml_config.display_timezone {
            Some(name) => parse_timezone(&name)?,
            None => defaults.display_timezone,
        };

        Ok(Self {
            node_name: yaml_config.node_name.unwrap_or(defaults.node_name),
            environment: yaml_config.environment.unwrap_or(defaults.environment),
            port: yaml_config.port.unwrap_or(defaults.port),
            screener_endpoint: yaml_config
                .screener_endpoint
                .unwrap_or(defaults.screener_endpoint),
            display_timezone,
            default_download_screener: yaml_config
                .default_download_screener
                .unwrap_or(defaults.default_download_screener),
            http_timeout: yaml_config.http_timeout_secs.map(Duration::from_secs),
            random_agent: yaml_config.random_agent.unwrap_or(defaults.random_agent),
            screener_catalog_file: yaml_config.screener_catalog_file,
        })
    }

    // Load all configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = Self::default();

        let node_name = env::var("NODE_NAME").unwrap_or(defaults.node_name);

        let environment = env::var("ENVIRONMENT").unwrap_or(defaults.environment);

        let port = match env::var("PORT") {
            Ok(raw) => parse_var("PORT", &raw)?,
            Err(_) => defaults.port,
        };

        let screener_endpoint =
            env::var("SCREENER_ENDPOINT").unwrap_or(defaults.screener_endpoint);

        let display_timezone = match env::var("DISPLAY_TIMEZONE") {
            Ok(name) => parse_timezone(&name)?,
            Err(_) => defaults.display_timezone,
        };

        let default_download_screener =
            env::var("DEFAULT_DOWNLOAD_SCREENER").unwrap_or(defaults.default_download_screener);

        let http_timeout = match env::var("HTTP_TIMEOUT_SECS") {
            Ok(raw) => Some(Duration::from_secs(parse_var("HTTP_TIMEOUT_SECS", &raw)?)),
            Err(_) => None,
        };

        let random_agent = match env::var("RANDOM_AGENT") {
            Ok(raw) => parse_var("RANDOM_AGENT", &raw)?,
            Err(_) => defaults.random_agent,
        };

        let screener_catalog_file = env::var("SCREENER_CATALOG_FILE")
            .ok()
            .filter(|s| !s.is_empty());

        Ok(Self {
            node_name,
            environment,
            port,
            screener_endpoint,
            display_timezone,
            default_download_screener,
            http_timeout,
            random_agent,
            screener_catalog_file,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: raw.to_string(),
    })
}

pub fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
    name.parse::<Tz>()
        .map_err(|_| ConfigError::InvalidTimezone(name.to_string()))
}
