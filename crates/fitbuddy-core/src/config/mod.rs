use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Root configuration for fitbuddy.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub gateway: WhatsAppConfig,
    pub web: WebConfig,
    pub storage: StorageConfig,
    pub sessions: SessionConfig,
    pub dispatch: DispatchConfig,
}

/// WhatsApp Cloud API credentials and the webhook verify token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WhatsAppConfig {
    pub access_token: String,
    pub phone_number_id: String,
    pub verify_token: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            phone_number_id: String::new(),
            verify_token: "fitbuddy_verify".to_string(),
        }
    }
}

/// Web surface settings: where login links point and how long a web session
/// stays valid after token redemption.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebConfig {
    pub base_url: String,
    pub port: u16,
    pub session_ttl_secs: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            port: 8080,
            session_ttl_secs: 86_400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    /// Path to the SQLite database file. Empty means `<data dir>/fitbuddy.db`.
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Chat sessions idle longer than this are evicted.
    pub idle_ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: 6 * 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchConfig {
    /// Pacing delay between media sends in one batch.
    pub pacing_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { pacing_ms: 400 }
    }
}

impl Config {
    /// Resolved SQLite path, defaulting into the data directory.
    pub fn database_path(&self) -> PathBuf {
        if self.storage.database_path.is_empty() {
            get_data_dir().join("fitbuddy.db")
        } else {
            PathBuf::from(&self.storage.database_path)
        }
    }

    /// Fail early when the gateway cannot possibly send anything.
    pub fn require_gateway(&self) -> std::result::Result<(), ConfigError> {
        if self.gateway.access_token.is_empty() || self.gateway.phone_number_id.is_empty() {
            return Err(ConfigError::NoGatewayCredentials);
        }
        Ok(())
    }
}

/// Get the fitbuddy config file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.json")
}

/// Get the fitbuddy data directory.
pub fn get_data_dir() -> PathBuf {
    let path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".fitbuddy");
    std::fs::create_dir_all(&path).ok();
    path
}

/// Load configuration from file or create default.
pub fn load_config(config_path: Option<&Path>) -> Config {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    let mut config = if path.exists() {
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Config>(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse config from {}: {}", path.display(), e);
                    tracing::warn!("Using default configuration.");
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config from {}: {}", path.display(), e);
                tracing::warn!("Using default configuration.");
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    apply_env_overrides(&mut config);
    config
}

/// Environment variables override the file, so secrets can stay out of it.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(v) = std::env::var("WHATSAPP_ACCESS_TOKEN") {
        config.gateway.access_token = v;
    }
    if let Ok(v) = std::env::var("WHATSAPP_PHONE_NUMBER_ID") {
        config.gateway.phone_number_id = v;
    }
    if let Ok(v) = std::env::var("WHATSAPP_VERIFY_TOKEN") {
        config.gateway.verify_token = v;
    }
    if let Ok(v) = std::env::var("WEB_APP_URL") {
        config.web.base_url = v;
    }
    if let Ok(v) = std::env::var("PORT") {
        if let Ok(port) = v.parse() {
            config.web.port = port;
        }
    }
    if let Ok(v) = std::env::var("FITBUDDY_DB") {
        config.storage.database_path = v;
    }
}

/// Save configuration to file.
pub fn save_config(
    config: &Config,
    config_path: Option<&Path>,
) -> std::result::Result<(), ConfigError> {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    }

    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    Ok(())
}
