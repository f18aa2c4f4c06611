use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// CORS allowed origins, comma separated
    pub cors_origins: Option<String>,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// HS256 secret used to validate auth tokens
    pub auth_jwt_secret: Option<String>,

    /// Database URL; the in-memory store is used when absent
    pub db_url: Option<String>,

    /// Buffered activity entries per report before a flush is triggered
    #[serde(default = "default_log_flush_threshold")]
    pub log_flush_threshold: usize,

    #[serde(default = "default_log_flush_interval_secs")]
    pub log_flush_interval_secs: u64,

    /// Upper bound on a single websocket write during fan-out
    #[serde(default = "default_ws_write_timeout_ms")]
    pub ws_write_timeout_ms: u64,

    #[serde(default = "default_membership_cache_ttl_secs")]
    pub membership_cache_ttl_secs: u64,

    /// Report members granted at startup when running without a database,
    /// as `uid:report_id[:admin]`, comma separated
    pub members: Option<String>,
}

/// One entry of the `MEMBERS` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberGrant {
    pub uid: String,
    pub report_id: String,
    pub admin: bool,
}

impl MemberGrant {
    fn parse(entry: &str) -> Result<Self, ConfigError> {
        let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
        let admin = match parts.get(2) {
            None => false,
            Some(&"admin") => true,
            Some(_) => return Err(ConfigError::Invalid(format!("MEMBERS entry '{}' has an unknown role", entry))),
        };
        match parts.as_slice() {
            [uid, report_id, ..] if parts.len() <= 3 && !uid.is_empty() && !report_id.is_empty() => Ok(Self {
                uid: uid.to_string(),
                report_id: report_id.to_string(),
                admin,
            }),
            _ => Err(ConfigError::Invalid(format!(
                "MEMBERS entry '{}' must look like uid:report_id[:admin]",
                entry
            ))),
        }
    }
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        match envy::from_env::<Config>() {
            Ok(config) => {
                info!("✅ Configuration loaded successfully");
                config.validate()?;
                Ok(config)
            }
            Err(e) => {
                error!("❌ Failed to load configuration: {}", e);
                Err(ConfigError::EnvError(e))
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.log_flush_threshold == 0 {
            return Err(ConfigError::Invalid("LOG_FLUSH_THRESHOLD must be at least 1".to_string()));
        }
        if self.log_flush_interval_secs == 0 {
            return Err(ConfigError::Invalid("LOG_FLUSH_INTERVAL_SECS must be at least 1".to_string()));
        }
        if self.ws_write_timeout_ms == 0 {
            return Err(ConfigError::Invalid("WS_WRITE_TIMEOUT_MS must be at least 1".to_string()));
        }
        self.member_grants()?;
        Ok(())
    }

    /// Parsed `MEMBERS` list; empty when none are configured
    pub fn member_grants(&self) -> Result<Vec<MemberGrant>, ConfigError> {
        self.members
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(MemberGrant::parse)
            .collect()
    }

    /// Tracing filter used when `RUST_LOG` is not set
    pub fn log_filter(&self) -> String {
        format!(
            "report_sync={0},tower_http={0},axum::rejection=trace,info",
            self.log_level
        )
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn log_flush_interval(&self) -> Duration {
        Duration::from_secs(self.log_flush_interval_secs)
    }

    pub fn ws_write_timeout(&self) -> Duration {
        Duration::from_millis(self.ws_write_timeout_ms)
    }

    pub fn membership_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.membership_cache_ttl_secs)
    }

    /// Parsed, trimmed CORS origins; empty when none are configured
    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            cors_origins: None,
            auth_jwt_secret: None,
            db_url: None,
            log_flush_threshold: default_log_flush_threshold(),
            log_flush_interval_secs: default_log_flush_interval_secs(),
            ws_write_timeout_ms: default_ws_write_timeout_ms(),
            membership_cache_ttl_secs: default_membership_cache_ttl_secs(),
            members: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvError(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "debug".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_log_flush_threshold() -> usize {
    10
}

fn default_log_flush_interval_secs() -> u64 {
    30
}

fn default_ws_write_timeout_ms() -> u64 {
    5000
}

fn default_membership_cache_ttl_secs() -> u64 {
    60
}
