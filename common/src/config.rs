// Configuration management with layered configuration (file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::evaluator::DEFAULT_LOOKAHEAD_MINUTES;
use crate::upstream::DEFAULT_URL;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub upstream: UpstreamConfig,
    pub detection: DetectionConfig,
    pub notifications: NotificationConfig,
    pub trigger: TriggerConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub url: String,
    pub timeout_seconds: u64,
    /// Lower bound of the pause between consecutive account requests
    pub min_delay_ms: u64,
    /// Upper bound of the pause between consecutive account requests
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub lookahead_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushTransportKind {
    Log,
    Fcm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub transport: PushTransportKind,
    pub title: String,
    pub body: String,
    pub fcm: Option<FcmConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcmConfig {
    pub project_id: String,
    /// Path to a Google service account key file
    #[serde(default)]
    pub service_account_path: Option<String>,
    /// Inline service account key JSON, takes precedence over the path
    #[serde(default)]
    pub service_account_json: Option<String>,
    #[serde(default = "default_fcm_timeout")]
    pub timeout_seconds: u64,
}

fn default_fcm_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub api_base_url: String,
    pub interval_seconds: u64,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub tracing_endpoint: Option<String>,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let defaults = Config::try_from(&Settings::default())?;

        let builder = Config::builder()
            // Start with built-in defaults
            .add_source(defaults)
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        if self.storage.backend == StorageBackend::Postgres {
            if self.database.url.is_empty() {
                return Err("Database URL cannot be empty".to_string());
            }
            if self.database.max_connections == 0 {
                return Err("Database max_connections must be greater than 0".to_string());
            }
        }

        if self.upstream.url.is_empty() {
            return Err("Upstream URL cannot be empty".to_string());
        }
        if self.upstream.timeout_seconds == 0 {
            return Err("Upstream timeout_seconds must be greater than 0".to_string());
        }
        if self.upstream.min_delay_ms > self.upstream.max_delay_ms {
            return Err("Upstream min_delay_ms cannot exceed max_delay_ms".to_string());
        }

        if self.detection.lookahead_minutes < 0 {
            return Err("Detection lookahead_minutes cannot be negative".to_string());
        }

        if self.notifications.transport == PushTransportKind::Fcm {
            let Some(fcm) = &self.notifications.fcm else {
                return Err("FCM configuration required when transport is 'fcm'".to_string());
            };
            if fcm.project_id.is_empty() {
                return Err("FCM project_id cannot be empty".to_string());
            }
            if fcm.service_account_json.is_none() && fcm.service_account_path.is_none() {
                return Err(
                    "FCM requires service_account_json or service_account_path".to_string(),
                );
            }
        }

        if self.trigger.interval_seconds == 0 {
            return Err("Trigger interval_seconds must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            storage: StorageConfig {
                backend: StorageBackend::Postgres,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/outage_watch".to_string(),
                max_connections: 10,
                min_connections: 1,
                connect_timeout_seconds: 30,
            },
            upstream: UpstreamConfig {
                url: DEFAULT_URL.to_string(),
                timeout_seconds: 10,
                min_delay_ms: 1000,
                max_delay_ms: 2000,
            },
            detection: DetectionConfig {
                lookahead_minutes: DEFAULT_LOOKAHEAD_MINUTES,
            },
            notifications: NotificationConfig {
                transport: PushTransportKind::Log,
                title: "Schedule changed!".to_string(),
                body: "Schedule for your watched queue has changed! Make sure to check the updated schedule! ".to_string(),
                fcm: None,
            },
            trigger: TriggerConfig {
                api_base_url: "http://localhost:8080".to_string(),
                interval_seconds: 300,
                timeout_seconds: 600,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                tracing_endpoint: None,
            },
        }
    }
}
