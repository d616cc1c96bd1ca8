//! Environment-aware application configuration.

use std::env;

use newsroom_ingest::feed_config::FeedPollerConfig;
use newsroom_services::{ClusteringConfig, FeedQueryConfig, StatusConfig, SummarizerConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(String),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("configuration invalid for production: {0}")]
    ProductionRequired(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        match env::var("APP_ENVIRONMENT").unwrap_or_default().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" => Environment::Staging,
            _ => Environment::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub admin_token: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080, admin_token: "dev-admin-token".to_string() }
    }
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub redis_url: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { redis_url: "redis://localhost:6379".to_string() }
    }
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Every §9 "expose as config" tunable lives here as data, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub store: StoreSettings,
    pub llm: LlmSettings,
    pub feed_poller: FeedPollerConfig,
    pub clustering: ClusteringConfig,
    pub clustering_cycle_period_secs: u64,
    pub status: StatusConfig,
    pub summarizer: SummarizerConfig,
    pub feed_query: FeedQueryConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = Environment::from_env();

        let server = ServerConfig {
            host: env_or_default("SERVER_HOST", "0.0.0.0"),
            port: env_or_default("SERVER_PORT", "8080").parse().map_err(|_| ConfigError::InvalidValue {
                key: "SERVER_PORT".to_string(),
                message: "must be a u16".to_string(),
            })?,
            admin_token: env_or_default("ADMIN_TOKEN", "dev-admin-token"),
        };

        let store = StoreSettings { redis_url: env_or_default("REDIS_URL", "redis://localhost:6379") };

        let llm = LlmSettings {
            api_base: env_or_default("LLM_API_BASE", "https://api.openai.com/v1"),
            api_key: env::var("LLM_API_KEY").unwrap_or_default(),
            model: env_or_default("LLM_MODEL", "gpt-4o-mini"),
        };

        let mut clustering = ClusteringConfig::default();
        if let Ok(v) = env::var("CLUSTERING_ATTACH_THRESHOLD") {
            clustering.attach_threshold = v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "CLUSTERING_ATTACH_THRESHOLD".to_string(),
                message: "must be a float".to_string(),
            })?;
        }
        let clustering_cycle_period_secs: u64 =
            env_or_default("CLUSTERING_CYCLE_PERIOD_SECS", "5").parse().map_err(|_| ConfigError::InvalidValue {
                key: "CLUSTERING_CYCLE_PERIOD_SECS".to_string(),
                message: "must be a u64".to_string(),
            })?;

        let mut status = StatusConfig::default();
        if let Ok(v) = env::var("STORY_BREAKING_WINDOW_SECS") {
            let secs: i64 = v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "STORY_BREAKING_WINDOW_SECS".to_string(),
                message: "must be an integer".to_string(),
            })?;
            status.breaking_window = chrono::Duration::seconds(secs);
        }

        let mut summarizer = SummarizerConfig::default();
        if let Ok(v) = env::var("SUMMARY_BACKFILL_WINDOW_SECS") {
            let secs: i64 = v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "SUMMARY_BACKFILL_WINDOW_SECS".to_string(),
                message: "must be an integer".to_string(),
            })?;
            summarizer.backfill_window = chrono::Duration::seconds(secs);
        }
        if let Ok(v) = env::var("SUMMARIZER_COST_CEILING_PER_HOUR") {
            summarizer.cost_ceiling_per_hour = v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "SUMMARIZER_COST_CEILING_PER_HOUR".to_string(),
                message: "must be a float".to_string(),
            })?;
        }
        summarizer.model = llm.model.clone();

        let config = Self {
            environment,
            server,
            store,
            llm,
            feed_poller: FeedPollerConfig::default(),
            clustering,
            clustering_cycle_period_secs,
            status,
            summarizer,
            feed_query: FeedQueryConfig::default(),
        };

        if config.environment.is_production() {
            config.validate_production()?;
        }

        Ok(config)
    }

    /// Production must not run against localhost or with an empty LLM key —
    /// the analog of the teacher's "no default JWT secret" check.
    pub fn validate_production(&self) -> Result<(), ConfigError> {
        if self.store.redis_url.contains("localhost") || self.store.redis_url.contains("127.0.0.1") {
            return Err(ConfigError::ProductionRequired("REDIS_URL must not point at localhost".to_string()));
        }
        if self.llm.api_key.is_empty() {
            return Err(ConfigError::ProductionRequired("LLM_API_KEY must be set".to_string()));
        }
        if self.server.admin_token == "dev-admin-token" {
            return Err(ConfigError::ProductionRequired(
                "ADMIN_TOKEN must not use the development default".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_detection() {
        assert!(Environment::Development.is_development());
        assert!(Environment::Production.is_production());
    }

    #[test]
    fn test_default_admin_token_fails_production_validation() {
        let config = AppConfig {
            environment: Environment::Production,
            server: ServerConfig::default(),
            store: StoreSettings { redis_url: "redis://prod-store:6379".to_string() },
            llm: LlmSettings { api_key: "sk-live-test".to_string(), ..Default::default() },
            feed_poller: FeedPollerConfig::default(),
            clustering: ClusteringConfig::default(),
            clustering_cycle_period_secs: 5,
            status: StatusConfig::default(),
            summarizer: SummarizerConfig::default(),
            feed_query: FeedQueryConfig::default(),
        };
        assert!(config.validate_production().is_err());
    }

    #[test]
    fn test_localhost_redis_fails_production_validation() {
        let config = AppConfig {
            environment: Environment::Production,
            server: ServerConfig { admin_token: "a-real-secret".to_string(), ..Default::default() },
            store: StoreSettings::default(),
            llm: LlmSettings { api_key: "sk-live-test".to_string(), ..Default::default() },
            feed_poller: FeedPollerConfig::default(),
            clustering: ClusteringConfig::default(),
            clustering_cycle_period_secs: 5,
            status: StatusConfig::default(),
            summarizer: SummarizerConfig::default(),
            feed_query: FeedQueryConfig::default(),
        };
        assert!(config.validate_production().is_err());
    }

    #[test]
    fn test_empty_llm_key_fails_production_validation() {
        let config = AppConfig {
            environment: Environment::Production,
            server: ServerConfig { admin_token: "a-real-secret".to_string(), ..Default::default() },
            store: StoreSettings { redis_url: "redis://prod-store:6379".to_string() },
            llm: LlmSettings::default(),
            feed_poller: FeedPollerConfig::default(),
            clustering: ClusteringConfig::default(),
            clustering_cycle_period_secs: 5,
            status: StatusConfig::default(),
            summarizer: SummarizerConfig::default(),
            feed_query: FeedQueryConfig::default(),
        };
        assert!(config.validate_production().is_err());
    }
}
