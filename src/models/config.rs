use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::models::feeds::{Page, Tier};

const DEFAULT_CONFIG_FILE: &str = "config";
const ENV_PREFIX: &str = "DBA";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub cadences: CadenceConfig,
    pub history: HistoryConfig,
    pub chat: ChatConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Layers an optional config file (explicit path or `config.toml` in the
    /// working directory) under `DBA_*` environment overrides, e.g.
    /// `DBA_API__BASE_URL=http://dba-backend:8000`.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeouts: RequestTimeouts,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            user_agent: concat!("ShaydZ-DBAConsole/", env!("CARGO_PKG_VERSION")).to_string(),
            timeouts: RequestTimeouts::default(),
        }
    }
}

/// Request timeouts in seconds. Hot reads stay below the hot cadence so a
/// hung call never spans two ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestTimeouts {
    pub hot_read: u64,
    pub warm_read: u64,
    pub cold_read: u64,
    pub action: u64,
    pub chat: u64,
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self {
            hot_read: 4,
            warm_read: 15,
            cold_read: 30,
            action: 120,
            chat: 90,
        }
    }
}

/// Cadence intervals in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    pub hot: u64,
    pub warm: u64,
    pub cold: u64,
    pub analysis: u64,
}

impl CadenceConfig {
    /// `None` for tiers that run once on mount.
    pub fn interval(&self, tier: Tier) -> Option<Duration> {
        let secs = match tier {
            Tier::Hot => self.hot,
            Tier::Warm => self.warm,
            Tier::Cold => self.cold,
            Tier::Analysis => self.analysis,
            Tier::Once => return None,
        };
        Some(Duration::from_secs(secs.max(1)))
    }
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            hot: 5,
            warm: 30,
            cold: 300,
            analysis: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub metrics_count: u32,
    pub recommendation_limit: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            metrics_count: 10,
            recommendation_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub session_id: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            session_id: "default_session".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub start_page: Page,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5001".to_string(),
            start_page: Page::Overview,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: "logs".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard_cadences() {
        let config = AppConfig::default();
        assert_eq!(config.cadences.interval(Tier::Hot), Some(Duration::from_secs(5)));
        assert_eq!(config.cadences.interval(Tier::Warm), Some(Duration::from_secs(30)));
        assert_eq!(config.cadences.interval(Tier::Cold), Some(Duration::from_secs(300)));
        assert_eq!(config.cadences.interval(Tier::Once), None);
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.chat.session_id, "default_session");
    }

    #[test]
    fn zero_interval_is_clamped() {
        let cadences = CadenceConfig {
            hot: 0,
            ..CadenceConfig::default()
        };
        assert_eq!(cadences.interval(Tier::Hot), Some(Duration::from_secs(1)));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(
                "[api]\nbase_url = \"http://backend:9000\"\n[cadences]\nhot = 2\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.api.base_url, "http://backend:9000");
        assert_eq!(config.api.timeouts.hot_read, 4);
        assert_eq!(config.cadences.hot, 2);
        assert_eq!(config.cadences.warm, 30);
    }
}
