// Runtime settings: optional TOML file layered with FUNDING_BOARD__* env vars.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::market_data::adapters::okx::default_instruments;
use crate::market_data::normaliser::THOUSAND_UNIT_ASSETS;

pub const DEFAULT_CONFIG_PATH: &str = "funding-board.toml";
const ENV_PREFIX: &str = "FUNDING_BOARD";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_filter: String,
    pub http: HttpSettings,
    pub refresh: RefreshSettings,
    pub sources: SourcesSettings,
    pub normaliser: NormaliserSettings,
    pub metrics: MetricsSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    pub interval_secs: u64,
    pub auto_refresh: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourcesSettings {
    pub lighter: LighterSettings,
    pub okx: OkxSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LighterSettings {
    pub enabled: bool,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OkxSettings {
    pub enabled: bool,
    pub base_url: String,
    pub instruments: Vec<String>,
    pub concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormaliserSettings {
    pub thousand_unit_assets: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub listen: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: "info".into(),
            http: HttpSettings::default(),
            refresh: RefreshSettings::default(),
            sources: SourcesSettings::default(),
            normaliser: NormaliserSettings::default(),
            metrics: MetricsSettings::default(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self { interval_secs: 5 * 60, auto_refresh: true }
    }
}

impl Default for LighterSettings {
    fn default() -> Self {
        Self { enabled: true, base_url: "https://mainnet.zklighter.elliot.ai".into() }
    }
}

impl Default for OkxSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://www.okx.com".into(),
            instruments: default_instruments(),
            concurrency: 8,
        }
    }
}

impl Default for NormaliserSettings {
    fn default() -> Self {
        Self { thousand_unit_assets: THOUSAND_UNIT_ASSETS.iter().map(|s| s.to_string()).collect() }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self { listen: "0.0.0.0:9000".into() }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl RefreshSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Settings {
    /// Load `path` (missing file is fine) and overlay the environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(env_source())
            .build()?;
        Self::finish(cfg)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let cfg = Config::builder().add_source(File::from_str(toml, FileFormat::Toml)).build()?;
        Self::finish(cfg)
    }

    fn finish(cfg: Config) -> Result<Self, ConfigError> {
        let settings: Settings = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh.interval_secs == 0 {
            return Err(ConfigError::Message("refresh.interval_secs must be positive".into()));
        }
        if self.http.timeout_ms == 0 {
            return Err(ConfigError::Message("http.timeout_ms must be positive".into()));
        }
        if self.sources.okx.concurrency == 0 {
            return Err(ConfigError::Message("sources.okx.concurrency must be positive".into()));
        }
        Ok(())
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("sources.okx.instruments")
        .with_list_parse_key("normaliser.thousand_unit_assets")
}
