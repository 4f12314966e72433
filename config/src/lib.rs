#[macro_use]
extern crate tracing;

mod app_config;
mod args;

pub use app_config::{
    get_config_dir,
    get_data_dir,
    AppConfig,
};
pub use args::Overrides;
use eyre::{
    eyre,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    net::SocketAddr,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};
use url::Url;

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");
const DATABASE_FILE: &str = "unsplash_stats.sqlite";

/// Settings shared by the CLI, the collector and the HTTP surface.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten, skip_serializing)]
    pub app_config: AppConfig,
    pub username: String,
    #[serde(default, skip_serializing)]
    pub access_key: Option<String>,
    pub api_base_url: Url,
    pub user_agent: String,
    pub request_timeout_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    pub export_dir: PathBuf,
    pub listen_address: SocketAddr,
    pub delay_seconds: f64,
    pub rate_limit_fraction: f64,
    pub min_request_interval_seconds: f64,
    pub rate_limit_retry_max_sleep_seconds: f64,
    #[serde(default)]
    pub strict: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_photos: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        let mut config: Self = serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config");
        config.app_config = AppConfig {
            data_dir: get_data_dir(),
            config_dir: get_config_dir(),
        };
        config
    }
}

impl Config {
    /// Layers the built-in defaults, the config file, the `UNSPLASH_*`
    /// environment and finally the command-line overrides.
    pub fn new(overrides: &Overrides) -> Result<Self, config::ConfigError> {
        let data_dir = get_data_dir();
        let config_dir = get_config_dir();
        let mut builder = config::Config::builder()
            .set_default("data_dir", data_dir.display().to_string())?
            .set_default("config_dir", config_dir.display().to_string())?
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml));

        let config_file = overrides
            .config
            .clone()
            .unwrap_or_else(|| config_dir.join("config.yaml"));
        debug!(?config_file, "reading configuration");
        builder = builder.add_source(
            config::File::from(config_file)
                .format(config::FileFormat::Yaml)
                .required(overrides.config.is_some()),
        );

        builder = builder
            .add_source(config::Environment::with_prefix("UNSPLASH").try_parsing(true))
            .add_source(overrides.clone());

        builder.build()?.try_deserialize()
    }

    pub fn data_dir(&self) -> &Path {
        &self.app_config.data_dir
    }

    pub fn config_dir(&self) -> &Path {
        &self.app_config.config_dir
    }

    /// The configured database, or `unsplash_stats.sqlite` in the data directory.
    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| self.app_config.data_dir.join(DATABASE_FILE))
    }

    /// The access key, treating an empty value as unset.
    pub fn access_key(&self) -> Option<&str> {
        self.access_key.as_deref().map(str::trim).filter(|key| !key.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay_seconds).unwrap_or_default()
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.min_request_interval_seconds).unwrap_or_default()
    }

    pub fn rate_limit_retry_max_sleep(&self) -> Duration {
        Duration::try_from_secs_f64(self.rate_limit_retry_max_sleep_seconds).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(eyre!("username must not be empty"));
        }
        if !self.rate_limit_fraction.is_finite() || self.rate_limit_fraction < 0.0 {
            return Err(eyre!("rate_limit_fraction must be >= 0"));
        }
        if self.rate_limit_fraction > 1.0 {
            return Err(eyre!("rate_limit_fraction must be <= 1"));
        }
        if !self.min_request_interval_seconds.is_finite() || self.min_request_interval_seconds < 0.0 {
            return Err(eyre!("min_request_interval_seconds must be >= 0"));
        }
        if !self.delay_seconds.is_finite() || self.delay_seconds < 0.0 {
            return Err(eyre!("delay_seconds must be >= 0"));
        }
        Ok(())
    }
}
