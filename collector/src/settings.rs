use std::{
    path::PathBuf,
    time::Duration,
};
use unsplash_stats_client::{
    ClientConfig,
    MAX_PER_PAGE,
};
use unsplash_stats_config::Config;
use url::Url;

/// Everything one collection run needs, resolved from [`Config`].
#[derive(Clone)]
pub struct CollectSettings {
    pub username: String,
    pub access_key: Option<String>,
    pub database: PathBuf,
    /// Where the worker writes exports after a successful run.
    pub export_dir: Option<PathBuf>,
    pub api_base_url: Url,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub min_request_interval: Duration,
    pub rate_limit_retry_max_sleep: Duration,
    /// Pause after every per-photo statistics call.
    pub delay: Duration,
    pub rate_limit_fraction: f64,
    pub strict: bool,
    pub per_page: usize,
    pub max_photos: Option<usize>,
    pub max_pages: Option<usize>,
}

impl std::fmt::Debug for CollectSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectSettings")
            .field("username", &self.username)
            .field("access_key", &self.access_key.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("export_dir", &self.export_dir)
            .field("api_base_url", &self.api_base_url.as_str())
            .field("min_request_interval", &self.min_request_interval)
            .field("delay", &self.delay)
            .field("rate_limit_fraction", &self.rate_limit_fraction)
            .field("strict", &self.strict)
            .field("max_photos", &self.max_photos)
            .field("max_pages", &self.max_pages)
            .finish_non_exhaustive()
    }
}

impl From<&Config> for CollectSettings {
    fn from(config: &Config) -> Self {
        Self {
            username: config.username.trim().to_string(),
            access_key: config.access_key().map(str::to_string),
            database: config.database_path(),
            export_dir: Some(config.export_dir.clone()),
            api_base_url: config.api_base_url.clone(),
            user_agent: config.user_agent.clone(),
            request_timeout: config.request_timeout(),
            min_request_interval: config.min_request_interval(),
            rate_limit_retry_max_sleep: config.rate_limit_retry_max_sleep(),
            delay: config.delay(),
            rate_limit_fraction: config.rate_limit_fraction,
            strict: config.strict,
            per_page: MAX_PER_PAGE,
            max_photos: config.max_photos,
            max_pages: config.max_pages,
        }
    }
}

impl CollectSettings {
    pub(crate) fn client_config(&self, access_key: &str) -> ClientConfig {
        ClientConfig {
            access_key: access_key.to_string(),
            base_url: self.api_base_url.clone(),
            user_agent: self.user_agent.clone(),
            timeout: self.request_timeout,
            min_request_interval: self.min_request_interval,
            rate_limit_retry_max_sleep: self.rate_limit_retry_max_sleep,
        }
    }
}
