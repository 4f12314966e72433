use std::path::PathBuf;

/// Command-line overrides. Every flag that is present wins over the config
/// file and the `UNSPLASH_*` environment.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Read this YAML file instead of `config.yaml` in the config directory.
    #[clap(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Unsplash username without the leading @.
    #[clap(long)]
    pub username: Option<String>,

    /// Unsplash API access key.
    #[clap(long = "access-key", value_name = "KEY")]
    pub access_key: Option<String>,

    /// SQLite database path.
    #[clap(long, value_name = "FILE")]
    pub database: Option<PathBuf>,

    /// Where export files are written.
    #[clap(long = "export-dir", value_name = "DIR")]
    pub export_dir: Option<PathBuf>,

    /// Optional cap on the number of photos to fetch.
    #[clap(long = "max-photos")]
    pub max_photos: Option<usize>,

    /// Optional cap on the number of photo list pages to fetch.
    #[clap(long = "max-pages")]
    pub max_pages: Option<usize>,

    /// Additional delay between per-photo statistics calls.
    #[clap(long = "delay-seconds")]
    pub delay_seconds: Option<f64>,

    /// Fraction of the hourly API limit to use. 0 disables the automatic throttle.
    #[clap(long = "rate-limit-fraction")]
    pub rate_limit_fraction: Option<f64>,

    /// Minimum seconds between all API requests.
    #[clap(long = "min-request-interval-seconds")]
    pub min_request_interval_seconds: Option<f64>,

    /// Fail the run as soon as a single photo cannot be collected.
    #[clap(long, action)]
    pub strict: bool,

    /// Address the HTTP surface listens on.
    #[clap(long = "listen-address", value_name = "ADDR")]
    pub listen_address: Option<String>,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Overrides {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(username) = &self.username {
                cache.insert("username".to_string(), username.clone().into());
            }
            if let Some(access_key) = &self.access_key {
                cache.insert("access_key".to_string(), access_key.clone().into());
            }
            if let Some(database) = &self.database {
                cache.insert("database".to_string(), database.display().to_string().into());
            }
            if let Some(export_dir) = &self.export_dir {
                cache.insert("export_dir".to_string(), export_dir.display().to_string().into());
            }
            if let Some(max_photos) = self.max_photos {
                cache.insert("max_photos".to_string(), (max_photos as u64).into());
            }
            if let Some(max_pages) = self.max_pages {
                cache.insert("max_pages".to_string(), (max_pages as u64).into());
            }
            if let Some(delay) = self.delay_seconds {
                cache.insert("delay_seconds".to_string(), delay.into());
            }
            if let Some(fraction) = self.rate_limit_fraction {
                cache.insert("rate_limit_fraction".to_string(), fraction.into());
            }
            if let Some(interval) = self.min_request_interval_seconds {
                cache.insert("min_request_interval_seconds".to_string(), interval.into());
            }
            if self.strict {
                cache.insert("strict".to_string(), true.into());
            }
            if let Some(address) = &self.listen_address {
                cache.insert("listen_address".to_string(), address.clone().into());
            }
            Ok(cache)
        }
    }
}
