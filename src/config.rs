use serde::Deserialize;
use std::sync::LazyLock;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: String,
    pub database_url: Option<String>,
    pub crawler_user_agent: String,
    pub crawl_timeout_secs: u64,
    pub crawl_delay_secs: u64,
    pub max_retries: i16,
    pub retry_delay_secs: u64,
    pub max_concurrent_crawls: usize,
    pub queue_processing_interval_secs: u64,
    pub high_priority_threshold: i16,
    pub normal_priority_threshold: i16,
    pub high_priority_interval_secs: i64,
    pub normal_priority_interval_secs: i64,
    pub low_priority_interval_secs: i64,
    pub diff_size_threshold: usize,
    pub enable_screenshots: bool,
    pub enable_pdf: bool,
    pub enable_visual_diff: bool,
    pub enable_webhooks: bool,
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            database_url: None,
            crawler_user_agent: "archivist/0.1".to_string(),
            crawl_timeout_secs: 30,
            crawl_delay_secs: 0,
            max_retries: 3,
            retry_delay_secs: 5,
            max_concurrent_crawls: 5,
            queue_processing_interval_secs: 60,
            high_priority_threshold: 1,
            normal_priority_threshold: 3,
            high_priority_interval_secs: 3600,
            normal_priority_interval_secs: 6 * 3600,
            low_priority_interval_secs: 24 * 3600,
            diff_size_threshold: 10,
            enable_screenshots: false,
            enable_pdf: false,
            enable_visual_diff: false,
            enable_webhooks: false,
            log_filter: None,
        }
    }
}

impl Config {
    /// Maps a Site's priority tier to the Work Queue's urgency scale (lower is more urgent).
    pub fn queue_priority_for(&self, site_priority: i16) -> i16 {
        if site_priority <= self.high_priority_threshold {
            1
        } else if site_priority <= self.normal_priority_threshold {
            3
        } else {
            5
        }
    }

    /// The interval a Site's priority tier is due to be re-checked after.
    pub fn recheck_interval_for(&self, site_priority: i16) -> time::Duration {
        let secs = if site_priority <= self.high_priority_threshold {
            self.high_priority_interval_secs
        } else if site_priority <= self.normal_priority_threshold {
            self.normal_priority_interval_secs
        } else {
            self.low_priority_interval_secs
        };
        time::Duration::seconds(secs)
    }

    pub fn database_url(&self) -> String {
        self.database_url.clone().unwrap_or_else(crate::db::create_url)
    }
}

/// Loads configuration from `archivist.toml` (if present) layered under environment
/// variables prefixed `ARCHIVIST_` (e.g. `ARCHIVIST_MAX_CONCURRENT_CRAWLS=10`).
pub fn get() -> &'static Config {
    &CONFIG
}

static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    let builder = config::Config::builder()
        .add_source(config::File::with_name("archivist").required(false))
        .add_source(config::Environment::with_prefix("ARCHIVIST").separator("_"));

    match builder.build() {
        Ok(raw) => raw.try_deserialize().unwrap_or_else(|err| {
            eprintln!("Could not parse configuration, falling back to defaults: {err}");
            Config::default()
        }),
        Err(err) => {
            eprintln!("Could not load configuration, falling back to defaults: {err}");
            Config::default()
        }
    }
});
