use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.ajum.de/index.php";
pub const DEFAULT_FROM: &str = "maschinenraum@fundevogel.de";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; WOW64; rv:45.0) Gecko/20100101 Firefox/45.0";

/// Main configuration structure for ajum-index
///
/// Every section and every key is optional; missing values fall back to
/// the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client: ClientConfig,
    pub paths: PathsConfig,
    pub workers: WorkersConfig,

    /// Listing link IDs known to be wrong, mapped to the right review ID
    pub redirects: BTreeMap<String, String>,
}

/// Remote site access
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Minimum delay between two requests (seconds)
    pub timer: f64,

    /// Contact address sent in the `From` header
    pub from: String,

    #[serde(rename = "user-agent")]
    pub user_agent: String,

    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Request timeout (seconds)
    pub timeout: u64,

    /// Attempts per page, including the first one
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Delay before the first retry; doubles for each further one
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timer: 3.0,
            from: DEFAULT_FROM.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: 30,
            max_retries: 3,
            retry_delay_ms: 5000,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Local files
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    #[serde(rename = "cache-dir")]
    pub cache_dir: PathBuf,

    #[serde(rename = "index-file")]
    pub index_file: PathBuf,

    #[serde(rename = "db-file")]
    pub db_file: PathBuf,

    #[serde(rename = "backup-dir")]
    pub backup_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".db"),
            index_file: PathBuf::from("index.json"),
            db_file: PathBuf::from("database.json"),
            backup_dir: PathBuf::from("backups"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    /// Number of concurrent workers
    pub jobs: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self { jobs: 1 }
    }
}

/// Values given on the command line, applied on top of the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub timer: Option<f64>,
    pub from: Option<String>,
    pub user_agent: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub index_file: Option<PathBuf>,
    pub db_file: Option<PathBuf>,
    pub jobs: Option<usize>,
}

impl Config {
    /// Replaces every value that was given on the command line
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(timer) = overrides.timer {
            self.client.timer = timer;
        }
        if let Some(from) = overrides.from {
            self.client.from = from;
        }
        if let Some(user_agent) = overrides.user_agent {
            self.client.user_agent = user_agent;
        }
        if let Some(dir) = overrides.cache_dir {
            self.paths.cache_dir = dir;
        }
        if let Some(file) = overrides.index_file {
            self.paths.index_file = file;
        }
        if let Some(file) = overrides.db_file {
            self.paths.db_file = file;
        }
        if let Some(jobs) = overrides.jobs {
            self.workers.jobs = jobs;
        }
    }
}
