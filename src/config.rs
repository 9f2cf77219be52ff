// Configuration module for cinefetch
// Handles XDG-compliant directory paths and TOML configuration file

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::memory::DEFAULT_MAX_MEMORY_ENTRIES;
use crate::cache::{CacheCategory, TtlPolicy};
use crate::services::http::DEFAULT_MAX_IMAGE_BYTES;
use crate::services::metadata::AggregatorOptions;
use crate::services::retry::RetryPolicy;

const APP_NAME: &str = "cinefetch";
const CONFIG_FILENAME: &str = "config.toml";
const ENV_PREFIX: &str = "CINEFETCH_";

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Server configuration
    pub server: ServerConfig,

    /// Directory paths (overrides XDG defaults)
    pub paths: PathsConfig,

    /// Provider credentials, endpoints and priority order
    pub providers: ProvidersConfig,

    /// Cache sizing, sweeping and TTL overrides
    pub cache: CacheConfig,

    /// Upstream HTTP behaviour
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server port (default: 8787)
    pub port: u16,

    /// Bind address (default: 0.0.0.0)
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8787,
            bind_address: "0.0.0.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Override data directory (database location)
    pub data_dir: Option<PathBuf>,

    /// Override config directory
    pub config_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub tmdb_api_key: Option<String>,
    pub omdb_api_key: Option<String>,
    pub fanart_api_key: Option<String>,

    /// Base URL overrides, for mirrors and tests
    pub tmdb_base_url: Option<String>,
    pub omdb_base_url: Option<String>,
    pub fanart_base_url: Option<String>,
    pub imdb_base_url: Option<String>,

    /// Metadata providers, highest priority first
    pub metadata_priority: Vec<String>,

    /// Artwork tiers, highest priority first
    pub image_priority: Vec<String>,

    /// Fill short search results from lower-priority providers (default: true)
    pub merge_search: bool,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            omdb_api_key: None,
            fanart_api_key: None,
            tmdb_base_url: None,
            omdb_base_url: None,
            fanart_base_url: None,
            imdb_base_url: None,
            metadata_priority: vec!["tmdb".to_string(), "omdb".to_string(), "imdb".to_string()],
            image_priority: vec![
                "fanart".to_string(),
                "imdb".to_string(),
                "url-cleanup".to_string(),
            ],
            merge_search: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries kept in the memory tier (default: 10000)
    pub max_memory_entries: usize,

    /// Seconds between expiry sweeps (default: 300, 0 to disable)
    pub sweep_interval_secs: u64,

    /// Keep a durable SQLite tier (default: true)
    pub durable: bool,

    /// Per-category TTL overrides in seconds
    pub ttl: TtlOverrides,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_entries: DEFAULT_MAX_MEMORY_ENTRIES,
            sweep_interval_secs: 300,
            durable: true,
            ttl: TtlOverrides::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TtlOverrides {
    pub suggestions: Option<u64>,
    pub popular: Option<u64>,
    pub trending: Option<u64>,
    pub genre: Option<u64>,
    pub search: Option<u64>,
    pub movie_detail: Option<u64>,
    pub image: Option<u64>,
}

impl TtlOverrides {
    fn get(&self, category: CacheCategory) -> Option<u64> {
        match category {
            CacheCategory::Suggestions => self.suggestions,
            CacheCategory::Popular => self.popular,
            CacheCategory::Trending => self.trending,
            CacheCategory::Genre => self.genre,
            CacheCategory::Search => self.search,
            CacheCategory::MovieDetail => self.movie_detail,
            CacheCategory::Image => self.image,
        }
    }

    /// Defaults, then file overrides, then `CINEFETCH_TTL_<CATEGORY>` seconds
    pub fn policy(&self, env: impl Fn(&str) -> Option<String>) -> TtlPolicy {
        let mut policy = TtlPolicy::default();
        for category in CacheCategory::ALL {
            let var = format!("{}TTL_{}", ENV_PREFIX, category.as_str().to_uppercase());
            let from_env = env(&var).and_then(|v| match v.trim().parse::<u64>() {
                Ok(secs) => Some(secs),
                Err(_) => {
                    tracing::warn!("Ignoring {}={:?}: not a number of seconds", var, v);
                    None
                }
            });

            if let Some(secs) = from_env.or(self.get(category)) {
                policy = policy.with_override(category, Duration::from_secs(secs));
            }
        }
        policy
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-call timeout in seconds (default: 10)
    pub timeout_secs: u64,

    /// Attempts per call including the first (default: 3)
    pub max_attempts: u32,

    /// First retry delay in milliseconds (default: 500)
    pub base_delay_ms: u64,

    /// Backoff multiplier (default: 2.0)
    pub multiplier: f64,

    /// Longest retry delay in milliseconds (default: 8000)
    pub max_delay_ms: u64,

    /// Deadline for a whole provider fallback walk in seconds (default: 20)
    pub request_timeout_secs: u64,

    /// Largest image body accepted from an artwork URL (default: 10 MiB)
    pub max_image_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_attempts: 3,
            base_delay_ms: 500,
            multiplier: 2.0,
            max_delay_ms: 8000,
            request_timeout_secs: 20,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            multiplier: self.multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Application paths following XDG Base Directory Specification on Unix
/// On other platforms, falls back to the current directory or platform-specific locations
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for configuration files (config.toml)
    pub config_dir: PathBuf,

    /// Directory for persistent data (the cache database)
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Priority order:
    /// 1. Environment variables (CINEFETCH_CONFIG_DIR, CINEFETCH_DATA_DIR)
    /// 2. Config file overrides
    /// 3. XDG / platform directories
    /// 4. Current directory fallback
    pub fn new(config_overrides: &PathsConfig) -> Self {
        Self {
            config_dir: Self::resolve("CONFIG_DIR", &config_overrides.config_dir, dirs::config_dir()),
            data_dir: Self::resolve("DATA_DIR", &config_overrides.data_dir, dirs::data_dir()),
        }
    }

    /// Everything under the current directory (portable mode)
    pub fn current_dir() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            config_dir: cwd.clone(),
            data_dir: cwd,
        }
    }

    fn resolve(
        env_suffix: &str,
        config_override: &Option<PathBuf>,
        platform_dir: Option<PathBuf>,
    ) -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}{}", ENV_PREFIX, env_suffix)) {
            return PathBuf::from(path);
        }
        if let Some(ref path) = config_override {
            return path.clone();
        }
        if let Some(dir) = platform_dir {
            return dir.join(APP_NAME);
        }
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("cinefetch.db")
    }

    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.database_path().display())
    }

    pub fn config_file_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILENAME)
    }

    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.config_dir).await?;
        tokio::fs::create_dir_all(&self.data_dir).await?;
        Ok(())
    }

    pub fn log_paths(&self) {
        tracing::info!("Configuration directory: {}", self.config_dir.display());
        tracing::info!("Data directory: {}", self.data_dir.display());
        tracing::debug!("Database path: {}", self.database_path().display());
    }
}

/// Application configuration - combines TOML file with environment overrides
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub paths: AppPaths,
    pub port: u16,
    pub bind_address: String,
    /// Providers with env credentials already applied
    pub providers: ProvidersConfig,
    pub ttl: TtlPolicy,
    pub max_memory_entries: usize,
    /// `None` disables the background sweep
    pub sweep_interval: Option<Duration>,
    pub durable_cache: bool,
    pub http: HttpConfig,
}

impl AppConfig {
    /// Load configuration from TOML file and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. TOML config file
    /// 3. Default values
    pub fn load() -> Self {
        let portable_mode = env_var("PORTABLE")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        if portable_mode {
            tracing::info!("Running in portable mode (using current directory)");
            let config_file = Self::load_config_file(&AppPaths::current_dir().config_file_path());
            let mut config = Self::build(config_file);
            config.paths = AppPaths::current_dir();
            return config;
        }

        let config_dir = Self::find_config_dir();
        let config_file = Self::load_config_file(&config_dir.join(CONFIG_FILENAME));
        Self::build(config_file)
    }

    fn find_config_dir() -> PathBuf {
        if let Some(path) = env_var("CONFIG_DIR") {
            return PathBuf::from(path);
        }
        if let Some(dir) = dirs::config_dir() {
            return dir.join(APP_NAME);
        }
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    fn load_config_file(config_path: &std::path::Path) -> ConfigFile {
        if !config_path.exists() {
            tracing::debug!(
                "No config file found at {}, using defaults",
                config_path.display()
            );
            return ConfigFile::default();
        }

        match std::fs::read_to_string(config_path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse config file {}: {}. Using defaults.",
                        config_path.display(),
                        e
                    );
                    ConfigFile::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read config file {}: {}. Using defaults.",
                    config_path.display(),
                    e
                );
                ConfigFile::default()
            }
        }
    }

    /// Build configuration from config file with environment overrides
    fn build(config_file: ConfigFile) -> Self {
        Self::build_with(config_file, |name| std::env::var(name).ok())
    }

    fn build_with(config_file: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let paths = AppPaths::new(&config_file.paths);
        let prefixed = |suffix: &str| env(&format!("{}{}", ENV_PREFIX, suffix));

        // Port: env > config > default
        let port = prefixed("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(config_file.server.port);

        // Bind address: env > config > default
        let bind_address =
            prefixed("BIND_ADDRESS").unwrap_or_else(|| config_file.server.bind_address.clone());

        // API keys: env > config
        let mut providers = config_file.providers;
        providers.tmdb_api_key = env("TMDB_API_KEY").or(providers.tmdb_api_key);
        providers.omdb_api_key = env("OMDB_API_KEY").or(providers.omdb_api_key);
        providers.fanart_api_key = env("FANART_API_KEY").or(providers.fanart_api_key);

        let ttl = config_file.cache.ttl.policy(&env);

        let sweep_interval = match config_file.cache.sweep_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            paths,
            port,
            bind_address,
            providers,
            ttl,
            max_memory_entries: config_file.cache.max_memory_entries.max(1),
            sweep_interval,
            durable_cache: config_file.cache.durable,
            http: config_file.http,
        }
    }

    pub fn aggregator_options(&self) -> AggregatorOptions {
        AggregatorOptions {
            request_timeout: self.http.request_timeout(),
            merge_search: self.providers.merge_search,
        }
    }

    /// Get the database URL, with override from DATABASE_URL env var
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.paths.database_url())
    }

    pub fn log_config(&self) {
        self.paths.log_paths();
        tracing::info!("Server listening on {}:{}", self.bind_address, self.port);

        let keys = [
            ("TMDB", &self.providers.tmdb_api_key, "TMDB_API_KEY"),
            ("OMDb", &self.providers.omdb_api_key, "OMDB_API_KEY"),
            ("fanart.tv", &self.providers.fanart_api_key, "FANART_API_KEY"),
        ];
        for (name, key, var) in keys {
            if key.is_some() {
                tracing::info!("{}: ENABLED", name);
            } else {
                tracing::info!("{}: disabled (set {} or add it to config.toml)", name, var);
            }
        }

        tracing::info!("Metadata priority: {:?}", self.providers.metadata_priority);
        tracing::info!("Artwork priority: {:?}", self.providers.image_priority);

        if self.durable_cache {
            tracing::debug!("Cache: memory + SQLite, {} memory entries", self.max_memory_entries);
        } else {
            tracing::info!("Cache: memory only");
        }
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, suffix)).ok()
}
