use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub calendar: CalendarSettings,
    pub search: SearchSettings,
    pub synthesis: SynthesisSettings,
    pub notification: NotificationSettings,
    pub store: StoreSettings,
    pub cache: CacheSettings,
    pub scheduler: SchedulerSettings,
    pub scoring: ScoringSettings,
    pub extraction: ExtractionSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalendarSettings {
    /// Use the built-in mock calendar instead of the REST API
    pub demo: bool,
    pub base_url: String,
    pub calendar_id: String,
    pub access_token: Option<String>,
    pub max_results: u32,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            demo: false,
            base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            calendar_id: "primary".to_string(),
            access_token: None,
            max_results: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub max_results: u8,
    /// Point distances are measured from; distance is unknown without it
    pub origin_latitude: Option<f64>,
    pub origin_longitude: Option<f64>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            base_url: "https://places.googleapis.com".to_string(),
            api_key: None,
            max_results: 10,
            origin_latitude: None,
            origin_longitude: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesisSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub log: bool,
    pub calendar_note: bool,
    pub webhook_url: Option<String>,
    /// Email the note to these addresses through Gmail; empty disables email
    pub email_recipients: Vec<String>,
    pub email_sender: Option<String>,
    pub gmail_base_url: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            log: true,
            calendar_note: false,
            webhook_url: None,
            email_recipients: Vec::new(),
            email_sender: None,
            gmail_base_url: "https://gmail.googleapis.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Json,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryBackend {
    None,
    Json,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub path: String,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub memory_backend: MemoryBackend,
    pub memory_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Json,
            path: "data/processed_events.json".to_string(),
            database_url: None,
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 5,
            memory_backend: MemoryBackend::Json,
            memory_path: "data/session_memory.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub redis_url: Option<String>,
    pub ttl_secs: u64,
    pub l1_cache_size: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            redis_url: None,
            ttl_secs: 3600,
            l1_cache_size: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub interval_minutes: u64,
    pub lookahead_hours: i64,
    pub call_timeout_secs: u64,
    pub lunch_start_hour: u32,
    pub lunch_end_hour: u32,
    pub lunch_keywords: Vec<String>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval_minutes: 30,
            lookahead_hours: 24,
            call_timeout_secs: 30,
            lunch_start_hour: 11,
            lunch_end_hour: 14,
            lunch_keywords: ["lunch", "meal", "dining", "restaurant", "food", "eat"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    pub weights: WeightsConfig,
    pub max_radius_km: f64,
    pub top_n: usize,
    pub memory_capacity: usize,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            weights: WeightsConfig::default(),
            max_radius_km: 3.0,
            top_n: 3,
            memory_capacity: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_health_fit_weight")]
    pub health_fit: f64,
    #[serde(default = "default_popularity_weight")]
    pub popularity: f64,
    #[serde(default = "default_proximity_weight")]
    pub proximity: f64,
    #[serde(default = "default_novelty_weight")]
    pub novelty: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            health_fit: default_health_fit_weight(),
            popularity: default_popularity_weight(),
            proximity: default_proximity_weight(),
            novelty: default_novelty_weight(),
        }
    }
}

fn default_health_fit_weight() -> f64 { 0.40 }
fn default_popularity_weight() -> f64 { 0.30 }
fn default_proximity_weight() -> f64 { 0.20 }
fn default_novelty_weight() -> f64 { 0.10 }

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// TOML file replacing the built-in diet/health vocabulary
    pub vocabulary_path: Option<String>,
    /// Area used when an event has no location
    pub default_area: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with LUNZA__)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., LUNZA__SERVER__PORT -> server.port
            .add_source(environment())
            .build()?;

        substitute_env_vars(settings)?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        substitute_env_vars(settings)?.try_deserialize()
    }
}

fn environment() -> Environment {
    Environment::with_prefix("LUNZA")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Fill credentials from their well-known environment variables
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let overrides = [
        ("synthesis.api_key", env::var("GEMINI_API_KEY").or_else(|_| env::var("GOOGLE_API_KEY")).ok()),
        ("search.api_key", env::var("PLACES_API_KEY").ok()),
        ("calendar.access_token", env::var("GOOGLE_CALENDAR_TOKEN").ok()),
        ("store.database_url", env::var("DATABASE_URL").ok()),
        ("cache.redis_url", env::var("REDIS_URL").ok()),
    ];

    let mut builder = Config::builder().add_source(settings);
    for (key, value) in overrides {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            builder = builder.set_override(key, value)?;
        }
    }

    builder.build()
}
