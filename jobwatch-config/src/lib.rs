use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Allowed characters for store key names (compiled once at first use)
static KEY_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.:\-]+$").unwrap_or_else(|e| panic!("invalid key name regex: {e}"))
});

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_TTL_SECS: u64 = 60 * 60 * 24 * 3;
/// Upper bound on `status.ttl_secs` (ten years).
pub const MAX_TTL_SECS: u64 = 60 * 60 * 24 * 365 * 10;

#[derive(Debug, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub redis: Option<RedisSection>,
    #[serde(default)]
    pub status: Option<StatusSection>,
    #[serde(default)]
    pub logging: Option<LoggingSection>,
}

#[derive(Debug, Deserialize)]
pub struct RedisSection {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusSection {
    #[serde(default)]
    pub ttl_secs: Option<u64>,
    #[serde(default)]
    pub key_prefix: Option<String>,
    #[serde(default)]
    pub kill_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: Option<bool>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a RawConfigFile from a path. The format is inferred from the extension:
/// .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_config_str(&s, ext.as_deref())
}

#[inline]
fn parse_config_str(s: &str, ext: Option<&str>) -> Result<RawConfigFile, ConfigError> {
    match ext {
        #[cfg(feature = "toml")]
        Some("toml") => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        #[cfg(feature = "yaml")]
        Some("yaml" | "yml") => {
            serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        #[cfg(feature = "json")]
        Some("json") => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => parse_config_auto(s),
    }
}

/// Try each enabled format in turn
#[inline]
fn parse_config_auto(s: &str) -> Result<RawConfigFile, ConfigError> {
    #[cfg(feature = "toml")]
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "json")]
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "yaml")]
    if let Ok(cfg) = serde_yaml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(any(feature = "yaml", feature = "toml", feature = "json"))]
    {
        Err(ConfigError::Parse(
            "failed to parse config as any supported format".into(),
        ))
    }

    #[cfg(not(any(feature = "yaml", feature = "toml", feature = "json")))]
    {
        let _ = s;
        Err(ConfigError::Parse("no config format enabled".into()))
    }
}

/// Concrete configuration with defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub redis: RedisConfig,
    pub status: StatusConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusConfig {
    /// Seconds a status record lives after its last write.
    pub ttl_secs: u64,
    pub key_prefix: String,
    pub kill_key: String,
}

impl StatusConfig {
    #[inline]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis: RedisConfig {
                url: DEFAULT_REDIS_URL.to_string(),
            },
            status: StatusConfig {
                ttl_secs: DEFAULT_TTL_SECS,
                key_prefix: "status".to_string(),
                kill_key: "status_kill_requests".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
        }
    }
}

#[inline]
fn parse_bool(s: &str) -> Result<bool, ()> {
    match s.as_bytes() {
        b"1" | b"true" | b"TRUE" | b"True" | b"yes" | b"YES" | b"Yes" | b"y" | b"Y" => Ok(true),
        b"0" | b"false" | b"FALSE" | b"False" | b"no" | b"NO" | b"No" | b"n" | b"N" => Ok(false),
        _ => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "on" => Ok(true),
            "false" | "no" | "n" | "off" => Ok(false),
            _ => Err(()),
        },
    }
}

/// Helper macro to apply optional value if present
macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
}

/// Load concrete `Config` from optional file and environment variables.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    if let Some(p) = path {
        let raw = load_raw_from_file(p)?;
        if let Some(redis) = raw.redis {
            apply_opt!(cfg.redis.url, redis.url);
        }
        if let Some(status) = raw.status {
            apply_opt!(cfg.status.ttl_secs, status.ttl_secs);
            apply_opt!(cfg.status.key_prefix, status.key_prefix);
            apply_opt!(cfg.status.kill_key, status.kill_key);
        }
        if let Some(logging) = raw.logging {
            apply_opt!(cfg.logging.level, logging.level);
            apply_opt!(cfg.logging.json, logging.json);
        }
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

#[inline]
fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

#[inline]
fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(v) => parse_bool(&v)
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("invalid {}", key))),
        Err(_) => Ok(None),
    }
}

#[inline]
fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn apply_env_overrides(cfg: &mut Config) -> Result<(), ConfigError> {
    if let Some(v) = env_str("JOBWATCH_REDIS_URL") {
        cfg.redis.url = v;
    }

    // Status records
    if let Some(v) = env_parse::<u64>("JOBWATCH_STATUS_TTL_SECS")? {
        cfg.status.ttl_secs = v;
    }
    if let Some(v) = env_str("JOBWATCH_STATUS_KEY_PREFIX") {
        cfg.status.key_prefix = v;
    }
    if let Some(v) = env_str("JOBWATCH_KILL_KEY") {
        cfg.status.kill_key = v;
    }

    // Logging
    if let Some(v) = env_str("JOBWATCH_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = env_bool("JOBWATCH_LOG_JSON")? {
        cfg.logging.json = v;
    }

    Ok(())
}

/// Validate higher-level constraints on the resolved configuration.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.status.ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "status.ttl_secs must be > 0".into(),
        ));
    }
    if cfg.status.ttl_secs > MAX_TTL_SECS {
        return Err(ConfigError::Validation(format!(
            "status.ttl_secs must be <= {}",
            MAX_TTL_SECS
        )));
    }

    match url::Url::parse(&cfg.redis.url) {
        Ok(u) => match u.scheme() {
            "redis" | "rediss" | "redis+unix" | "unix" => {}
            other => {
                return Err(ConfigError::Validation(format!(
                    "unsupported redis.url scheme: {}",
                    other
                )))
            }
        },
        Err(e) => {
            return Err(ConfigError::Validation(format!(
                "invalid redis.url {}: {}",
                cfg.redis.url, e
            )))
        }
    }

    for (name, value) in [
        ("status.key_prefix", &cfg.status.key_prefix),
        ("status.kill_key", &cfg.status.kill_key),
    ] {
        if !KEY_NAME_REGEX.is_match(value) {
            return Err(ConfigError::Validation(format!(
                "invalid {}: {:?}",
                name, value
            )));
        }
    }

    // Finders scan `<prefix>:*` and would pick up the kill set
    if cfg
        .status
        .kill_key
        .starts_with(&format!("{}:", cfg.status.key_prefix))
    {
        return Err(ConfigError::Validation(format!(
            "status.kill_key {} lies inside the {}:* namespace",
            cfg.status.kill_key, cfg.status.key_prefix
        )));
    }

    Ok(())
}
