use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Loads configuration from an optional TOML file and the process environment
///
/// Values are layered: built-in defaults, then the TOML file (if given), then
/// environment variables. A `.env` file in the working directory is loaded
/// first when present.
///
/// # Arguments
///
/// * `path` - Optional path to a TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to read, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use jobtrawl::config::load_config;
///
/// let config = load_config(Some(Path::new("jobtrawl.toml"))).unwrap();
/// println!("Workers: {}", config.extraction.workers);
/// ```
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    env_file_loaded(dotenvy::dotenv())?;

    let mut config = match path {
        Some(path) => load_config_file(path)?,
        None => Config::default(),
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;

    Ok(config)
}

/// A missing `.env` file is fine; an unreadable or malformed one is not
fn env_file_loaded(result: Result<PathBuf, dotenvy::Error>) -> Result<(), ConfigError> {
    match result {
        Ok(path) => {
            tracing::debug!("Loaded environment from {}", path.display());
            Ok(())
        }
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(ConfigError::EnvFile(e)),
    }
}

/// Reads and parses a TOML configuration file without validating it
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Overlays environment-style key/value settings onto a configuration
///
/// `lookup` returns the raw value for a key, or `None` when unset. Empty
/// values are treated as unset.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("DATABASE_PATH") {
        config.storage.database_path = Some(v);
    }

    if let Some(v) = get("JOBTRAWL_LOCATION") {
        config.target.location = v;
    }
    if let Some(v) = get("JOBTRAWL_RECENCY") {
        config.target.recency = v;
    }
    if let Some(v) = get("JOBTRAWL_LISTING_URL") {
        config.target.listing_url = v;
    }
    if let Some(v) = get("JOBTRAWL_DETAIL_URL") {
        config.target.detail_url = v;
    }
    if let Some(v) = get("JOBTRAWL_ID_PATTERN") {
        config.target.id_pattern = v;
    }

    if let Some(v) = parse_var(&get, "JOBTRAWL_DISCOVERY_MAX_RETRIES")? {
        config.discovery.max_retries = v;
    }
    if let Some(v) = parse_var(&get, "JOBTRAWL_DISCOVERY_RETRY_DELAY_MS")? {
        config.discovery.retry_delay_ms = v;
    }

    if let Some(v) = parse_var(&get, "JOBTRAWL_EXTRACTION_MAX_RETRIES")? {
        config.extraction.max_retries = v;
    }
    if let Some(v) = parse_var(&get, "JOBTRAWL_EXTRACTION_RETRY_DELAY_MS")? {
        config.extraction.retry_delay_ms = v;
    }
    if let Some(v) = parse_var(&get, "JOBTRAWL_MAX_WORKERS")? {
        config.extraction.workers = v;
    }
    if let Some(v) = parse_var(&get, "JOBTRAWL_PROGRESS_EVERY")? {
        config.extraction.progress_every = v;
    }
    if let Some(v) = get("JOBTRAWL_BREAKER_SCOPE") {
        config.extraction.breaker_scope = v.parse()?;
    }

    if let Some(v) = parse_var(&get, "JOBTRAWL_MAX_CONSECUTIVE_429")? {
        config.thresholds.rate_limited = v;
    }
    if let Some(v) = parse_var(&get, "JOBTRAWL_MAX_CONSECUTIVE_404")? {
        config.thresholds.not_found = v;
    }
    if let Some(v) = parse_var(&get, "JOBTRAWL_MAX_CONSECUTIVE_EMPTY")? {
        config.thresholds.empty_body = v;
    }

    if let Some(v) = parse_var(&get, "JOBTRAWL_HTTP_TIMEOUT_SECS")? {
        config.http.timeout_secs = v;
    }
    if let Some(v) = get("JOBTRAWL_USER_AGENT") {
        config.http.user_agent = v;
    }

    if let Some(v) = get("JOBTRAWL_EVENTS_ENABLED") {
        config.events.enabled = parse_bool("JOBTRAWL_EVENTS_ENABLED", &v)?;
    }
    if let Some(v) = get("JOBTRAWL_LOG_DISCOVERY_DETAILS") {
        config.events.log_discovery_details = parse_bool("JOBTRAWL_LOG_DISCOVERY_DETAILS", &v)?;
    }
    if let Some(v) = get("JOBTRAWL_PROCESS_NAME") {
        config.events.process_name = Some(v);
    }

    Ok(())
}

fn parse_var<T, G>(get: &G, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        None => Ok(None),
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        }),
    }
}
