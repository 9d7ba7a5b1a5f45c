use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::ConfigError;

pub const DEFAULT_LISTING_URL: &str =
    "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search";
pub const DEFAULT_DETAIL_URL: &str = "https://www.linkedin.com/jobs/api/jobPosting";
pub const DEFAULT_ID_PATTERN: &str = r#"data-entity-urn="urn:li:jobPosting:(\d+)""#;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Main configuration structure for Jobtrawl
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

/// Record store connection settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: Option<String>,
}

impl StorageConfig {
    /// Returns the configured database path, or a fatal error if unset
    pub fn database_path(&self) -> Result<&Path, ConfigError> {
        self.database_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(Path::new)
            .ok_or(ConfigError::Missing("storage.database-path / DATABASE_PATH"))
    }
}

/// What to crawl and where to find it
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Location label sent to the listing endpoint and stored as origin tag
    pub location: String,

    /// Recency filter value (e.g. "r86400" for the last 24 hours)
    pub recency: String,

    #[serde(rename = "listing-url")]
    pub listing_url: String,

    /// Base URL for detail pages; the identifier is appended as a path segment
    #[serde(rename = "detail-url")]
    pub detail_url: String,

    /// Regex with one capture group extracting identifiers from a listing page
    #[serde(rename = "id-pattern")]
    pub id_pattern: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            location: "Chile".to_string(),
            recency: "r86400".to_string(),
            listing_url: DEFAULT_LISTING_URL.to_string(),
            detail_url: DEFAULT_DETAIL_URL.to_string(),
            id_pattern: DEFAULT_ID_PATTERN.to_string(),
        }
    }
}

/// Retry policy for the discovery phase
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base delay between retries (milliseconds)
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay_ms: 6000,
        }
    }
}

impl DiscoveryConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Worker pool and retry policy for the extraction phase
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base delay between retries (milliseconds)
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Number of concurrent extraction workers
    pub workers: usize,

    /// Emit an aggregate progress event every this many finished jobs
    #[serde(rename = "progress-every")]
    pub progress_every: u64,

    #[serde(rename = "breaker-scope")]
    pub breaker_scope: BreakerScope,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay_ms: 5000,
            workers: 2,
            progress_every: 10,
            breaker_scope: BreakerScope::Unit,
        }
    }
}

impl ExtractionConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Which jobs share failure counters during extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakerScope {
    /// One breaker for the whole pool invocation; a trip stops every worker
    Pool,
    /// A fresh breaker per job; a trip only ends that job's attempts
    Unit,
}

impl FromStr for BreakerScope {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pool" => Ok(Self::Pool),
            "unit" => Ok(Self::Unit),
            other => Err(ConfigError::InvalidValue {
                key: "extraction.breaker-scope",
                value: other.to_string(),
            }),
        }
    }
}

/// Consecutive-failure thresholds that trip the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    #[serde(rename = "rate-limited")]
    pub rate_limited: u32,

    #[serde(rename = "not-found")]
    pub not_found: u32,

    #[serde(rename = "empty-body")]
    pub empty_body: u32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            rate_limited: 5,
            not_found: 10,
            empty_body: 10,
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Event log settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Record pipeline events in the database
    pub enabled: bool,

    /// Also record one database event per discovery page
    #[serde(rename = "log-discovery-details")]
    pub log_discovery_details: bool,

    /// Name stamped on every database event; derived from the location when unset
    #[serde(rename = "process-name")]
    pub process_name: Option<String>,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_discovery_details: false,
            process_name: None,
        }
    }
}

impl Config {
    /// Name recorded on database events for this process
    pub fn process_name(&self) -> String {
        self.events.process_name.clone().unwrap_or_else(|| {
            format!(
                "jobtrawl-{}",
                self.target.location.to_lowercase().replace(' ', "-")
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.extraction.workers, 2);
        assert_eq!(config.discovery.max_retries, 5);
        assert_eq!(config.thresholds.rate_limited, 5);
        assert_eq!(config.thresholds.not_found, 10);
        assert_eq!(config.thresholds.empty_body, 10);
        assert_eq!(config.target.recency, "r86400");
        assert!(config.events.enabled);
        assert_eq!(config.extraction.breaker_scope, BreakerScope::Unit);
    }

    #[test]
    fn test_missing_database_path_is_error() {
        let config = Config::default();
        assert!(matches!(
            config.storage.database_path(),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn test_breaker_scope_from_str() {
        assert_eq!("pool".parse::<BreakerScope>().unwrap(), BreakerScope::Pool);
        assert_eq!(" Unit ".parse::<BreakerScope>().unwrap(), BreakerScope::Unit);
        assert!("global".parse::<BreakerScope>().is_err());
    }

    #[test]
    fn test_process_name_derived_from_location() {
        let mut config = Config::default();
        config.target.location = "New Zealand".to_string();
        assert_eq!(config.process_name(), "jobtrawl-new-zealand");

        config.events.process_name = Some("custom".to_string());
        assert_eq!(config.process_name(), "custom");
    }
}
