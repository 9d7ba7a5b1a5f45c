use crate::config::types::{
    Config, DiscoveryConfig, ExtractionConfig, HttpConfig, TargetConfig, ThresholdConfig,
};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    config.storage.database_path()?;
    validate_target_config(&config.target)?;
    validate_discovery_config(&config.discovery)?;
    validate_extraction_config(&config.extraction)?;
    validate_thresholds(&config.thresholds)?;
    validate_http_config(&config.http)?;
    Ok(())
}

/// Validates target endpoints and the identifier pattern
fn validate_target_config(config: &TargetConfig) -> Result<(), ConfigError> {
    if config.location.trim().is_empty() {
        return Err(ConfigError::Validation(
            "location cannot be empty".to_string(),
        ));
    }

    validate_endpoint("listing_url", &config.listing_url)?;
    validate_endpoint("detail_url", &config.detail_url)?;
    validate_id_pattern(&config.id_pattern)?;

    Ok(())
}

fn validate_endpoint(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", name, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            name, value
        )));
    }

    Ok(())
}

/// The pattern must compile and expose exactly one capture group
fn validate_id_pattern(pattern: &str) -> Result<(), ConfigError> {
    let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;

    // captures_len counts the implicit whole-match group
    if regex.captures_len() != 2 {
        return Err(ConfigError::InvalidPattern(format!(
            "id_pattern must contain exactly one capture group, got {}",
            regex.captures_len() - 1
        )));
    }

    Ok(())
}

fn validate_discovery_config(config: &DiscoveryConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "discovery max_retries must be >= 1, got {}",
            config.max_retries
        )));
    }
    Ok(())
}

fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "extraction max_retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    if config.progress_every < 1 {
        return Err(ConfigError::Validation(
            "progress_every must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_thresholds(config: &ThresholdConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("rate_limited", config.rate_limited),
        ("not_found", config.not_found),
        ("empty_body", config.empty_body),
    ] {
        if value < 1 {
            return Err(ConfigError::Validation(format!(
                "{} threshold must be >= 1, got {}",
                name, value
            )));
        }
    }
    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}
