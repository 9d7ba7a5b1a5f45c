//! Configuration module for Jobtrawl
//!
//! Settings are layered from built-in defaults, an optional TOML file, and
//! environment variables (with `.env` support).
//!
//! # Example
//!
//! ```no_run
//! use jobtrawl::config::load_config;
//!
//! let config = load_config(None).unwrap();
//! println!("Crawling location: {}", config.target.location);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BreakerScope, Config, DiscoveryConfig, EventsConfig, ExtractionConfig, HttpConfig,
    StorageConfig, TargetConfig, ThresholdConfig, DEFAULT_ID_PATTERN,
};

// Re-export parser functions
pub use parser::{apply_overrides, load_config, load_config_file};
pub use validation::validate;
