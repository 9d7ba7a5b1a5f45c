//! Shared fixtures for the wiremock-backed pipeline tests

#![allow(dead_code)]

use jobtrawl::config::Config;
use jobtrawl::crawler::build_http_client;
use jobtrawl::storage::{share, SharedStore, SqliteStorage};
use reqwest::Client;

pub const LISTING_PATH: &str = "/jobs/search";
pub const DETAIL_PATH: &str = "/jobs/posting";

/// Configuration pointed at a mock server, with millisecond retry delays
pub fn test_config(server_uri: &str) -> Config {
    let mut config = Config::default();
    config.storage.database_path = Some(":memory:".to_string());
    config.target.location = "Chile".to_string();
    config.target.listing_url = format!("{}{}", server_uri, LISTING_PATH);
    config.target.detail_url = format!("{}{}", server_uri, DETAIL_PATH);
    config.discovery.max_retries = 5;
    config.discovery.retry_delay_ms = 1;
    config.extraction.max_retries = 5;
    config.extraction.retry_delay_ms = 1;
    config.extraction.workers = 2;
    config.http.timeout_secs = 5;
    config
}

pub fn memory_store() -> SharedStore<SqliteStorage> {
    share(SqliteStorage::new_in_memory().expect("in-memory database"))
}

pub fn client(config: &Config) -> Client {
    build_http_client(&config.http).expect("http client")
}

/// Listing fragment carrying the given posting identifiers
pub fn listing_page<S: AsRef<str>>(ids: &[S]) -> String {
    ids.iter()
        .map(|id| {
            format!(
                r#"<li><div class="base-card" data-entity-urn="urn:li:jobPosting:{}"><a href="/view/{}">Job</a></div></li>"#,
                id.as_ref(),
                id.as_ref()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Detail fragment for one posting
pub fn detail_page(title: &str) -> String {
    format!(
        r#"<section>
          <h2 class="top-card-layout__title">{}</h2>
          <a class="topcard__org-name-link" href="/company/acme">Acme Corp</a>
          <span class="topcard__flavor topcard__flavor--bullet">Santiago, Chile</span>
          <span class="posted-time-ago__text">2 days ago</span>
          <span class="num-applicants__caption">25 applicants</span>
          <div class="show-more-less-html__markup"><p>Write Rust.</p></div>
          <ul>
            <li class="description__job-criteria-item"><span class="description__job-criteria-text">Associate</span></li>
            <li class="description__job-criteria-item"><span class="description__job-criteria-text">Full-time</span></li>
          </ul>
        </section>"#,
        title
    )
}

/// Sequential numeric identifiers in `[from, to)`
pub fn numbered_ids(from: u64, to: u64) -> Vec<String> {
    (from..to).map(|n| n.to_string()).collect()
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
