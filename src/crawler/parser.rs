//! Parsers for listing and detail payloads
//!
//! This module handles:
//! - Extracting job identifiers from a listing page
//! - Extracting structured job attributes from a detail page

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

/// Errors raised by payload parsers
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid selector {selector}: {reason}")]
    Selector { selector: String, reason: String },

    #[error("Malformed payload: {0}")]
    Malformed(String),
}

/// Extracts job identifiers from a listing payload
pub trait IdentifierExtractor: Send + Sync {
    /// Returns identifiers in page order; duplicates are kept
    fn extract(&self, payload: &str) -> Vec<String>;
}

/// Identifier extractor driven by a regex with one capture group
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    pattern: Regex,
}

impl PatternExtractor {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }
}

impl IdentifierExtractor for PatternExtractor {
    fn extract(&self, payload: &str) -> Vec<String> {
        self.pattern
            .captures_iter(payload)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

/// Attributes extracted from one detail page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPosting {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub posted_time: Option<String>,
    pub applicant_count: Option<String>,
    pub description: Option<String>,
    pub seniority_level: Option<String>,
    pub employment_type: Option<String>,
    pub job_function: Option<String>,
    pub industries: Option<String>,
}

/// Extracts structured attributes from a detail payload
///
/// Implementations may fail or panic; extraction workers contain both and
/// mark the job failed.
pub trait DetailParser: Send + Sync {
    fn parse(&self, payload: &str) -> Result<ParsedPosting, ParseError>;
}

/// Detail parser for the job-posting HTML fragment
///
/// Every attribute is optional; a missing element yields `None`.
#[derive(Debug)]
pub struct HtmlDetailParser {
    title: Selector,
    company: Selector,
    location: Selector,
    posted_time: Selector,
    applicant_count: Selector,
    description: Selector,
    criteria_item: Selector,
    criteria_text: Selector,
}

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Selector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

/// Joins the element's text nodes with single spaces
fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

impl HtmlDetailParser {
    pub fn new() -> Result<Self, ParseError> {
        Ok(Self {
            title: selector("h2.top-card-layout__title")?,
            company: selector("a.topcard__org-name-link")?,
            location: selector("span.topcard__flavor.topcard__flavor--bullet")?,
            posted_time: selector("span.posted-time-ago__text")?,
            applicant_count: selector(
                "span.num-applicants__caption, figcaption.num-applicants__caption",
            )?,
            description: selector("div.show-more-less-html__markup")?,
            criteria_item: selector("li.description__job-criteria-item")?,
            criteria_text: selector("span.description__job-criteria-text")?,
        })
    }

    fn first_text(&self, document: &Html, selector: &Selector) -> Option<String> {
        document.select(selector).next().and_then(element_text)
    }
}

impl DetailParser for HtmlDetailParser {
    fn parse(&self, payload: &str) -> Result<ParsedPosting, ParseError> {
        let document = Html::parse_document(payload);

        // Criteria are positional: seniority, employment type, function, industries
        let mut criteria = document.select(&self.criteria_item).map(|item| {
            item.select(&self.criteria_text)
                .next()
                .and_then(element_text)
        });

        Ok(ParsedPosting {
            title: self.first_text(&document, &self.title),
            company: self.first_text(&document, &self.company),
            location: self.first_text(&document, &self.location),
            posted_time: self.first_text(&document, &self.posted_time),
            applicant_count: self.first_text(&document, &self.applicant_count),
            description: self.first_text(&document, &self.description),
            seniority_level: criteria.next().flatten(),
            employment_type: criteria.next().flatten(),
            job_function: criteria.next().flatten(),
            industries: criteria.next().flatten(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ID_PATTERN;

    const DETAIL_HTML: &str = r#"
        <section class="top-card-layout">
          <h2 class="top-card-layout__title">  Senior Rust Engineer </h2>
          <a class="topcard__org-name-link" href="/company/acme">
            Acme Corp
          </a>
          <span class="topcard__flavor topcard__flavor--bullet">Santiago, Chile</span>
          <span class="posted-time-ago__text">3 days ago</span>
          <span class="num-applicants__caption">Over 200 applicants</span>
        </section>
        <div class="show-more-less-html__markup">
          <p>Build things.</p>
          <ul><li>Rust</li><li>Tokio</li></ul>
        </div>
        <ul class="description__job-criteria-list">
          <li class="description__job-criteria-item">
            <h3>Seniority level</h3>
            <span class="description__job-criteria-text">Mid-Senior level</span>
          </li>
          <li class="description__job-criteria-item">
            <span class="description__job-criteria-text">Full-time</span>
          </li>
          <li class="description__job-criteria-item">
            <span class="description__job-criteria-text">Engineering</span>
          </li>
          <li class="description__job-criteria-item">
            <span class="description__job-criteria-text">Software Development</span>
          </li>
        </ul>
    "#;

    #[test]
    fn test_pattern_extractor_default_pattern() {
        let extractor = PatternExtractor::new(DEFAULT_ID_PATTERN).unwrap();
        let page = r#"
            <li><div data-entity-urn="urn:li:jobPosting:3901"></div></li>
            <li><div data-entity-urn="urn:li:jobPosting:3902"></div></li>
            <li><div data-entity-urn="urn:li:company:77"></div></li>
        "#;
        assert_eq!(extractor.extract(page), vec!["3901", "3902"]);
    }

    #[test]
    fn test_pattern_extractor_keeps_duplicates() {
        let extractor = PatternExtractor::new(r"id=(\d+)").unwrap();
        assert_eq!(extractor.extract("id=1 id=2 id=1"), vec!["1", "2", "1"]);
    }

    #[test]
    fn test_pattern_extractor_no_matches() {
        let extractor = PatternExtractor::new(DEFAULT_ID_PATTERN).unwrap();
        assert!(extractor.extract("<html></html>").is_empty());
    }

    #[test]
    fn test_parse_full_posting() {
        let parser = HtmlDetailParser::new().unwrap();
        let posting = parser.parse(DETAIL_HTML).unwrap();

        assert_eq!(posting.title.as_deref(), Some("Senior Rust Engineer"));
        assert_eq!(posting.company.as_deref(), Some("Acme Corp"));
        assert_eq!(posting.location.as_deref(), Some("Santiago, Chile"));
        assert_eq!(posting.posted_time.as_deref(), Some("3 days ago"));
        assert_eq!(posting.applicant_count.as_deref(), Some("Over 200 applicants"));
        assert_eq!(posting.description.as_deref(), Some("Build things. Rust Tokio"));
        assert_eq!(posting.seniority_level.as_deref(), Some("Mid-Senior level"));
        assert_eq!(posting.employment_type.as_deref(), Some("Full-time"));
        assert_eq!(posting.job_function.as_deref(), Some("Engineering"));
        assert_eq!(posting.industries.as_deref(), Some("Software Development"));
    }

    #[test]
    fn test_parse_missing_fields() {
        let parser = HtmlDetailParser::new().unwrap();
        let posting = parser
            .parse(r#"<h2 class="top-card-layout__title">Only a title</h2>"#)
            .unwrap();

        assert_eq!(posting.title.as_deref(), Some("Only a title"));
        assert_eq!(
            posting,
            ParsedPosting {
                title: Some("Only a title".to_string()),
                ..ParsedPosting::default()
            }
        );
    }

    #[test]
    fn test_parse_partial_criteria() {
        let parser = HtmlDetailParser::new().unwrap();
        let html = r#"
            <li class="description__job-criteria-item">
              <span class="description__job-criteria-text">Entry level</span>
            </li>
            <li class="description__job-criteria-item"><h3>No value</h3></li>
        "#;
        let posting = parser.parse(html).unwrap();

        assert_eq!(posting.seniority_level.as_deref(), Some("Entry level"));
        assert_eq!(posting.employment_type, None);
        assert_eq!(posting.job_function, None);
        assert_eq!(posting.industries, None);
    }
}
