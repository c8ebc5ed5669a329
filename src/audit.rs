//! Audit execution against a live browser

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use headless_chrome::Browser;
use serde::{Deserialize, Serialize};

use crate::browser::{endpoint_url, BrowserSession};
use crate::checks::{self, CategoryChecks};
use crate::report;

/// Rendered output requested from an audit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportOutput {
    /// Produce the self-contained HTML report
    #[default]
    Html,
    /// Scores only
    None,
}

/// Options for a single audit
#[derive(Debug, Clone, Default)]
pub struct AuditOptions {
    pub output: ReportOutput,
    /// Overrides the session's remote-debugging port. When set to a
    /// different port, the runner attaches over that DevTools endpoint
    /// instead of the launched session.
    pub port: Option<u16>,
}

impl AuditOptions {
    /// The port the audit will talk to: the override when given, the
    /// session default otherwise.
    pub fn effective_port(&self, default_port: u16) -> u16 {
        self.port.unwrap_or(default_port)
    }
}

/// Category scores, each a fraction in [0,1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub performance: f64,
    pub accessibility: f64,
    #[serde(rename = "best-practices")]
    pub best_practices: f64,
    pub seo: f64,
    pub pwa: f64,
}

/// Timings read from the page's performance API, in milliseconds.
/// Zero means the event had not fired when the audit sampled.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageTimings {
    pub dom_content_loaded: f64,
    pub dom_interactive: f64,
    pub load: f64,
    pub first_paint: f64,
    pub first_contentful_paint: f64,
    pub transfer_size: f64,
    pub resources: u64,
}

/// Result of auditing one URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResult {
    pub url: String,
    pub fetched_at: DateTime<Utc>,
    pub scores: CategoryScores,
    pub timings: PageTimings,
    pub checks: Vec<CategoryChecks>,
    /// Rendered HTML report. Absent when the page yielded no usable
    /// document or the options asked for scores only.
    #[serde(skip)]
    pub report: Option<String>,
}

/// Runs audits against a launched browser session.
pub struct AuditRunner<'a> {
    session: &'a BrowserSession,
}

/// Expression evaluated in the page to sample the performance API.
const TIMINGS_JS: &str = r#"JSON.stringify((() => {
  const nav = performance.getEntriesByType('navigation')[0] || {};
  const paint = {};
  for (const entry of performance.getEntriesByType('paint')) {
    paint[entry.name] = entry.startTime;
  }
  return {
    dom_content_loaded: nav.domContentLoadedEventEnd || 0,
    dom_interactive: nav.domInteractive || 0,
    load: nav.loadEventEnd || 0,
    first_paint: paint['first-paint'] || 0,
    first_contentful_paint: paint['first-contentful-paint'] || 0,
    transfer_size: nav.transferSize || 0,
    resources: performance.getEntriesByType('resource').length
  };
})())"#;

impl<'a> AuditRunner<'a> {
    pub fn new(session: &'a BrowserSession) -> Self {
        Self { session }
    }

    /// Audit a single URL.
    ///
    /// An unreachable or invalid URL yields either an error or a result
    /// whose `report` is absent; callers must check for the missing body.
    pub fn run(&self, url: &str, options: &AuditOptions) -> Result<AuditResult> {
        let port = options.effective_port(self.session.debug_port());
        if port == self.session.debug_port() {
            audit_page(self.session.handle(), url, options)
        } else {
            let browser = connect(port)?;
            audit_page(&browser, url, options)
        }
    }
}

/// Attach to an already-running browser through its DevTools endpoint.
fn connect(port: u16) -> Result<Browser> {
    let version: serde_json::Value = ureq::get(&format!("{}/json/version", endpoint_url(port)))
        .call()
        .with_context(|| format!("Failed to reach DevTools endpoint on port {}", port))?
        .into_json()
        .context("Failed to parse DevTools version response")?;

    let ws_url = version
        .get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .context("DevTools version response lacks webSocketDebuggerUrl")?;

    Browser::connect(ws_url.to_string()).context("Failed to attach to browser over DevTools")
}

fn audit_page(browser: &Browser, url: &str, options: &AuditOptions) -> Result<AuditResult> {
    let tab = browser.new_tab().context("Failed to open a browser tab")?;

    tab.navigate_to(url)
        .with_context(|| format!("Failed to navigate to {}", url))?;
    tab.wait_until_navigated()
        .with_context(|| format!("Navigation to {} did not settle", url))?;

    let timings = collect_timings(&tab).unwrap_or_default();
    let content = tab.get_content().ok().filter(|c| !c.trim().is_empty());
    let _ = tab.close(false);

    let fetched_at = Utc::now();
    let mut result = match content {
        Some(html) => {
            let checks = checks::run_page_checks(&html, url);
            let scores = build_scores(&timings, &checks);
            AuditResult {
                url: url.to_string(),
                fetched_at,
                scores,
                timings,
                checks,
                report: None,
            }
        }
        None => AuditResult {
            url: url.to_string(),
            fetched_at,
            scores: CategoryScores::default(),
            timings,
            checks: Vec::new(),
            report: None,
        },
    };

    if options.output == ReportOutput::Html && !result.checks.is_empty() {
        result.report = Some(report::render_html(&result));
    }

    Ok(result)
}

fn collect_timings(tab: &headless_chrome::Tab) -> Result<PageTimings> {
    let remote = tab
        .evaluate(TIMINGS_JS, false)
        .context("Failed to evaluate page timings")?;

    let raw = remote
        .value
        .and_then(|v| v.as_str().map(str::to_string))
        .context("Timing evaluation returned no value")?;

    serde_json::from_str(&raw).context("Failed to parse page timings")
}

/// Combine the timing-derived performance score with the document checks.
fn build_scores(timings: &PageTimings, categories: &[CategoryChecks]) -> CategoryScores {
    let mut scores = CategoryScores {
        performance: checks::performance_score(timings),
        ..Default::default()
    };

    for category in categories {
        let value = category.score();
        match category.category {
            checks::Category::Performance => scores.performance = value,
            checks::Category::Accessibility => scores.accessibility = value,
            checks::Category::BestPractices => scores.best_practices = value,
            checks::Category::Seo => scores.seo = value,
            checks::Category::Pwa => scores.pwa = value,
        }
    }

    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::{Category, CategoryChecks, PageCheck};

    #[test]
    fn test_effective_port_defaults_to_session() {
        let options = AuditOptions::default();
        assert_eq!(options.effective_port(9222), 9222);
    }

    #[test]
    fn test_effective_port_override_wins() {
        let options = AuditOptions {
            port: Some(9333),
            ..Default::default()
        };
        assert_eq!(options.effective_port(9222), 9333);
    }

    #[test]
    fn test_default_output_is_html() {
        assert_eq!(ReportOutput::default(), ReportOutput::Html);
    }

    #[test]
    fn test_scores_serialize_with_spec_keys() {
        let scores = CategoryScores {
            performance: 0.9,
            accessibility: 0.8,
            best_practices: 0.7,
            seo: 0.6,
            pwa: 0.5,
        };
        let json = serde_json::to_value(&scores).unwrap();
        assert_eq!(json["performance"], 0.9);
        assert_eq!(json["best-practices"], 0.7);
        assert_eq!(json["pwa"], 0.5);
    }

    #[test]
    fn test_timings_parse_from_page_json() {
        let raw = r#"{"dom_content_loaded":1234.5,"load":2500,"first_contentful_paint":800.25,"resources":12}"#;
        let timings: PageTimings = serde_json::from_str(raw).unwrap();
        assert!((timings.dom_content_loaded - 1234.5).abs() < f64::EPSILON);
        assert!((timings.first_contentful_paint - 800.25).abs() < f64::EPSILON);
        assert_eq!(timings.resources, 12);
        assert_eq!(timings.first_paint, 0.0);
    }

    #[test]
    fn test_build_scores_maps_categories() {
        fn all_passing(category: Category) -> CategoryChecks {
            CategoryChecks {
                category,
                checks: vec![PageCheck {
                    id: "x".to_string(),
                    label: "x".to_string(),
                    passed: true,
                    detail: None,
                }],
            }
        }

        let timings = PageTimings {
            first_contentful_paint: 500.0,
            ..Default::default()
        };
        let categories = vec![
            all_passing(Category::Accessibility),
            all_passing(Category::Seo),
        ];

        let scores = build_scores(&timings, &categories);
        assert_eq!(scores.performance, 1.0);
        assert_eq!(scores.accessibility, 1.0);
        assert_eq!(scores.seo, 1.0);
        assert_eq!(scores.best_practices, 0.0);
        assert_eq!(scores.pwa, 0.0);
    }
}
