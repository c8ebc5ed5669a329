//! Page checks behind the category scores
//!
//! Every category except performance is scored as the fraction of its
//! checks that pass against the rendered document. Performance maps the
//! measured page timings through fixed good/poor thresholds.

use crate::audit::PageTimings;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Audit category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Performance,
    Accessibility,
    BestPractices,
    Seo,
    Pwa,
}

impl Category {
    /// Human-readable label used in reports and notifications.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Performance => "Performance",
            Category::Accessibility => "Accessibility",
            Category::BestPractices => "Best Practices",
            Category::Seo => "SEO",
            Category::Pwa => "PWA",
        }
    }
}

/// Outcome of a single check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCheck {
    pub id: String,
    pub label: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl PageCheck {
    fn pass(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            passed: true,
            detail: None,
        }
    }

    fn fail(id: &str, label: &str, detail: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            passed: false,
            detail: Some(detail.into()),
        }
    }

    fn verdict(id: &str, label: &str, passed: bool, detail: impl Into<String>) -> Self {
        if passed {
            Self::pass(id, label)
        } else {
            Self::fail(id, label, detail)
        }
    }
}

/// Checks run for one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryChecks {
    pub category: Category,
    pub checks: Vec<PageCheck>,
}

impl CategoryChecks {
    /// Fraction of passing checks, in [0,1]. A category with no checks
    /// scores 0.
    pub fn score(&self) -> f64 {
        if self.checks.is_empty() {
            return 0.0;
        }
        let passed = self.checks.iter().filter(|c| c.passed).count();
        passed as f64 / self.checks.len() as f64
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// Run every document-based category against the rendered page.
pub fn run_page_checks(html: &str, url: &str) -> Vec<CategoryChecks> {
    let document = Html::parse_document(html);
    vec![
        CategoryChecks {
            category: Category::Accessibility,
            checks: accessibility_checks(&document),
        },
        CategoryChecks {
            category: Category::BestPractices,
            checks: best_practice_checks(&document, html, url),
        },
        CategoryChecks {
            category: Category::Seo,
            checks: seo_checks(&document),
        },
        CategoryChecks {
            category: Category::Pwa,
            checks: pwa_checks(&document, url),
        },
    ]
}

fn document_title(document: &Html) -> Option<String> {
    document
        .select(&selector("head > title"))
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn has_viewport_meta(document: &Html) -> bool {
    document
        .select(&selector(r#"meta[name="viewport"]"#))
        .next()
        .is_some()
}

fn accessibility_checks(document: &Html) -> Vec<PageCheck> {
    let mut checks = Vec::new();

    let lang = document
        .select(&selector("html"))
        .next()
        .and_then(|el| el.value().attr("lang"))
        .map(str::trim)
        .filter(|l| !l.is_empty());
    checks.push(PageCheck::verdict(
        "html-has-lang",
        "Document has a lang attribute",
        lang.is_some(),
        "The <html> element has no lang attribute",
    ));

    checks.push(PageCheck::verdict(
        "document-title",
        "Document has a title element",
        document_title(document).is_some(),
        "The document has no non-empty <title>",
    ));

    let missing_alt = document
        .select(&selector("img"))
        .filter(|el| el.value().attr("alt").is_none())
        .count();
    checks.push(PageCheck::verdict(
        "image-alt",
        "Images have alt attributes",
        missing_alt == 0,
        format!("{} image(s) missing an alt attribute", missing_alt),
    ));

    let labelled_ids: HashSet<&str> = document
        .select(&selector("label[for]"))
        .filter_map(|el| el.value().attr("for"))
        .collect();
    let unlabelled = document
        .select(&selector("input"))
        .filter(|el| {
            let kind = el.value().attr("type").unwrap_or("text");
            !matches!(kind, "hidden" | "submit" | "button" | "reset" | "image")
        })
        .filter(|el| {
            el.value().attr("aria-label").is_none()
                && el.value().attr("aria-labelledby").is_none()
                && !el
                    .value()
                    .attr("id")
                    .map(|id| labelled_ids.contains(id))
                    .unwrap_or(false)
        })
        .count();
    checks.push(PageCheck::verdict(
        "label",
        "Form fields have associated labels",
        unlabelled == 0,
        format!("{} form field(s) without a label", unlabelled),
    ));

    let nameless_links = document
        .select(&selector("a[href]"))
        .filter(|el| {
            el.text().collect::<String>().trim().is_empty()
                && el.value().attr("aria-label").is_none()
        })
        .count();
    checks.push(PageCheck::verdict(
        "link-name",
        "Links have discernible text",
        nameless_links == 0,
        format!("{} link(s) without discernible text", nameless_links),
    ));

    checks.push(PageCheck::verdict(
        "viewport",
        "Viewport meta tag is present",
        has_viewport_meta(document),
        "No <meta name=\"viewport\"> found",
    ));

    checks
}

fn seo_checks(document: &Html) -> Vec<PageCheck> {
    let mut checks = Vec::new();

    checks.push(PageCheck::verdict(
        "document-title",
        "Document has a title element",
        document_title(document).is_some(),
        "The document has no non-empty <title>",
    ));

    let description = document
        .select(&selector(r#"meta[name="description"]"#))
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|c| !c.is_empty());
    checks.push(PageCheck::verdict(
        "meta-description",
        "Document has a meta description",
        description.is_some(),
        "No non-empty <meta name=\"description\"> found",
    ));

    checks.push(PageCheck::verdict(
        "canonical",
        "Document has a canonical link",
        document
            .select(&selector(r#"link[rel="canonical"]"#))
            .next()
            .is_some(),
        "No <link rel=\"canonical\"> found",
    ));

    let noindex = document
        .select(&selector(r#"meta[name="robots"]"#))
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.to_ascii_lowercase().contains("noindex"))
        .unwrap_or(false);
    checks.push(PageCheck::verdict(
        "is-crawlable",
        "Page is not blocked from indexing",
        !noindex,
        "A robots meta tag contains noindex",
    ));

    checks.push(PageCheck::verdict(
        "heading-elements",
        "Page has a top-level heading",
        document.select(&selector("h1")).next().is_some(),
        "No <h1> element found",
    ));

    checks
}

fn best_practice_checks(document: &Html, raw_html: &str, url: &str) -> Vec<PageCheck> {
    let mut checks = Vec::new();

    checks.push(PageCheck::verdict(
        "doctype",
        "Page has an HTML doctype",
        raw_html
            .trim_start()
            .get(..9)
            .map(|head| head.eq_ignore_ascii_case("<!doctype"))
            .unwrap_or(false),
        "Document does not start with a doctype declaration",
    ));

    let has_charset = document.select(&selector("meta[charset]")).next().is_some()
        || document
            .select(&selector(r#"meta[http-equiv="Content-Type"]"#))
            .next()
            .is_some();
    checks.push(PageCheck::verdict(
        "charset",
        "Document declares a character encoding",
        has_charset,
        "No charset declaration found",
    ));

    let secure = url.starts_with("https://");
    checks.push(PageCheck::verdict(
        "is-on-https",
        "Page is served over HTTPS",
        secure,
        "Page URL does not use https",
    ));

    // Mixed content only applies to pages that are themselves secure.
    let insecure_refs = if secure {
        document
            .select(&selector("img, script, link, iframe"))
            .filter(|el| {
                let value = el
                    .value()
                    .attr("src")
                    .or_else(|| el.value().attr("href"))
                    .unwrap_or("");
                value.starts_with("http://")
            })
            .count()
    } else {
        0
    };
    checks.push(PageCheck::verdict(
        "mixed-content",
        "No insecure resource references",
        insecure_refs == 0,
        format!("{} resource(s) loaded over http", insecure_refs),
    ));

    let deprecated = document
        .select(&selector("font, marquee, center"))
        .count();
    checks.push(PageCheck::verdict(
        "deprecations",
        "No deprecated HTML elements",
        deprecated == 0,
        format!("{} deprecated element(s) in use", deprecated),
    ));

    checks
}

fn pwa_checks(document: &Html, url: &str) -> Vec<PageCheck> {
    let mut checks = Vec::new();

    checks.push(PageCheck::verdict(
        "installable-manifest",
        "Page links a web app manifest",
        document
            .select(&selector(r#"link[rel="manifest"]"#))
            .next()
            .is_some(),
        "No <link rel=\"manifest\"> found",
    ));

    checks.push(PageCheck::verdict(
        "themed-omnibox",
        "Page sets a theme color",
        document
            .select(&selector(r#"meta[name="theme-color"]"#))
            .next()
            .is_some(),
        "No <meta name=\"theme-color\"> found",
    ));

    checks.push(PageCheck::verdict(
        "viewport",
        "Viewport meta tag is present",
        has_viewport_meta(document),
        "No <meta name=\"viewport\"> found",
    ));

    checks.push(PageCheck::verdict(
        "pwa-https",
        "Page is served over HTTPS",
        url.starts_with("https://"),
        "Installability requires https",
    ));

    checks
}

/// Map a measured timing onto [0,1] between good and poor thresholds.
pub fn timing_score(value_ms: f64, good_ms: f64, poor_ms: f64) -> f64 {
    if value_ms <= good_ms {
        1.0
    } else if value_ms >= poor_ms {
        0.0
    } else {
        1.0 - (value_ms - good_ms) / (poor_ms - good_ms)
    }
}

/// Performance score from the collected page timings.
///
/// Timings of zero mean the event never fired during the audit and are
/// excluded; a page with no measured timings scores 0.
pub fn performance_score(timings: &PageTimings) -> f64 {
    let metrics = [
        (timings.first_contentful_paint, 1800.0, 6000.0),
        (timings.dom_content_loaded, 2500.0, 8000.0),
        (timings.load, 4000.0, 12000.0),
    ];

    let measured: Vec<f64> = metrics
        .iter()
        .filter(|(value, _, _)| *value > 0.0)
        .map(|(value, good, poor)| timing_score(*value, *good, *poor))
        .collect();

    if measured.is_empty() {
        return 0.0;
    }
    measured.iter().sum::<f64>() / measured.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <meta name="description" content="A well formed page">
  <meta name="theme-color" content="#336699">
  <link rel="canonical" href="https://example.com/">
  <link rel="manifest" href="/manifest.json">
  <title>Example</title>
</head>
<body>
  <h1>Example</h1>
  <img src="/hero.png" alt="Hero image">
  <a href="/about">About us</a>
  <label for="q">Search</label><input id="q" type="text">
</body>
</html>"##;

    #[test]
    fn test_well_formed_page_passes_everything() {
        let categories = run_page_checks(WELL_FORMED, "https://example.com/");
        for category in &categories {
            assert!(
                (category.score() - 1.0).abs() < f64::EPSILON,
                "{:?} scored {} with failures {:?}",
                category.category,
                category.score(),
                category
                    .checks
                    .iter()
                    .filter(|c| !c.passed)
                    .collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn test_missing_alt_fails_accessibility() {
        let html = r#"<html lang="en"><head><title>t</title>
            <meta name="viewport" content="w"></head>
            <body><img src="a.png"></body></html>"#;
        let document = Html::parse_document(html);
        let checks = accessibility_checks(&document);
        let alt = checks.iter().find(|c| c.id == "image-alt").unwrap();
        assert!(!alt.passed);
        assert!(alt.detail.as_deref().unwrap().contains("1 image(s)"));
    }

    #[test]
    fn test_unlabelled_input_fails() {
        let html = r#"<html><body><input type="text"></body></html>"#;
        let document = Html::parse_document(html);
        let checks = accessibility_checks(&document);
        assert!(!checks.iter().find(|c| c.id == "label").unwrap().passed);
    }

    #[test]
    fn test_hidden_inputs_need_no_label() {
        let html = r#"<html><body><input type="hidden" name="csrf"></body></html>"#;
        let document = Html::parse_document(html);
        let checks = accessibility_checks(&document);
        assert!(checks.iter().find(|c| c.id == "label").unwrap().passed);
    }

    #[test]
    fn test_noindex_fails_crawlable() {
        let html = r#"<html><head><meta name="robots" content="noindex, nofollow"></head></html>"#;
        let document = Html::parse_document(html);
        let checks = seo_checks(&document);
        assert!(
            !checks
                .iter()
                .find(|c| c.id == "is-crawlable")
                .unwrap()
                .passed
        );
    }

    #[test]
    fn test_http_page_fails_https_checks() {
        let categories = run_page_checks(WELL_FORMED, "http://example.com/");
        let best = categories
            .iter()
            .find(|c| c.category == Category::BestPractices)
            .unwrap();
        assert!(
            !best
                .checks
                .iter()
                .find(|c| c.id == "is-on-https")
                .unwrap()
                .passed
        );
    }

    #[test]
    fn test_mixed_content_detected() {
        let html = r#"<!DOCTYPE html><html><body>
            <img src="http://cdn.example.com/a.png" alt="a"></body></html>"#;
        let document = Html::parse_document(html);
        let checks = best_practice_checks(&document, html, "https://example.com/");
        let mixed = checks.iter().find(|c| c.id == "mixed-content").unwrap();
        assert!(!mixed.passed);
    }

    #[test]
    fn test_deprecated_elements_detected() {
        let html = "<!DOCTYPE html><html><body><marquee>hi</marquee></body></html>";
        let document = Html::parse_document(html);
        let checks = best_practice_checks(&document, html, "https://example.com/");
        assert!(
            !checks
                .iter()
                .find(|c| c.id == "deprecations")
                .unwrap()
                .passed
        );
    }

    #[test]
    fn test_category_score_is_pass_fraction() {
        let checks = CategoryChecks {
            category: Category::Seo,
            checks: vec![
                PageCheck::pass("a", "a"),
                PageCheck::pass("b", "b"),
                PageCheck::fail("c", "c", "nope"),
                PageCheck::fail("d", "d", "nope"),
            ],
        };
        assert!((checks.score() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_category_scores_zero() {
        let checks = CategoryChecks {
            category: Category::Pwa,
            checks: vec![],
        };
        assert_eq!(checks.score(), 0.0);
    }

    #[test]
    fn test_timing_score_bounds() {
        assert_eq!(timing_score(1000.0, 1800.0, 6000.0), 1.0);
        assert_eq!(timing_score(6000.0, 1800.0, 6000.0), 0.0);
        let mid = timing_score(3900.0, 1800.0, 6000.0);
        assert!(mid > 0.49 && mid < 0.51);
    }

    #[test]
    fn test_performance_score_skips_unmeasured() {
        let timings = PageTimings {
            first_contentful_paint: 1000.0,
            dom_content_loaded: 0.0,
            load: 0.0,
            ..Default::default()
        };
        assert_eq!(performance_score(&timings), 1.0);
    }

    #[test]
    fn test_performance_score_no_measurements() {
        assert_eq!(performance_score(&PageTimings::default()), 0.0);
    }

    #[test]
    fn test_category_serde_names_are_kebab_case() {
        let json = serde_json::to_string(&Category::BestPractices).unwrap();
        assert_eq!(json, "\"best-practices\"");
    }
}
