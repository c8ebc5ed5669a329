//! Report rendering, filenames, and the run summary

use colored::Colorize;
use std::path::PathBuf;

use crate::audit::{AuditResult, CategoryScores};

/// Stem of the report filename for a URL: every non-alphanumeric
/// character replaced with `_`.
pub fn sanitized_stem(url: &str) -> String {
    url.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Filename the HTML report for a URL is written under.
pub fn report_filename(url: &str) -> String {
    format!("{}.html", sanitized_stem(url))
}

/// Score displayed as a whole percentage, `score x 100`.
pub fn percent(score: f64) -> String {
    format!("{:.0}", score * 100.0)
}

fn html_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render the self-contained HTML report for one audit.
pub fn render_html(result: &AuditResult) -> String {
    let url = html_escape(&result.url);
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!("<title>Audit report: {}</title>\n", url));
    html.push_str("<style>\n");
    html.push_str(
        "body{font-family:-apple-system,Segoe UI,sans-serif;margin:2rem auto;max-width:56rem;\
         color:#1a1a2e;padding:0 1rem}\n\
         h1{font-size:1.4rem}\n\
         .meta{color:#666;font-size:0.85rem}\n\
         table{border-collapse:collapse;margin:1.5rem 0;width:100%}\n\
         th,td{border:1px solid #ddd;padding:0.5rem 0.75rem;text-align:left}\n\
         th{background:#f5f5f5}\n\
         .score{font-weight:bold;text-align:right}\n\
         li.pass{color:#1a7f37}\n\
         li.fail{color:#b42318}\n\
         li span.detail{color:#666;font-style:italic}\n",
    );
    html.push_str("</style>\n</head>\n<body>\n");

    html.push_str(&format!("<h1>Audit report: {}</h1>\n", url));
    html.push_str(&format!(
        "<p class=\"meta\">Generated {}</p>\n",
        result.fetched_at.to_rfc3339()
    ));

    html.push_str("<table>\n<tr><th>Category</th><th>Score</th></tr>\n");
    for (label, score) in score_rows(&result.scores) {
        html.push_str(&format!(
            "<tr><td>{}</td><td class=\"score\">{}</td></tr>\n",
            label,
            percent(score)
        ));
    }
    html.push_str("</table>\n");

    for category in &result.checks {
        html.push_str(&format!(
            "<h2>{} ({})</h2>\n<ul>\n",
            category.category.label(),
            percent(category.score())
        ));
        for check in &category.checks {
            let class = if check.passed { "pass" } else { "fail" };
            let marker = if check.passed { "&#10003;" } else { "&#10007;" };
            html.push_str(&format!(
                "<li class=\"{}\">{} {}",
                class,
                marker,
                html_escape(&check.label)
            ));
            if let Some(detail) = &check.detail {
                html.push_str(&format!(
                    " <span class=\"detail\">{}</span>",
                    html_escape(detail)
                ));
            }
            html.push_str("</li>\n");
        }
        html.push_str("</ul>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// Display order for score tables.
pub fn score_rows(scores: &CategoryScores) -> Vec<(&'static str, f64)> {
    vec![
        ("Performance", scores.performance),
        ("Accessibility", scores.accessibility),
        ("Best Practices", scores.best_practices),
        ("SEO", scores.seo),
        ("PWA", scores.pwa),
    ]
}

/// Outcome for a single audited URL
#[derive(Debug, Clone)]
pub struct PageOutcome {
    pub url: String,
    /// Report filename, when a report was written
    pub filename: Option<String>,
    pub scores: Option<CategoryScores>,
    pub error: Option<String>,
}

/// What one run produced
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub pages: Vec<PageOutcome>,
    pub archive: Option<PathBuf>,
    pub share_link: Option<String>,
    pub jira_posted: bool,
    pub email_sent: bool,
    /// Non-fatal step failures, logged but not aborting the run
    pub failures: Vec<String>,
}

impl RunSummary {
    /// URLs that produced a written report.
    pub fn audited(&self) -> usize {
        self.pages.iter().filter(|p| p.filename.is_some()).count()
    }

    /// URLs skipped for lack of a report body or an audit error.
    pub fn skipped(&self) -> usize {
        self.pages.len() - self.audited()
    }

    /// Print the colored end-of-run summary.
    pub fn print_summary(&self) {
        println!("\n{}", "Summary".yellow().bold());
        println!(
            "  Audited: {} | Skipped: {}",
            self.audited().to_string().green().bold(),
            self.skipped().to_string().yellow()
        );

        if !self.pages.is_empty() {
            println!(
                "\n  {:42} {:>5} {:>5} {:>5} {:>5} {:>5}",
                "URL".dimmed(),
                "Perf".dimmed(),
                "A11y".dimmed(),
                "BP".dimmed(),
                "SEO".dimmed(),
                "PWA".dimmed()
            );
            println!("  {}", "-".repeat(72).dimmed());
            for page in &self.pages {
                match &page.scores {
                    Some(scores) => println!(
                        "  {:42} {:>5} {:>5} {:>5} {:>5} {:>5}",
                        truncate(&page.url, 42),
                        percent(scores.performance),
                        percent(scores.accessibility),
                        percent(scores.best_practices),
                        percent(scores.seo),
                        percent(scores.pwa)
                    ),
                    None => println!(
                        "  {:42} {}",
                        truncate(&page.url, 42),
                        page.error.as_deref().unwrap_or("no report").red()
                    ),
                }
            }
        }

        if let Some(archive) = &self.archive {
            println!("\n  Archive: {}", archive.display().to_string().dimmed());
        }
        if let Some(link) = &self.share_link {
            println!("  Shared:  {}", link.cyan());
        }
        if self.jira_posted {
            println!("  {} Jira comment posted", "✓".green());
        }
        if self.email_sent {
            println!("  {} Report email sent", "✓".green());
        }

        if !self.failures.is_empty() {
            println!("\n{}", "Step failures".red().bold());
            for failure in &self.failures {
                println!("  {} {}", "✗".red(), failure);
            }
        }
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}
