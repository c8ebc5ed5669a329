//! Run orchestration: clear, audit, package, upload, notify

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::archive;
use crate::audit::{AuditOptions, AuditResult, AuditRunner};
use crate::browser::BrowserSession;
use crate::config::Config;
use crate::http;
use crate::notify::{JiraClient, Mailer, NotificationPayload, ReportKind};
use crate::report::{self, PageOutcome, RunSummary};
use crate::upload::DriveClient;

/// Drives one audit run end to end.
pub struct Orchestrator {
    config: Config,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Execute the run.
    ///
    /// Per-URL audit failures and remote-call failures are recorded in the
    /// summary and the run continues; browser launch and archive errors
    /// abort.
    pub fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        let mut urls = self.config.urls.clone();
        if let Some(sitemap) = &self.config.sitemap_url {
            println!("{} Fetching sitemap {}", ">>".yellow(), sitemap.cyan());
            match fetch_sitemap_urls(sitemap) {
                Ok(found) => {
                    println!("  {} {} URL(s) from sitemap", "✓".green(), found.len());
                    urls.extend(found);
                }
                Err(e) => {
                    println!("  {} Sitemap fetch failed: {:#}", "!".yellow(), e);
                    summary.failures.push(format!("sitemap fetch: {:#}", e));
                }
            }
        }

        if urls.is_empty() {
            println!("{} No URLs configured, nothing to audit", "!".yellow());
            return Ok(summary);
        }

        prepare_results_dir(&self.config.results_dir)?;

        println!(
            "{} Launching browser on port {}",
            ">>".yellow(),
            self.config.browser_port
        );
        let session = BrowserSession::launch(self.config.browser_port)?;
        let runner = AuditRunner::new(&session);
        let options = AuditOptions::default();

        for (i, url) in urls.iter().enumerate() {
            println!(
                "\n{} Auditing {}/{}: {}",
                "▶".cyan(),
                i + 1,
                urls.len(),
                url.white().bold()
            );

            match runner.run(url, &options) {
                Ok(result) => match &result.report {
                    Some(body) => {
                        let filename = report::report_filename(url);
                        let path = self.config.results_dir.join(&filename);
                        fs::write(&path, body).with_context(|| {
                            format!("Failed to write report {}", path.display())
                        })?;
                        write_scores_json(&self.config.results_dir, &result)?;
                        println!("  {} Saved {}", "✓".green(), filename.dimmed());
                        summary.pages.push(PageOutcome {
                            url: url.clone(),
                            filename: Some(filename),
                            scores: Some(result.scores),
                            error: None,
                        });
                    }
                    None => {
                        println!("  {} No report generated", "!".yellow());
                        summary.pages.push(PageOutcome {
                            url: url.clone(),
                            filename: None,
                            scores: None,
                            error: Some("no report generated".to_string()),
                        });
                    }
                },
                Err(e) => {
                    println!("  {} Audit failed: {:#}", "✗".red(), e);
                    summary.pages.push(PageOutcome {
                        url: url.clone(),
                        filename: None,
                        scores: None,
                        error: Some(format!("{:#}", e)),
                    });
                }
            }
        }

        session.close();

        if summary.audited() == 0 {
            println!("\n{} No reports produced, skipping packaging", "!".yellow());
            return Ok(summary);
        }

        println!(
            "\n{} Packaging {}",
            ">>".yellow(),
            self.config.archive_path.display()
        );
        archive::zip_directory(&self.config.results_dir, &self.config.archive_path)?;
        summary.archive = Some(self.config.archive_path.clone());

        let generated_at = Utc::now();
        let link = self.upload_archive(&mut summary);

        match link {
            Some(link) => {
                summary.share_link = Some(link.clone());
                let payload = self.notification_payload(&summary, link, generated_at);
                self.send_notifications(&payload, &mut summary);
            }
            None => {
                println!("{} No shareable link, skipping notifications", "!".yellow());
            }
        }

        Ok(summary)
    }

    fn upload_archive(&self, summary: &mut RunSummary) -> Option<String> {
        let drive_config = match &self.config.drive {
            Some(config) => config.clone(),
            None => {
                println!("{} Drive credentials absent, skipping upload", "!".yellow());
                return None;
            }
        };

        println!("{} Uploading archive to Drive", ">>".yellow());
        let client = DriveClient::new(drive_config);
        match client.upload(&self.config.archive_path) {
            Ok(link) => {
                println!("  {} {}", "✓".green(), link.cyan());
                Some(link)
            }
            Err(e) => {
                println!("  {} Upload failed: {:#}", "✗".red(), e);
                summary.failures.push(format!("upload: {:#}", e));
                None
            }
        }
    }

    /// One notification per run: the page variant for a single audited
    /// URL, the sweep variant for sitemap runs and multi-URL lists.
    fn notification_payload(
        &self,
        summary: &RunSummary,
        link: String,
        generated_at: DateTime<Utc>,
    ) -> NotificationPayload {
        let audited: Vec<&PageOutcome> = summary
            .pages
            .iter()
            .filter(|p| p.filename.is_some())
            .collect();

        let kind = if let Some(sitemap) = &self.config.sitemap_url {
            ReportKind::Sitemap {
                source: sitemap.clone(),
                pages_audited: audited.len(),
            }
        } else if let [page] = audited.as_slice() {
            match page.scores {
                Some(scores) => ReportKind::Page {
                    url: page.url.clone(),
                    scores,
                },
                None => ReportKind::Sitemap {
                    source: "configured URL list".to_string(),
                    pages_audited: audited.len(),
                },
            }
        } else {
            ReportKind::Sitemap {
                source: "configured URL list".to_string(),
                pages_audited: audited.len(),
            }
        };

        NotificationPayload {
            kind,
            link,
            generated_at,
        }
    }

    fn send_notifications(&self, payload: &NotificationPayload, summary: &mut RunSummary) {
        match &self.config.jira {
            Some(jira_config) => {
                println!("{} Posting Jira comment", ">>".yellow());
                let client = JiraClient::new(jira_config.clone());
                match client.post_comment(payload) {
                    Ok(()) => {
                        println!("  {} Comment posted on {}", "✓".green(), jira_config.issue_key);
                        summary.jira_posted = true;
                    }
                    Err(e) => {
                        println!("  {} Jira comment failed: {:#}", "✗".red(), e);
                        summary.failures.push(format!("jira comment: {:#}", e));
                    }
                }
            }
            None => println!("{} Jira credentials absent, skipping comment", "!".yellow()),
        }

        match &self.config.mail {
            Some(mail_config) => {
                println!("{} Sending report email", ">>".yellow());
                let mailer = Mailer::new(mail_config.clone());
                match mailer.send(payload) {
                    Ok(()) => {
                        println!(
                            "  {} Sent to {} recipient(s)",
                            "✓".green(),
                            mail_config.recipients.len()
                        );
                        summary.email_sent = true;
                    }
                    Err(e) => {
                        println!("  {} Email failed: {:#}", "✗".red(), e);
                        summary.failures.push(format!("email: {:#}", e));
                    }
                }
            }
            None => println!("{} Mail credentials absent, skipping email", "!".yellow()),
        }
    }
}

/// Ensure the results directory exists and delete previous `.html`
/// reports, leaving every other file in place.
fn prepare_results_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create results directory {}", dir.display()))?;
        println!("{} Created results directory", "✓".green());
        return Ok(());
    }

    let mut removed = 0;
    for entry in
        fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("html") {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            removed += 1;
        }
    }
    if removed > 0 {
        println!("{} Removed {} previous report(s)", "✓".green(), removed);
    }
    Ok(())
}

/// Persist the audit's scores and checks next to the HTML report.
fn write_scores_json(dir: &Path, result: &AuditResult) -> Result<()> {
    let path = dir.join(format!("{}.json", report::sanitized_stem(&result.url)));
    let json = serde_json::to_string_pretty(result).context("Failed to serialize audit result")?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Download a sitemap and extract its `<loc>` entries.
fn fetch_sitemap_urls(url: &str) -> Result<Vec<String>> {
    let body = http::agent(Duration::from_secs(30))
        .get(url)
        .call()
        .map_err(http::read_error)
        .with_context(|| format!("Failed to fetch sitemap {}", url))?
        .into_string()
        .context("Failed to read sitemap body")?;
    Ok(parse_sitemap(&body))
}

fn parse_sitemap(xml: &str) -> Vec<String> {
    let loc = Regex::new(r"<loc>\s*([^<]+?)\s*</loc>").expect("valid regex");
    loc.captures_iter(xml)
        .map(|capture| capture[1].replace("&amp;", "&"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::CategoryScores;
    use std::collections::HashMap;

    fn config_from(entries: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(move |key| map.get(key).cloned()).unwrap()
    }

    fn outcome(url: &str, audited: bool) -> PageOutcome {
        PageOutcome {
            url: url.to_string(),
            filename: audited.then(|| report::report_filename(url)),
            scores: audited.then(CategoryScores::default),
            error: (!audited).then(|| "no report generated".to_string()),
        }
    }

    #[test]
    fn test_prepare_results_dir_creates_missing() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("results");
        prepare_results_dir(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_prepare_results_dir_clears_only_html() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().to_path_buf();
        fs::write(dir.join("old.html"), "x").unwrap();
        fs::write(dir.join("keep.txt"), "x").unwrap();
        fs::write(dir.join("scores.json"), "{}").unwrap();

        prepare_results_dir(&dir).unwrap();

        assert!(!dir.join("old.html").exists());
        assert!(dir.join("keep.txt").exists());
        assert!(dir.join("scores.json").exists());
    }

    #[test]
    fn test_parse_sitemap_extracts_locs_in_order() {
        let xml = r#"<?xml version="1.0"?>
            <urlset>
              <url><loc>https://a.com/</loc></url>
              <url><loc> https://a.com/about </loc></url>
              <url><loc>https://a.com/?x=1&amp;y=2</loc></url>
            </urlset>"#;
        assert_eq!(
            parse_sitemap(xml),
            vec![
                "https://a.com/",
                "https://a.com/about",
                "https://a.com/?x=1&y=2"
            ]
        );
    }

    #[test]
    fn test_parse_sitemap_empty_document() {
        assert!(parse_sitemap("<urlset></urlset>").is_empty());
    }

    #[test]
    fn test_write_scores_json_uses_spec_keys() {
        let temp = tempfile::tempdir().unwrap();
        let result = AuditResult {
            url: "https://a.com".to_string(),
            fetched_at: Utc::now(),
            scores: CategoryScores {
                best_practices: 0.5,
                ..Default::default()
            },
            timings: Default::default(),
            checks: vec![],
            report: None,
        };

        write_scores_json(temp.path(), &result).unwrap();

        let raw = fs::read_to_string(temp.path().join("https___a_com.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["scores"]["best-practices"], 0.5);
    }

    #[test]
    fn test_single_page_run_notifies_page_variant() {
        let orchestrator = Orchestrator::new(config_from(&[(
            "URLS_TO_EVALUATE",
            "https://a.com",
        )]));
        let summary = RunSummary {
            pages: vec![outcome("https://a.com", true)],
            ..Default::default()
        };

        let payload =
            orchestrator.notification_payload(&summary, "https://link".to_string(), Utc::now());
        assert!(matches!(payload.kind, ReportKind::Page { .. }));
    }

    #[test]
    fn test_multi_page_run_notifies_sweep_variant() {
        let orchestrator = Orchestrator::new(config_from(&[(
            "URLS_TO_EVALUATE",
            "https://a.com,https://b.com",
        )]));
        let summary = RunSummary {
            pages: vec![outcome("https://a.com", true), outcome("https://b.com", true)],
            ..Default::default()
        };

        let payload =
            orchestrator.notification_payload(&summary, "https://link".to_string(), Utc::now());
        match payload.kind {
            ReportKind::Sitemap {
                source,
                pages_audited,
            } => {
                assert_eq!(source, "configured URL list");
                assert_eq!(pages_audited, 2);
            }
            other => panic!("expected sweep variant, got {:?}", other),
        }
    }

    #[test]
    fn test_sitemap_run_notifies_sitemap_source() {
        let orchestrator = Orchestrator::new(config_from(&[(
            "SITEMAP_URL",
            "https://a.com/sitemap.xml",
        )]));
        let summary = RunSummary {
            pages: vec![outcome("https://a.com/", true), outcome("https://a.com/x", false)],
            ..Default::default()
        };

        let payload =
            orchestrator.notification_payload(&summary, "https://link".to_string(), Utc::now());
        match payload.kind {
            ReportKind::Sitemap {
                source,
                pages_audited,
            } => {
                assert_eq!(source, "https://a.com/sitemap.xml");
                assert_eq!(pages_audited, 1);
            }
            other => panic!("expected sitemap variant, got {:?}", other),
        }
    }
}
