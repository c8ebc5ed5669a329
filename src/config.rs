//! Run configuration loaded from environment-style key/value pairs

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Default Chromium remote-debugging port
pub const DEFAULT_BROWSER_PORT: u16 = 9222;

/// Default SMTP relay host
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// Complete configuration for one audit run
#[derive(Debug, Clone)]
pub struct Config {
    /// Target URLs, in input order
    pub urls: Vec<String>,
    /// Optional sitemap to expand into additional targets
    pub sitemap_url: Option<String>,
    /// Directory receiving the generated reports
    pub results_dir: PathBuf,
    /// Destination of the zipped results
    pub archive_path: PathBuf,
    /// Remote-debugging port the browser is launched on
    pub browser_port: u16,
    /// Google Drive upload credentials, when configured
    pub drive: Option<DriveConfig>,
    /// Jira comment credentials, when configured
    pub jira: Option<JiraConfig>,
    /// Mail transport credentials, when configured
    pub mail: Option<MailConfig>,
}

/// OAuth refresh-token credentials for Google Drive
#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub refresh_token: String,
}

/// Basic-auth credentials and target issue for Jira comments
#[derive(Debug, Clone)]
pub struct JiraConfig {
    /// Base URL of the Jira site, e.g. `https://example.atlassian.net`
    pub base_url: String,
    pub username: String,
    pub api_token: String,
    /// Issue the report comment is posted on
    pub issue_key: String,
}

/// SMTP account and recipient list
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub username: String,
    pub password: String,
    /// Recipient addresses, in input order
    pub recipients: Vec<String>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through a key lookup function.
    ///
    /// Keys with empty or whitespace-only values count as absent. A
    /// credential group becomes available only when every one of its keys
    /// is present.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let urls = get("URLS_TO_EVALUATE")
            .map(|raw| split_list(&raw))
            .unwrap_or_default();

        let results_dir = get("RESULTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("results"));

        let archive_path = get("ARCHIVE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("results.zip"));

        let browser_port = match get("BROWSER_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("Invalid BROWSER_PORT value: {}", raw))?,
            None => DEFAULT_BROWSER_PORT,
        };

        let drive = match (
            get("GOOGLE_CLIENT_ID"),
            get("GOOGLE_CLIENT_SECRET"),
            get("GOOGLE_REDIRECT_URI"),
            get("GOOGLE_REFRESH_TOKEN"),
        ) {
            (Some(client_id), Some(client_secret), Some(redirect_uri), Some(refresh_token)) => {
                Some(DriveConfig {
                    client_id,
                    client_secret,
                    redirect_uri,
                    refresh_token,
                })
            }
            _ => None,
        };

        let jira = match (
            get("JIRA_BASE_URL"),
            get("JIRA_USERNAME"),
            get("JIRA_API_TOKEN"),
            get("JIRA_ISSUE_KEY"),
        ) {
            (Some(base_url), Some(username), Some(api_token), Some(issue_key)) => Some(JiraConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                username,
                api_token,
                issue_key,
            }),
            _ => None,
        };

        let mail = match (
            get("MAIL_USERNAME"),
            get("MAIL_PASSWORD"),
            get("MAIL_RECIPIENTS"),
        ) {
            (Some(username), Some(password), Some(recipients)) => Some(MailConfig {
                smtp_host: get("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
                username,
                password,
                recipients: split_list(&recipients),
            }),
            _ => None,
        };

        Ok(Self {
            urls,
            sitemap_url: get("SITEMAP_URL"),
            results_dir,
            archive_path,
            browser_port,
            drive,
            jira,
            mail,
        })
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
