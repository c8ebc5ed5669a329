//! Issue-tracker comments and report email

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde_json::{json, Value};
use std::time::Duration;

use crate::audit::CategoryScores;
use crate::config::{JiraConfig, MailConfig};
use crate::http;
use crate::report::{percent, score_rows};

/// What a notification describes
#[derive(Debug, Clone)]
pub enum ReportKind {
    /// One audited page with its category scores
    Page { url: String, scores: CategoryScores },
    /// A sweep over many pages, from a sitemap or a configured list
    Sitemap {
        source: String,
        pages_audited: usize,
    },
}

/// Message body inputs, constructed fresh per send
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    pub kind: ReportKind,
    /// Shareable link to the uploaded archive
    pub link: String,
    pub generated_at: DateTime<Utc>,
}

/// Posts report comments on a fixed Jira issue.
pub struct JiraClient {
    agent: ureq::Agent,
    config: JiraConfig,
}

impl JiraClient {
    pub fn new(config: JiraConfig) -> Self {
        Self {
            agent: http::agent(Duration::from_secs(30)),
            config,
        }
    }

    /// Post the report comment on the configured issue.
    pub fn post_comment(&self, payload: &NotificationPayload) -> Result<()> {
        let url = format!(
            "{}/rest/api/3/issue/{}/comment",
            self.config.base_url, self.config.issue_key
        );
        let document = adf_comment(payload);

        self.agent
            .post(&url)
            .set(
                "Authorization",
                &basic_auth(&self.config.username, &self.config.api_token),
            )
            .set("Content-Type", "application/json")
            .send_string(&document.to_string())
            .map_err(http::read_error)
            .with_context(|| format!("Failed to post comment on {}", self.config.issue_key))?;

        Ok(())
    }
}

fn basic_auth(username: &str, token: &str) -> String {
    format!(
        "Basic {}",
        BASE64.encode(format!("{}:{}", username, token))
    )
}

/// Build the comment as an Atlassian document: a description paragraph, a
/// bold score line for single-page reports, and a hyperlink paragraph.
fn adf_comment(payload: &NotificationPayload) -> Value {
    let stamp = payload.generated_at.format("%Y-%m-%d %H:%M UTC");
    let mut content = Vec::new();

    match &payload.kind {
        ReportKind::Page { url, scores } => {
            content.push(paragraph(vec![text_node(&format!(
                "Site audit for {} completed {}.",
                url, stamp
            ))]));
            let line = score_rows(scores)
                .iter()
                .map(|(label, score)| format!("{}: {}", label, percent(*score)))
                .collect::<Vec<_>>()
                .join(" | ");
            content.push(paragraph(vec![strong_node(&line)]));
        }
        ReportKind::Sitemap {
            source,
            pages_audited,
        } => {
            content.push(paragraph(vec![text_node(&format!(
                "Site sweep of {} completed {}: {} page(s) audited.",
                source, stamp, pages_audited
            ))]));
        }
    }

    content.push(paragraph(vec![link_node(
        "Download the full report",
        &payload.link,
    )]));

    json!({
        "body": {
            "type": "doc",
            "version": 1,
            "content": content,
        }
    })
}

fn paragraph(children: Vec<Value>) -> Value {
    json!({ "type": "paragraph", "content": children })
}

fn text_node(text: &str) -> Value {
    json!({ "type": "text", "text": text })
}

fn strong_node(text: &str) -> Value {
    json!({ "type": "text", "text": text, "marks": [{ "type": "strong" }] })
}

fn link_node(text: &str, href: &str) -> Value {
    json!({
        "type": "text",
        "text": text,
        "marks": [{ "type": "link", "attrs": { "href": href } }],
    })
}

/// Sends the report summary email over SMTP/TLS.
pub struct Mailer {
    config: MailConfig,
}

impl Mailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    /// Send the summary to the configured recipient list.
    pub fn send(&self, payload: &NotificationPayload) -> Result<()> {
        let from: Mailbox = self
            .config
            .username
            .parse()
            .context("Invalid sender address")?;

        let mut builder = Message::builder().from(from).subject(subject(payload));
        for recipient in &self.config.recipients {
            let to: Mailbox = recipient
                .parse()
                .with_context(|| format!("Invalid recipient address: {}", recipient))?;
            builder = builder.to(to);
        }

        let message = builder
            .header(ContentType::TEXT_HTML)
            .body(email_body(payload))
            .context("Failed to build report email")?;

        let transport = SmtpTransport::relay(&self.config.smtp_host)
            .context("Failed to configure SMTP relay")?
            .credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
            .build();

        transport.send(&message).context("Failed to send email")?;
        Ok(())
    }
}

fn subject(payload: &NotificationPayload) -> String {
    format!(
        "Site audit report {}",
        payload.generated_at.format("%Y-%m-%d")
    )
}

/// HTML email body: a score table for single pages, sweep metadata
/// otherwise, always followed by the report link.
fn email_body(payload: &NotificationPayload) -> String {
    let stamp = payload.generated_at.format("%Y-%m-%d %H:%M UTC");
    let mut body = String::new();

    body.push_str("<h2>Site audit report</h2>\n");
    match &payload.kind {
        ReportKind::Page { url, scores } => {
            body.push_str(&format!(
                "<p>Audit of <strong>{}</strong>, generated {}.</p>\n",
                url, stamp
            ));
            body.push_str("<table border=\"1\" cellpadding=\"6\" cellspacing=\"0\">\n");
            body.push_str("<tr><th>Category</th><th>Score</th></tr>\n");
            for (label, score) in score_rows(scores) {
                body.push_str(&format!(
                    "<tr><td>{}</td><td align=\"right\">{}</td></tr>\n",
                    label,
                    percent(score)
                ));
            }
            body.push_str("</table>\n");
        }
        ReportKind::Sitemap {
            source,
            pages_audited,
        } => {
            body.push_str(&format!(
                "<p>Site sweep of <strong>{}</strong>, generated {}: {} page(s) audited.</p>\n",
                source, stamp, pages_audited
            ));
        }
    }
    body.push_str(&format!(
        "<p><a href=\"{}\">Download the full report</a></p>\n",
        payload.link
    ));
    body
}
