mod archive;
mod audit;
mod browser;
mod checks;
mod config;
mod http;
mod notify;
mod orchestrator;
mod report;
mod upload;

pub use archive::{render_pdf, zip_directory};
pub use audit::{AuditOptions, AuditResult, AuditRunner, CategoryScores, ReportOutput};
pub use browser::BrowserSession;
pub use config::Config;
pub use orchestrator::Orchestrator;
pub use report::{report_filename, RunSummary};

use anyhow::Result;
use colored::Colorize;

/// Run a full audit pass with the given configuration.
pub fn run(config: Config) -> Result<RunSummary> {
    println!(
        "{} Starting site audit ({} configured URL(s))",
        ">>".yellow(),
        config.urls.len().to_string().cyan().bold()
    );

    let orchestrator = Orchestrator::new(config);
    let summary = orchestrator.run()?;

    println!("\n{}", "=".repeat(60).dimmed());
    println!("{}", "AUDIT RESULTS".green().bold());
    println!("{}", "=".repeat(60).dimmed());

    Ok(summary)
}
