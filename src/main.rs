use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing env file is fine: configuration may come straight from
    // the process environment.
    let _ = dotenvy::from_path(&cli.env_file);

    let mut config = site_audit::Config::from_env()?;
    if let Some(results_dir) = cli.results_dir {
        config.results_dir = results_dir;
    }
    if let Some(archive) = cli.archive {
        config.archive_path = archive;
    }

    if let Some(html) = cli.pdf {
        let out = cli
            .pdf_out
            .unwrap_or_else(|| html.with_extension("pdf"));
        let session = site_audit::BrowserSession::launch(config.browser_port)?;
        site_audit::render_pdf(&session, &html, &out)?;
        session.close();
        println!("{} Rendered {}", "✓".green(), out.display());
        return Ok(());
    }

    let summary = site_audit::run(config)?;
    summary.print_summary();

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "site-audit",
    about = "Audit configured URLs in a headless browser and distribute the report",
    version,
)]
struct Cli {
    /// Env file holding the run configuration
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,
    /// Override the results directory
    #[arg(long)]
    results_dir: Option<PathBuf>,
    /// Override the archive destination
    #[arg(long)]
    archive: Option<PathBuf>,
    /// Render an existing HTML report to PDF and exit
    #[arg(long, value_name = "HTML")]
    pdf: Option<PathBuf>,
    /// PDF output path, defaults to the report path with a .pdf extension
    #[arg(long, value_name = "PDF", requires = "pdf")]
    pdf_out: Option<PathBuf>,
}
