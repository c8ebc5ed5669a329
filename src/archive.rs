//! Results packaging: zip archive and PDF rendering

use anyhow::{Context, Result};
use headless_chrome::types::PrintToPdfOptions;
use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::browser::BrowserSession;

/// A4 paper, in inches
const PDF_PAPER_WIDTH_IN: f64 = 8.27;
const PDF_PAPER_HEIGHT_IN: f64 = 11.69;

/// Recursively compress a directory into a zip archive at maximum
/// compression. The archive is complete once this returns; write errors
/// propagate and leave whatever was flushed on disk.
pub fn zip_directory(src: &Path, dest: &Path) -> Result<()> {
    anyhow::ensure!(
        src.is_dir(),
        "Archive source is not a directory: {}",
        src.display()
    );

    let file = fs::File::create(dest)
        .with_context(|| format!("Failed to create archive {}", dest.display()))?;
    let mut writer = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    for entry in WalkDir::new(src).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        let relative = path.strip_prefix(src)?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let name = relative.to_string_lossy().replace('\\', "/");

        if path.is_dir() {
            writer
                .add_directory(name, options)
                .context("Failed to add directory to archive")?;
        } else {
            writer
                .start_file(name, options)
                .with_context(|| format!("Failed to start archive entry {}", path.display()))?;
            let mut input = fs::File::open(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            io::copy(&mut input, &mut writer)
                .with_context(|| format!("Failed to compress {}", path.display()))?;
        }
    }

    writer.finish().context("Failed to finalize archive")?;
    Ok(())
}

/// `file://` URL for an existing HTML report. A missing input file is a
/// fatal error.
fn file_url(html_path: &Path) -> Result<String> {
    anyhow::ensure!(
        html_path.is_file(),
        "HTML report not found: {}",
        html_path.display()
    );
    let absolute = html_path
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", html_path.display()))?;
    Ok(format!("file://{}", absolute.display()))
}

/// Load an HTML report into a page and print it to an A4 PDF.
pub fn render_pdf(session: &BrowserSession, html_path: &Path, pdf_path: &Path) -> Result<()> {
    let url = file_url(html_path)?;

    let tab = session
        .handle()
        .new_tab()
        .context("Failed to open a browser tab")?;
    tab.navigate_to(&url)
        .with_context(|| format!("Failed to load {}", url))?;
    tab.wait_until_navigated()
        .context("Report page did not finish loading")?;

    let pdf = tab
        .print_to_pdf(Some(PrintToPdfOptions {
            print_background: Some(true),
            paper_width: Some(PDF_PAPER_WIDTH_IN),
            paper_height: Some(PDF_PAPER_HEIGHT_IN),
            ..Default::default()
        }))
        .context("Failed to print page to PDF")?;
    let _ = tab.close(false);

    fs::write(pdf_path, pdf)
        .with_context(|| format!("Failed to write PDF {}", pdf_path.display()))?;
    Ok(())
}
