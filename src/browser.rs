//! Headless browser lifecycle management

use anyhow::{Context, Result};
use colored::Colorize;
use headless_chrome::{Browser, LaunchOptions};
use std::ffi::OsStr;
use std::time::Duration;

/// Flags the browser is always launched with
const BROWSER_FLAGS: &[&str] = &["--show-paint-rects", "--hide-scrollbars"];

/// How long an idle browser is kept alive before the handle gives up on it
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// A launched headless Chromium instance.
///
/// The session owns the browser process: dropping it on any exit path,
/// including early error returns, terminates the process. One session is
/// launched per run.
pub struct BrowserSession {
    browser: Browser,
    port: u16,
}

impl BrowserSession {
    /// Launch headless Chromium on the given remote-debugging port.
    ///
    /// A launch failure is fatal to the run and propagates to the caller.
    pub fn launch(port: u16) -> Result<Self> {
        let args: Vec<&OsStr> = BROWSER_FLAGS.iter().map(OsStr::new).collect();

        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .port(Some(port))
            .args(args)
            .idle_browser_timeout(IDLE_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid browser launch options: {}", e))?;

        let browser = Browser::new(options).context("Failed to launch headless browser")?;

        Ok(Self { browser, port })
    }

    /// The live browser handle.
    pub fn handle(&self) -> &Browser {
        &self.browser
    }

    /// Remote-debugging port the browser listens on.
    pub fn debug_port(&self) -> u16 {
        self.port
    }

    /// HTTP endpoint of the DevTools interface.
    pub fn endpoint(&self) -> String {
        endpoint_url(self.port)
    }

    /// Shut the browser down.
    ///
    /// Equivalent to dropping the session; kept explicit so the normal exit
    /// path reads as a deliberate release.
    pub fn close(self) {
        println!("{} Browser closed", "✓".green());
    }
}

/// DevTools HTTP endpoint for a debugging port.
pub fn endpoint_url(port: u16) -> String {
    format!("http://127.0.0.1:{}", port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_format() {
        assert_eq!(endpoint_url(9222), "http://127.0.0.1:9222");
        assert_eq!(endpoint_url(0), "http://127.0.0.1:0");
    }

    #[test]
    fn test_fixed_flag_set_includes_paint_rects() {
        assert!(BROWSER_FLAGS.contains(&"--show-paint-rects"));
    }
}
