use anyhow::{Context, Result, bail};
use grant_gun::links::PaymentLinkOpener;
use reqwest::Url;
use std::process::{Command, Stdio};

/// Opens URLs with the platform's default browser.
#[derive(Debug, Default)]
pub struct BrowserOpener;

fn open_command(url: &str) -> Command {
    if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.arg(url);
        command
    } else if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]).arg(url);
        command
    } else {
        let mut command = Command::new("xdg-open");
        command.arg(url);
        command
    }
}

impl PaymentLinkOpener for BrowserOpener {
    fn open(&mut self, url: &Url) -> Result<()> {
        let mut command = open_command(url.as_str());
        let program = command.get_program().to_string_lossy().into_owned();
        let status = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("failed to run {program}"))?;

        if !status.success() {
            bail!("{program} failed (exit {})", status.code().unwrap_or(-1));
        }
        Ok(())
    }
}

/// Open `url` in the browser, or print it when that is not possible.
pub fn open_or_print(url: &Url) {
    println!("   {url}");
    if let Err(error) = BrowserOpener.open(url) {
        tracing::warn!("Could not open a browser: {error:#}");
        println!("   Please open the URL above manually.");
    }
}
