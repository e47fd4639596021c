// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Release check against the GitHub releases API, and in-place upgrade of
//! the running binary after the user confirms.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::render::Renderer;

/// Latest-release endpoint for the published client.
pub const RELEASES_URL: &str =
    "https://api.github.com/repos/Astelta/parkchat-client/releases/latest";

/// Source checkout, for platforms without a published binary.
pub const SOURCE_URL: &str = "https://github.com/Astelta/parkchat-client";

/// Version tag of the running binary.
pub const CURRENT_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

/// Upper bound on fetching the release feed.
const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on downloading a release binary.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseInfo {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    Latest(String),
    Available { tag: String, download_url: Option<String> },
}

impl UpdateStatus {
    /// Text shown to the user before any question is asked.
    pub fn describe(&self, current: &str) -> String {
        match self {
            Self::Latest(tag) => format!("You have the latest version: {tag}"),
            Self::Available { tag, .. } => {
                format!("Your version is: {current}\nThere is a newer version you can upgrade to: {tag}")
            }
        }
    }
}

/// Result of a `/update` conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Nothing changed on disk; the session carries on.
    Unchanged,
    /// The binary was replaced; the client should exit.
    Installed,
}

/// Compare `release` against `current` and pick the asset built for `os`.
pub fn evaluate(release: &ReleaseInfo, current: &str, os: &str) -> UpdateStatus {
    if release.tag_name == current {
        return UpdateStatus::Latest(release.tag_name.clone());
    }
    let aliases = os_aliases(os);
    let download_url = release
        .assets
        .iter()
        .find(|asset| {
            let name = asset.name.to_lowercase();
            aliases.iter().any(|alias| name.contains(alias))
        })
        .map(|asset| asset.browser_download_url.clone());
    UpdateStatus::Available { tag: release.tag_name.clone(), download_url }
}

fn os_aliases(os: &str) -> Vec<String> {
    let os = os.to_lowercase();
    match os.as_str() {
        "macos" => vec![os, "darwin".to_owned()],
        _ => vec![os],
    }
}

/// `Y`/`N` answer to the upgrade question, case-insensitive. Anything else
/// is `None` and the question is asked again.
pub fn parse_answer(line: &str) -> Option<bool> {
    match line.trim() {
        "Y" | "y" => Some(true),
        "N" | "n" => Some(false),
        _ => None,
    }
}

/// Where a downloaded release is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallTarget {
    /// The executable of this process.
    RunningBinary,
    /// A plain file path, replaced by rename.
    File(PathBuf),
}

/// HTTP client for the release check and download.
pub struct UpdateChecker {
    client: reqwest::Client,
    url: String,
    current: String,
    target: InstallTarget,
}

impl UpdateChecker {
    pub fn new(url: impl Into<String>) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("parkchat/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CHECK_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            current: CURRENT_VERSION.to_owned(),
            target: InstallTarget::RunningBinary,
        })
    }

    /// Checker for the published release feed.
    pub fn github() -> reqwest::Result<Self> {
        Self::new(RELEASES_URL)
    }

    /// Install downloads into `path` instead of over the running binary.
    pub fn install_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.target = InstallTarget::File(path.into());
        self
    }

    /// Compare releases against `version` instead of the compiled-in one.
    pub fn with_current(mut self, version: impl Into<String>) -> Self {
        self.current = version.into();
        self
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Fetch the latest release and compare it with the running version.
    pub async fn check(&self) -> anyhow::Result<UpdateStatus> {
        let resp = self.client.get(&self.url).timeout(CHECK_TIMEOUT).send().await?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("release feed returned {status}");
        }
        let release: ReleaseInfo = resp.json().await?;
        Ok(evaluate(&release, &self.current, std::env::consts::OS))
    }

    /// Download the binary at `url` and put it in place of the install target.
    pub async fn install(&self, url: &str) -> anyhow::Result<()> {
        let body = self.download(url).await?;
        let target = self.target.clone();
        tokio::task::spawn_blocking(move || replace_binary(&target, &body)).await?
    }

    async fn download(&self, url: &str) -> anyhow::Result<bytes::Bytes> {
        let resp = self.client.get(url).timeout(DOWNLOAD_TIMEOUT).send().await?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("download returned {status}");
        }
        let body = resp.bytes().await?;
        if body.is_empty() {
            anyhow::bail!("download was empty");
        }
        Ok(body)
    }
}

/// Stage `body` next to the destination, then swap it in.
fn replace_binary(target: &InstallTarget, body: &[u8]) -> anyhow::Result<()> {
    let dest = match target {
        InstallTarget::RunningBinary => std::env::current_exe()?,
        InstallTarget::File(path) => path.clone(),
    };
    let staged = staging_path(&dest);
    std::fs::write(&staged, body)?;
    let replaced = make_executable(&staged).and_then(|()| match target {
        InstallTarget::RunningBinary => self_replace::self_replace(&staged),
        InstallTarget::File(path) => std::fs::rename(&staged, path),
    });
    if staged.exists() {
        let _ = std::fs::remove_file(&staged);
    }
    replaced?;
    Ok(())
}

fn staging_path(dest: &Path) -> PathBuf {
    let name = format!(
        "{}.{}.download",
        dest.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
    );
    dest.with_file_name(name)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Run the `/update` conversation: check, ask `Y/N` until answered, then
/// download and install. Answers are read from `lines`.
pub async fn confirm_and_install(
    checker: &UpdateChecker,
    renderer: &Renderer,
    lines: &mut mpsc::Receiver<String>,
) -> UpdateOutcome {
    let status = match checker.check().await {
        Ok(status) => status,
        Err(e) => {
            warn!(err = %e, "update check failed");
            renderer.notice(&format!("❌ Update check failed: {e}"));
            return UpdateOutcome::Unchanged;
        }
    };
    renderer.notice(&status.describe(checker.current()));
    let UpdateStatus::Available { tag, download_url } = status else {
        return UpdateOutcome::Unchanged;
    };

    loop {
        renderer.ask("Do you want to upgrade? (Y/N): ");
        let Some(line) = lines.recv().await else {
            return UpdateOutcome::Unchanged;
        };
        match parse_answer(&line) {
            Some(true) => break,
            Some(false) => {
                renderer.notice("Sure thing boss!");
                return UpdateOutcome::Unchanged;
            }
            None => renderer.notice("I'm not sure what you are trying to do..."),
        }
    }

    let Some(url) = download_url else {
        renderer.notice(&format!(
            "I couldn't find a binary for your platform. Try compiling the source code from: {SOURCE_URL}"
        ));
        return UpdateOutcome::Unchanged;
    };

    renderer.notice("Updating...");
    match checker.install(&url).await {
        Ok(()) => {
            info!(%tag, "binary replaced");
            renderer.notice("Update complete! The app will close now.");
            UpdateOutcome::Installed
        }
        Err(e) => {
            warn!(err = %e, %tag, "update failed");
            renderer.notice(&format!("❌ Update failed: {e}"));
            UpdateOutcome::Unchanged
        }
    }
}

#[cfg(test)]
#[path = "update_tests.rs"]
mod tests;
