//! Repository URL and revision from `git`.

use super::Tool;
use crate::error::{AppError, Result};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Rewrite `git@host:owner/repo` to `https://host/owner/repo`
pub fn normalize_repository_url(url: &str) -> String {
    let url = url.trim();
    match url.strip_prefix("git@") {
        Some(rest) => format!("https://{}", rest.replacen(':', "/", 1)),
        None => url.to_string(),
    }
}

/// Remote URL of `origin`, else of the first listed remote
pub async fn repository_url(repo: &Path, cancel: &CancellationToken) -> Result<Option<String>> {
    let git = Tool::locate("git")?;

    if let Ok(url) = git
        .stdout(["config", "--get", "remote.origin.url"], Some(repo), cancel)
        .await
        && !url.is_empty()
    {
        return Ok(Some(normalize_repository_url(&url)));
    }

    let remotes = match git.stdout(["remote"], Some(repo), cancel).await {
        Ok(remotes) => remotes,
        Err(AppError::Cancelled) => return Err(AppError::Cancelled),
        Err(e) => {
            log::debug!("Unable to list git remotes: {}", e);
            return Ok(None);
        }
    };
    let Some(first) = remotes.lines().map(str::trim).find(|r| !r.is_empty()) else {
        return Ok(None);
    };

    let key = format!("remote.{first}.url");
    match git.stdout(["config", "--get", &key], Some(repo), cancel).await {
        Ok(url) if !url.is_empty() => Ok(Some(normalize_repository_url(&url))),
        Ok(_) => Ok(None),
        Err(AppError::Cancelled) => Err(AppError::Cancelled),
        Err(e) => {
            log::debug!("Unable to read URL of remote {}: {}", first, e);
            Ok(None)
        }
    }
}

/// `HEAD` commit hash
pub async fn revision(repo: &Path, cancel: &CancellationToken) -> Result<Option<String>> {
    let git = Tool::locate("git")?;
    match git.stdout(["rev-parse", "HEAD"], Some(repo), cancel).await {
        Ok(sha) if !sha.is_empty() => Ok(Some(sha)),
        Ok(_) => Ok(None),
        Err(AppError::Cancelled) => Err(AppError::Cancelled),
        Err(e) => {
            log::debug!("Unable to read HEAD revision: {}", e);
            Ok(None)
        }
    }
}
