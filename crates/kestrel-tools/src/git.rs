use std::path::Path;
use std::process::Stdio;

use schemars::JsonSchema;
use serde::Deserialize;
use tokio::process::Command;

use crate::executor::{ToolError, ToolResult};

const DEFAULT_LOG_COUNT: usize = 10;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GitStatusParams {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GitDiffParams {
    /// Show staged changes instead of the working tree
    #[serde(default)]
    pub staged: bool,
    /// Limit the diff to one path
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GitLogParams {
    /// Number of commits (default: 10)
    pub count: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GitCommitParams {
    /// Commit message
    pub message: String,
}

async fn git(cwd: &Path, args: &[&str]) -> Result<String, ToolError> {
    let subcommand = args.first().copied().unwrap_or_default();
    tracing::debug!(?args, cwd = %cwd.display(), "running git");

    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(ToolError::Spawn)?;

    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
    if stderr.to_lowercase().contains("not a git repository") {
        return Err(ToolError::NotFound {
            what: "Git repository",
            path: cwd.display().to_string(),
        });
    }
    let message = if stderr.is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_owned()
    } else {
        stderr
    };
    Err(ToolError::Git {
        subcommand: subcommand.to_owned(),
        message,
    })
}

/// Current branch plus porcelain status.
///
/// # Errors
///
/// Returns `ToolError::NotFound` outside a repository.
pub async fn status(cwd: &Path) -> Result<ToolResult, ToolError> {
    let branch = git(cwd, &["branch", "--show-current"]).await?;
    let porcelain = git(cwd, &["status", "--porcelain"]).await?;
    let branch = branch.trim();
    let branch = if branch.is_empty() { "(detached HEAD)" } else { branch };
    let changes = if porcelain.trim().is_empty() {
        "Working tree clean"
    } else {
        porcelain.trim_end()
    };
    Ok(ToolResult::ok(format!("Branch: {branch}\n{changes}")).with_detail("branch", branch))
}

/// # Errors
///
/// Returns `ToolError::Git` when git rejects the arguments.
pub async fn diff(cwd: &Path, staged: bool, path: Option<&str>) -> Result<ToolResult, ToolError> {
    let mut args = vec!["diff"];
    if staged {
        args.push("--staged");
    }
    if let Some(p) = path {
        args.extend(["--", p]);
    }
    let out = git(cwd, &args).await?;
    if out.trim().is_empty() {
        Ok(ToolResult::ok("No changes"))
    } else {
        Ok(ToolResult::ok(out))
    }
}

/// # Errors
///
/// Returns `ToolError::Git` when the log cannot be read (e.g. no commits yet).
pub async fn log(cwd: &Path, count: Option<usize>) -> Result<ToolResult, ToolError> {
    let n = count.unwrap_or(DEFAULT_LOG_COUNT).to_string();
    let out = git(cwd, &["log", "-n", &n, "--pretty=format:%h %an %ar %s"]).await?;
    Ok(ToolResult::ok(out))
}

/// Stage everything and commit.
///
/// # Errors
///
/// Returns `ToolError::Git` when there is nothing to commit or git fails.
pub async fn commit(cwd: &Path, message: &str) -> Result<ToolResult, ToolError> {
    git(cwd, &["add", "-A"]).await?;
    let out = git(cwd, &["commit", "-m", message]).await?;
    tracing::info!(cwd = %cwd.display(), "committed");
    Ok(ToolResult::ok(out.trim_end().to_owned()))
}
