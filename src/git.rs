use std::path::Path;

use tokio::process::Command;

use crate::error::FlurryError;

/// Staged changes handed to the prompt builder.
#[derive(Debug, Clone)]
pub struct StagedDiff {
    pub files: Vec<String>,
    pub diff: String,
}

async fn run_git(dir: &Path, args: &[&str]) -> Result<String, FlurryError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdin(std::process::Stdio::null())
        .output()
        .await
        .map_err(|e| FlurryError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FlurryError::Git(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Top level of the repository containing `dir`.
pub async fn repo_root(dir: &Path) -> Result<String, FlurryError> {
    run_git(dir, &["rev-parse", "--show-toplevel"])
        .await
        .map(|s| s.trim().to_string())
        .map_err(|_| FlurryError::Git("the current directory must be a Git repository".to_string()))
}

/// `git add -A`.
pub async fn stage_all(dir: &Path) -> Result<(), FlurryError> {
    run_git(dir, &["add", "-A"]).await.map(|_| ())
}

/// Staged diff of the whole repository with `excludes` removed via
/// `:(exclude)` pathspecs. Returns None when nothing is staged.
///
/// Binary files are listed after the diff. When the diff text is empty the
/// file list stands in for it.
pub async fn staged_diff(dir: &Path, excludes: &[String]) -> Result<Option<StagedDiff>, FlurryError> {
    // `:/` anchors at the repository root, so running from a subdirectory
    // still sees everything `git commit` would record.
    let mut pathspecs = vec![":/".to_string()];
    pathspecs.extend(excludes.iter().map(|e| format!(":(exclude){e}")));

    let names = run_git(dir, &cached_args(Some("--name-only"), &pathspecs)).await?;
    let mut files: Vec<String> = names
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if files.is_empty() {
        return Ok(None);
    }

    let mut diff = run_git(dir, &cached_args(None, &pathspecs)).await?;
    let numstat = run_git(dir, &cached_args(Some("--numstat"), &pathspecs)).await?;
    let binaries = binary_files(&numstat);

    if !binaries.is_empty() {
        if diff.trim().is_empty() {
            diff.clear();
        }
        diff.push_str("\n\n--- Binary Files Changed ---\n");
        for file in &binaries {
            diff.push_str(&format!("Binary file {file} changed\n"));
            if !files.contains(file) {
                files.push(file.clone());
            }
        }
    }
    if diff.trim().is_empty() {
        diff = format!("Files changed: {}", files.join(", "));
    }

    tracing::debug!(files = files.len(), binaries = binaries.len(), bytes = diff.len(), "collected staged diff");
    Ok(Some(StagedDiff { files, diff }))
}

fn cached_args<'a>(extra: Option<&'a str>, pathspecs: &'a [String]) -> Vec<&'a str> {
    let mut args = vec!["diff", "--cached", "--diff-algorithm=minimal"];
    args.extend(extra);
    args.push("--");
    args.extend(pathspecs.iter().map(String::as_str));
    args
}

/// Paths `--numstat` reports as binary (`-\t-\t<path>`).
fn binary_files(numstat: &str) -> Vec<String> {
    numstat
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, '\t');
            match (parts.next(), parts.next(), parts.next()) {
                (Some("-"), Some("-"), Some(path)) if !path.is_empty() => Some(path.to_string()),
                _ => None,
            }
        })
        .collect()
}

/// `git commit -m <message>`.
pub async fn commit(dir: &Path, message: &str) -> Result<(), FlurryError> {
    run_git(dir, &["commit", "-m", message]).await.map(|_| ())
}
