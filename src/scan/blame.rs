use std::path::Path;
use std::process::Command;

/// Commit attribution for one source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlameDetails {
    pub commit_id: String,
    pub committer_email: String,
}

/// Run a git subcommand in `root`, returning trimmed stdout on success.
fn run_git(root: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .ok()?;

    if !output.status.success() {
        tracing::warn!(
            "git {} failed: {}",
            args.first().copied().unwrap_or(""),
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }

    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Register the scan root as a safe git directory so blame works when
/// the repository is owned by another user (CI checkouts).
pub fn mark_root_safe(root: &Path) {
    let mut safe_dir = root.to_string_lossy().to_string();
    while safe_dir.ends_with("/.") || safe_dir.ends_with('/') {
        safe_dir = safe_dir
            .trim_end_matches("/.")
            .trim_end_matches('/')
            .to_string();
    }

    tracing::info!("Marking '{}' as a safe git directory", safe_dir);
    let output = Command::new("git")
        .args(["config", "--global", "--add", "safe.directory", &safe_dir])
        .output();
    if let Err(e) = output {
        tracing::warn!("Failed to mark safe directory: {}", e);
    }
}

/// Current branch of the repository at `root`, if it is one.
pub fn head_branch(root: &Path) -> Option<String> {
    run_git(root, &["rev-parse", "--abbrev-ref", "HEAD"]).filter(|s| !s.is_empty())
}

/// Current HEAD commit of the repository at `root`.
pub fn head_sha(root: &Path) -> Option<String> {
    run_git(root, &["rev-parse", "HEAD"]).filter(|s| !s.is_empty())
}

/// Ask `git blame` who last touched `file:line`.
///
/// Any failure — git missing, file untracked, porcelain output without
/// the expected fields — returns `None`; the item simply keeps no
/// authorship. No retries.
pub fn lookup_line(root: &Path, file: &str, line: u32) -> Option<BlameDetails> {
    let abs_path = root.join(file);
    let range = format!("{},{}", line, line);
    let output = Command::new("git")
        .args(["blame", "-L", &range, "--porcelain", "--"])
        .arg(&abs_path)
        .current_dir(root)
        .output();

    let output = match output {
        Ok(o) => o,
        Err(e) => {
            tracing::warn!("Unable to execute git blame for {}: {}", file, e);
            return None;
        }
    };

    if !output.status.success() {
        tracing::warn!(
            "git blame failed for {}:{}: {}",
            file,
            line,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let details = parse_porcelain(&text);
    if details.is_none() {
        tracing::warn!("Incomplete blame output for {}:{}", file, line);
    }
    details
}

/// Pull the commit id and committer email out of `git blame --porcelain`
/// output. The commit id is the first token of the first line; the email
/// arrives as `committer-mail <foo@bar.com>`.
pub fn parse_porcelain(output: &str) -> Option<BlameDetails> {
    let mut lines = output.lines();

    let commit_id = lines
        .next()?
        .split_whitespace()
        .next()
        .filter(|id| !id.is_empty())?
        .to_string();

    let committer_email = lines.find_map(|line| {
        let rest = line.strip_prefix("committer-mail ")?;
        let email = rest.trim().trim_start_matches('<').trim_end_matches('>');
        if email.is_empty() {
            None
        } else {
            Some(email.to_string())
        }
    })?;

    Some(BlameDetails {
        commit_id,
        committer_email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PORCELAIN: &str = "\
f1d2d2f924e986ac86fdf7b36c94bcdf32beec15 10 10 1
author Alice Example
author-mail <alice@example.com>
author-time 1699999999
committer Bob Example
committer-mail <bob@example.com>
committer-time 1699999999
summary add retry logic
filename src/retry.rs
\t// TODO: fix retry logic";

    #[test]
    fn test_parse_porcelain_extracts_commit_and_email() {
        let details = parse_porcelain(PORCELAIN).unwrap();
        assert_eq!(details.commit_id, "f1d2d2f924e986ac86fdf7b36c94bcdf32beec15");
        assert_eq!(details.committer_email, "bob@example.com");
    }

    #[test]
    fn test_parse_porcelain_missing_email() {
        let out = "f1d2d2f924e986ac86fdf7b36c94bcdf32beec15 10 10 1\nsummary whatever\n";
        assert_eq!(parse_porcelain(out), None);
    }

    #[test]
    fn test_parse_porcelain_empty_output() {
        assert_eq!(parse_porcelain(""), None);
    }

    #[test]
    fn test_lookup_line_outside_repo_is_none() {
        let dir = std::env::temp_dir();
        assert_eq!(lookup_line(&dir, "definitely-not-tracked.rs", 1), None);
    }
}
