use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for Darn
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub github: GithubConfig,
    pub policy: PolicyConfig,
}

/// Configuration for the comment scan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory to scan, relative to where darn runs (or absolute)
    pub root: String,
    /// Regular expressions a path must match to be scanned (empty = all)
    pub include: Vec<String>,
    /// Regular expressions that exclude a path from scanning
    pub exclude: Vec<String>,
    /// Minimum number of significant words in a title to keep an item
    pub min_words: usize,
    /// Minimum title length in characters to keep an item
    pub min_chars: usize,
    /// Maximum number of files parsed at once
    pub concurrency: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root: ".".into(),
            include: vec![],
            exclude: vec![],
            min_words: 3,
            min_chars: 30,
            concurrency: 128,
        }
    }
}

/// Configuration for the GitHub repository darn reports into
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Label that scopes which issues belong to darn
    pub label: String,
    /// API token — usually left empty and supplied via DARN_GITHUB_TOKEN
    /// or GITHUB_TOKEN instead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Commit sha used in file back-links and close comments
    pub sha: String,
    /// Git ref the run is for (e.g. "refs/heads/main")
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Branch name; derived from `ref` or `git rev-parse` when empty
    pub branch: String,
    /// API base URL; override for GitHub Enterprise or tests
    pub api_url: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            label: "todo".into(),
            token: None,
            sha: String::new(),
            git_ref: String::new(),
            branch: String::new(),
            api_url: "https://api.github.com".into(),
        }
    }
}

impl GithubConfig {
    /// Resolve the API token: config value first, then the DARN_GITHUB_TOKEN
    /// and GITHUB_TOKEN environment variables.
    pub fn resolve_token(&self) -> Option<String> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Some(token.clone());
        }
        std::env::var("DARN_GITHUB_TOKEN")
            .or_else(|_| std::env::var("GITHUB_TOKEN"))
            .ok()
            .filter(|t| !t.is_empty())
    }
}

/// Configuration for how the reconciliation behaves
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Maximum issues to create per run (0 = unlimited)
    pub add_limit: usize,
    /// Maximum issues to close per run (0 = unlimited)
    pub close_limit: usize,
    /// Attach branch/type/area/estimate labels in addition to the
    /// management label
    pub extended_labels: bool,
    /// Only close an issue whose branch label matches the current branch
    /// (issues without any branch label can always close)
    pub close_on_same_branch: bool,
    /// Post a "Closed in commit ..." comment before closing
    pub comment_on_close: bool,
    /// Resolve assignees for new issues from git blame
    pub assign_from_blame: bool,
    /// Log mutations instead of performing them
    pub dry_run: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            add_limit: 0,
            close_limit: 0,
            extended_labels: false,
            close_on_same_branch: false,
            comment_on_close: false,
            assign_from_blame: false,
            dry_run: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Get the config file path for a repository
    pub fn config_path(repo_root: &Path) -> PathBuf {
        repo_root.join("darn.toml")
    }

    /// Load the config next to `repo_root` if present, defaults otherwise
    pub fn load_or_default(repo_root: &Path) -> Result<Self> {
        let path = Self::config_path(repo_root);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scan.root, ".");
        assert_eq!(config.scan.min_words, 3);
        assert_eq!(config.scan.min_chars, 30);
        assert_eq!(config.scan.concurrency, 128);
        assert_eq!(config.github.label, "todo");
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.policy.add_limit, 0);
        assert!(!config.policy.dry_run);
    }

    #[test]
    fn test_parse_partial_config() {
        // Missing sections and fields fall back to defaults
        let toml_str = r#"
[scan]
min_chars = 10

[github]
owner = "octocat"
repo = "hello-world"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scan.min_chars, 10);
        assert_eq!(config.scan.min_words, 3);
        assert_eq!(config.github.owner, "octocat");
        assert_eq!(config.github.label, "todo");
        assert!(!config.policy.extended_labels);
    }

    #[test]
    fn test_ref_field_renamed() {
        let toml_str = r#"
[github]
ref = "refs/heads/main"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.github.git_ref, "refs/heads/main");
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.github.owner = "octocat".into();
        config.policy.extended_labels = true;
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.github.owner, "octocat");
        assert!(deserialized.policy.extended_labels);
    }

    #[test]
    fn test_resolve_token_prefers_config_value() {
        let github = GithubConfig {
            token: Some("from-config".into()),
            ..Default::default()
        };
        assert_eq!(github.resolve_token(), Some("from-config".to_string()));
    }

    #[test]
    fn test_resolve_token_ignores_empty_config_value() {
        let github = GithubConfig {
            token: Some(String::new()),
            ..Default::default()
        };
        // Falls through to the environment, which may or may not be set;
        // the config value itself must not win.
        assert_ne!(github.resolve_token(), Some(String::new()));
    }
}
