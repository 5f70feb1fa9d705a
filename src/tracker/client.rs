//! GitHub REST client for the issue reconciliation.
//!
//! Only the handful of calls the reconciler needs: list issues by
//! label, create, close, comment, assign, and resolve a commit's
//! author. The base URL is injectable for GitHub Enterprise and tests.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;

const ISSUES_PER_PAGE: usize = 100;

/// GitHub client scoped to one repository.
pub struct Client {
    base_url: String,
    owner: String,
    repo: String,
    token: String,
    http: reqwest::Client,
}

/// A tracker issue as the reconciler sees it
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// An issue label
#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Deserialize)]
struct CommitResponse {
    author: Option<CommitUser>,
}

#[derive(Deserialize)]
struct CommitUser {
    login: String,
}

/// Error response from the API
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl Client {
    /// Create a new client for `owner/repo` against the given API base.
    pub fn new(base_url: &str, owner: &str, repo: &str, token: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn repo_url(&self, tail: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.base_url, self.owner, self.repo, tail)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", concat!("darn/", env!("CARGO_PKG_VERSION")))
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body: ErrorBody = resp.json().await.unwrap_or(ErrorBody {
            message: format!("HTTP {}", status),
        });
        anyhow::bail!("GitHub error ({}): {}", status, body.message);
    }

    /// List all issues carrying `label`, any state, across pages.
    pub async fn list_issues(&self, label: &str) -> Result<Vec<Issue>> {
        let url = self.repo_url("issues");
        let mut all = Vec::new();
        let mut page = 1usize;

        loop {
            let per_page = ISSUES_PER_PAGE.to_string();
            let page_param = page.to_string();
            let resp = self
                .request(reqwest::Method::GET, &url)
                .query(&[
                    ("labels", label),
                    ("state", "all"),
                    ("per_page", per_page.as_str()),
                    ("page", page_param.as_str()),
                ])
                .send()
                .await
                .context("Failed to connect to GitHub")?;

            let issues: Vec<Issue> = Self::check(resp)
                .await?
                .json()
                .await
                .context("Failed to parse issue list response")?;

            let full_page = issues.len() == ISSUES_PER_PAGE;
            all.extend(issues);
            if !full_page {
                break;
            }
            page += 1;
        }

        tracing::info!("Fetched tracker issues. count={} label={}", all.len(), label);
        Ok(all)
    }

    /// Open a new issue.
    pub async fn create_issue(&self, title: &str, body: &str, labels: &[String]) -> Result<Issue> {
        let resp = self
            .request(reqwest::Method::POST, &self.repo_url("issues"))
            .json(&json!({ "title": title, "body": body, "labels": labels }))
            .send()
            .await
            .context("Failed to connect to GitHub")?;

        Self::check(resp)
            .await?
            .json()
            .await
            .context("Failed to parse created issue")
    }

    /// Close an issue.
    pub async fn close_issue(&self, number: u64) -> Result<()> {
        let resp = self
            .request(reqwest::Method::PATCH, &self.repo_url(&format!("issues/{}", number)))
            .json(&json!({ "state": "closed" }))
            .send()
            .await
            .context("Failed to connect to GitHub")?;

        Self::check(resp).await?;
        Ok(())
    }

    /// Set the assignees of an issue.
    pub async fn assign_issue(&self, number: u64, assignee: &str) -> Result<()> {
        let resp = self
            .request(reqwest::Method::PATCH, &self.repo_url(&format!("issues/{}", number)))
            .json(&json!({ "assignees": [assignee] }))
            .send()
            .await
            .context("Failed to connect to GitHub")?;

        Self::check(resp).await?;
        Ok(())
    }

    /// Add a comment to an issue.
    pub async fn add_comment(&self, number: u64, body: &str) -> Result<()> {
        let resp = self
            .request(
                reqwest::Method::POST,
                &self.repo_url(&format!("issues/{}/comments", number)),
            )
            .json(&json!({ "body": body }))
            .send()
            .await
            .context("Failed to connect to GitHub")?;

        Self::check(resp).await?;
        Ok(())
    }

    /// Resolve the GitHub login that authored a commit, when GitHub
    /// knows one.
    pub async fn commit_author(&self, sha: &str) -> Result<Option<String>> {
        let resp = self
            .request(reqwest::Method::GET, &self.repo_url(&format!("commits/{}", sha)))
            .send()
            .await
            .context("Failed to connect to GitHub")?;

        let commit: CommitResponse = Self::check(resp)
            .await?
            .json()
            .await
            .context("Failed to parse commit response")?;

        Ok(commit.author.map(|a| a.login))
    }
}
