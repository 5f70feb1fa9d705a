//! Diff extracted items against tracker issues and apply the result.
//!
//! Items and issues are keyed by title. Titles present only in the scan
//! open issues; titles present only in the tracker close them, subject
//! to the branch-scoped close policy. Assignment from blame runs as a
//! third phase once created issue numbers exist.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;

use crate::config::{GithubConfig, PolicyConfig};
use crate::scan::metadata::ESTIMATE_EPSILON;
use crate::tracker::{Client, Issue};
use crate::types::TodoItem;

/// Context window around an item's line in the file back-link.
const CONTEXT_LINES_UP: u32 = 3;
const CONTEXT_LINES_DOWN: u32 = 7;

pub const LABEL_BRANCH_PREFIX: &str = "branch: ";
pub const LABEL_TYPE_PREFIX: &str = "type: ";
pub const LABEL_AREA_PREFIX: &str = "area: ";
pub const LABEL_ESTIMATE_PREFIX: &str = "estimate: ";

/// What a sync run did (or, in dry-run mode, would have logged).
#[derive(Debug, Default, Serialize)]
pub struct SyncSummary {
    pub extracted: usize,
    pub created: usize,
    pub closed: usize,
    pub assigned: usize,
}

/// The create/close sets derived from one scan. Borrowed views; the
/// plan never outlives the items and issue snapshot it was built from.
#[derive(Debug)]
pub struct Plan<'a> {
    pub create: Vec<&'a TodoItem>,
    pub close: Vec<&'a Issue>,
}

/// Compute the create and close sets.
///
/// Later tracker issues sharing a title overwrite earlier ones; issues
/// already closed are not close candidates. The branch policy is applied
/// at close time, not here.
pub fn plan<'a>(items: &'a [TodoItem], issues: &'a [Issue]) -> Plan<'a> {
    let issue_map: HashMap<&str, &Issue> =
        issues.iter().map(|i| (i.title.as_str(), i)).collect();
    let item_map: HashMap<&str, &TodoItem> =
        items.iter().map(|i| (i.title.as_str(), i)).collect();

    let create = items
        .iter()
        .filter(|item| !issue_map.contains_key(item.title.as_str()))
        .collect();

    let close = issue_map
        .values()
        .filter(|issue| issue.state != "closed" && !item_map.contains_key(issue.title.as_str()))
        .copied()
        .collect();

    Plan { create, close }
}

/// Whether the close policy permits closing `issue` on `branch`.
///
/// With the policy disabled every candidate may close. Enabled, a
/// candidate closes only if it carries no branch label at all or one of
/// its branch labels names the current branch.
pub fn can_close(issue: &Issue, branch: &str, close_on_same_branch: bool) -> bool {
    if !close_on_same_branch {
        return true;
    }

    let mut any_branch = false;
    for label in &issue.labels {
        if let Some(label_branch) = label.name.strip_prefix(LABEL_BRANCH_PREFIX) {
            any_branch = true;
            if label_branch == branch {
                return true;
            }
        }
    }

    // no branch label at all: assume it is ours to close
    !any_branch
}

/// Derive a branch name from a git ref by skipping the leading
/// `refs`/`heads`/`tags`/`remotes` components.
pub fn branch_from_ref(git_ref: &str) -> String {
    let parts: Vec<&str> = git_ref.split('/').collect();
    let skip = ["refs", "tags", "heads", "remotes"];
    let start = parts
        .iter()
        .position(|p| !skip.contains(p))
        .unwrap_or(parts.len());
    parts[start..].join("/")
}

/// Percent-escape each path segment, keeping the separators.
fn escape_path(path: &str) -> String {
    path.split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Web link to the item's surroundings in the repository at `sha`.
pub fn file_link(github: &GithubConfig, scan_root: &str, file: &str, line: u32) -> String {
    let start = line.saturating_sub(CONTEXT_LINES_UP);
    let end = line + CONTEXT_LINES_DOWN;

    let root = scan_root
        .trim_start_matches('.')
        .trim_start_matches('/')
        .trim_end_matches('/');
    let filepath = if root.is_empty() {
        file.to_string()
    } else {
        format!("{}/{}", root, file)
    };

    format!(
        "https://github.com/{}/{}/blob/{}/{}#L{}-L{}",
        github.owner,
        github.repo,
        github.sha,
        escape_path(&filepath),
        start,
        end
    )
}

/// Compose the issue body: item body, optional parent/author
/// attribution, then the line back-link.
pub fn issue_body(item: &TodoItem, link: &str) -> String {
    let mut body = format!("{}\n\n", item.body);

    if let Some(parent) = item.parent_issue {
        body.push_str(&format!("Parent issue: #{}\n", parent));
    }
    if let Some(author) = &item.author {
        body.push_str(&format!("Author: @{}\n", author));
    }
    body.push_str(&format!("Line: {}\n{}", item.line, link));

    body
}

/// Render an estimate label value: minutes under an hour, the plain
/// hour value otherwise. Negligible estimates render nothing.
pub fn estimate_label(hours: f64) -> Option<String> {
    if hours <= ESTIMATE_EPSILON {
        return None;
    }
    let minutes = (hours * 60.0).round();
    if minutes >= 60.0 {
        Some(format!("{}h", hours))
    } else {
        Some(format!("{}m", minutes))
    }
}

/// Labels for a new issue: the management label always, the extended
/// branch/type/area/estimate set when enabled.
pub fn build_labels(item: &TodoItem, label: &str, branch: &str, extended: bool) -> Vec<String> {
    let mut labels = vec![label.to_string()];
    if !extended {
        return labels;
    }

    labels.push(format!("{}{}", LABEL_BRANCH_PREFIX, branch));
    labels.push(format!("{}{}", LABEL_TYPE_PREFIX, item.kind.label()));

    if let Some(category) = &item.category {
        labels.push(format!("{}{}", LABEL_AREA_PREFIX, category));
    }
    if let Some(estimate) = item.estimate_hours.and_then(estimate_label) {
        labels.push(format!("{}{}", LABEL_ESTIMATE_PREFIX, estimate));
    }

    labels
}

/// Applies a plan against the tracker.
pub struct Reconciler<'a> {
    client: &'a Client,
    github: &'a GithubConfig,
    policy: &'a PolicyConfig,
    scan_root: String,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        client: &'a Client,
        github: &'a GithubConfig,
        policy: &'a PolicyConfig,
        scan_root: &str,
    ) -> Self {
        Self {
            client,
            github,
            policy,
            scan_root: scan_root.to_string(),
        }
    }

    /// Fetch the issue snapshot, plan, and apply. Failure to list
    /// issues aborts the run; every other failure affects only its one
    /// action.
    pub async fn run(&self, items: &[TodoItem]) -> Result<SyncSummary> {
        let issues = self
            .client
            .list_issues(&self.github.label)
            .await
            .context("Failed to list existing issues")?;

        let plan = plan(items, &issues);
        tracing::info!(
            "Reconciliation plan: create={} close={}",
            plan.create.len(),
            plan.close.len()
        );

        // The three phases write to disjoint outputs; assignment
        // application needs issue numbers, so it runs after.
        let (created, closed, authors) = futures::join!(
            self.create_issues(&plan.create),
            self.close_issues(&plan.close),
            self.resolve_authors(&plan.create),
        );

        let assigned = self.apply_assignments(&plan.create, &created, &authors).await;

        Ok(SyncSummary {
            extracted: items.len(),
            created: created.len(),
            closed,
            assigned,
        })
    }

    /// Open an issue per create-set item, up to the add limit.
    async fn create_issues(&self, create: &[&TodoItem]) -> Vec<(usize, u64)> {
        let mut created = Vec::new();

        for (idx, item) in create.iter().copied().enumerate() {
            let link = file_link(self.github, &self.scan_root, &item.file, item.line);
            let body = issue_body(item, &link);
            tracing::info!("About to create an issue. title={}", item.title);

            if self.policy.dry_run {
                tracing::info!("Dry run mode.");
                continue;
            }

            let labels = build_labels(
                item,
                &self.github.label,
                &self.github.branch,
                self.policy.extended_labels,
            );
            match self.client.create_issue(&item.title, &body, &labels).await {
                Ok(issue) => {
                    tracing::info!("Created an issue. title={} number={}", item.title, issue.number);
                    created.push((idx, issue.number));
                }
                Err(e) => {
                    tracing::error!("Error while creating an issue: {:#}", e);
                    continue;
                }
            }

            if self.policy.add_limit > 0 && created.len() >= self.policy.add_limit {
                tracing::info!("Reached limit of issues to create. limit={}", self.policy.add_limit);
                break;
            }
        }

        tracing::info!("Created new issues. count={}", created.len());
        created
    }

    /// Close close-set issues allowed by the branch policy, up to the
    /// close limit.
    async fn close_issues(&self, close: &[&Issue]) -> usize {
        let mut count = 0;

        for issue in close.iter().copied() {
            tracing::info!("About to close an issue. number={} title={}", issue.number, issue.title);

            if self.policy.dry_run {
                tracing::info!("Dry run mode.");
                continue;
            }

            if !can_close(issue, &self.github.branch, self.policy.close_on_same_branch) {
                tracing::info!("Close blocked by branch policy. number={}", issue.number);
                continue;
            }

            if self.policy.comment_on_close {
                let body = format!("Closed in commit {}", self.github.sha);
                if let Err(e) = self.client.add_comment(issue.number, &body).await {
                    tracing::error!("Error while adding a comment. number={}: {:#}", issue.number, e);
                }
            }

            if let Err(e) = self.client.close_issue(issue.number).await {
                tracing::error!("Error while closing an issue. number={}: {:#}", issue.number, e);
                continue;
            }
            tracing::info!("Closed an issue. number={}", issue.number);

            count += 1;
            if self.policy.close_limit > 0 && count >= self.policy.close_limit {
                tracing::info!("Reached limit of issues to close. limit={}", self.policy.close_limit);
                break;
            }
        }

        tracing::info!("Closed issues. count={}", count);
        count
    }

    /// Resolve commit ids to GitHub logins, once per unique commit.
    async fn resolve_authors(&self, create: &[&TodoItem]) -> HashMap<String, String> {
        if !self.policy.assign_from_blame {
            return HashMap::new();
        }

        let mut cache: HashMap<String, Option<String>> = HashMap::new();
        for item in create {
            let Some(commit_id) = &item.commit_id else {
                continue;
            };
            if cache.contains_key(commit_id) {
                continue;
            }
            let login = match self.client.commit_author(commit_id).await {
                Ok(login) => login,
                Err(e) => {
                    tracing::error!("Error while resolving commit author. commit={}: {:#}", commit_id, e);
                    None
                }
            };
            cache.insert(commit_id.clone(), login);
        }

        cache
            .into_iter()
            .filter_map(|(commit, login)| login.map(|l| (commit, l)))
            .collect()
    }

    /// Best-effort: add resolved logins as assignees on the issues
    /// created this run.
    async fn apply_assignments(
        &self,
        create: &[&TodoItem],
        created: &[(usize, u64)],
        authors: &HashMap<String, String>,
    ) -> usize {
        let mut assigned = 0;

        for (idx, number) in created {
            let item = create[*idx];
            let Some(commit_id) = &item.commit_id else {
                continue;
            };
            let Some(login) = authors.get(commit_id) else {
                continue;
            };

            match self.client.assign_issue(*number, login).await {
                Ok(()) => {
                    tracing::info!("Assigned an issue. number={} assignee={}", number, login);
                    assigned += 1;
                }
                Err(e) => {
                    tracing::error!("Error while assigning an issue. number={}: {:#}", number, e);
                }
            }
        }

        assigned
    }
}
