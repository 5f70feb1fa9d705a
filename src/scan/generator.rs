use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::scan::blame::{self, BlameDetails};
use crate::scan::dedupe::{content_hash, AdmitOutcome, Admission};
use crate::scan::filter::PathFilter;
use crate::scan::metadata::parse_metadata_line;
use crate::scan::parser::{Block, FileParser};
use crate::types::{ScanStats, TodoItem};

/// Everything a scan run produced.
#[derive(Debug)]
pub struct ScanOutcome {
    pub items: Vec<TodoItem>,
    pub stats: ScanStats,
}

/// A pending authorship lookup for an admitted item.
struct BlameRequest {
    hash: String,
    file: String,
    line: u32,
}

/// Shared state for one run. Constructed fresh per scan, dropped when
/// the scan returns; each map has its own lock and no task holds two
/// locks at once.
#[derive(Default)]
struct ScanState {
    items: Mutex<Vec<TodoItem>>,
    blame: Mutex<HashMap<String, BlameDetails>>,
    line_counts: Mutex<HashMap<String, u32>>,
    duplicates: Mutex<usize>,
    too_small: Mutex<usize>,
}

/// Walks the scan root and fans file parsing out under a bounded
/// concurrency limit, collecting admitted items.
pub struct TodoGenerator {
    root: PathBuf,
    filter: PathFilter,
    min_words: usize,
    min_chars: usize,
    concurrency: usize,
    blame_enabled: bool,
}

impl TodoGenerator {
    pub fn new(root: &Path, config: &ScanConfig, blame_enabled: bool) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Invalid scan root: {}", root.display()))?;
        let filter = PathFilter::new(&root, &config.include, &config.exclude)?;

        Ok(Self {
            root,
            filter,
            min_words: config.min_words,
            min_chars: config.min_chars,
            concurrency: config.concurrency.max(1),
            blame_enabled,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run the scan: walk, parse, dedupe, then backfill authorship.
    ///
    /// Directory-walk errors abort the run; unreadable files are logged
    /// and skipped. Item order across files is non-deterministic.
    pub async fn generate(&self) -> Result<ScanOutcome> {
        if self.blame_enabled {
            blame::mark_root_safe(&self.root);
        }

        // Fresh per run: admission map and shared state live exactly as
        // long as this call.
        let admission = Arc::new(Admission::new(self.min_words, self.min_chars));
        let state = Arc::new(ScanState::default());
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<Vec<BlameRequest>> = JoinSet::new();

        let mut total_files = 0usize;
        let mut matched_files = 0usize;

        for entry in WalkDir::new(&self.root) {
            let entry = entry.context("Failed to walk scan root")?;
            if !entry.file_type().is_file() {
                continue;
            }
            total_files += 1;

            let path = entry.path();
            if !self.filter.matches(path) {
                continue;
            }
            matched_files += 1;

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .context("Scan semaphore closed")?;
            let state = Arc::clone(&state);
            let admission = Arc::clone(&admission);
            let root = self.root.clone();
            let path = path.to_path_buf();
            let blame_enabled = self.blame_enabled;
            tasks.spawn(async move {
                let requests = parse_file(&state, &admission, &root, &path, blame_enabled).await;
                drop(permit);
                requests
            });
        }

        tracing::info!("Scanned files: {}", total_files);
        tracing::info!("Matched files: {}", matched_files);

        let mut blame_requests = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(requests) => blame_requests.extend(requests),
                Err(e) => tracing::error!("Scan task failed: {}", e),
            }
        }

        if self.blame_enabled {
            self.run_blame_lookups(&state, &semaphore, blame_requests)
                .await?;
        }

        let mut items = std::mem::take(&mut *state.items.lock().unwrap_or_else(|e| e.into_inner()));
        backfill_blame(&state, &mut items);

        let stats = ScanStats {
            total_files,
            matched_files,
            total_lines: state
                .line_counts
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .values()
                .map(|&n| u64::from(n))
                .sum(),
            duplicates: *state.duplicates.lock().unwrap_or_else(|e| e.into_inner()),
            too_small: *state.too_small.lock().unwrap_or_else(|e| e.into_inner()),
        };
        tracing::info!("Found items: {}", items.len());

        Ok(ScanOutcome { items, stats })
    }

    /// Issue one blame lookup per admitted item, bounded by the same
    /// permit pool as file parsing, and await them all.
    async fn run_blame_lookups(
        &self,
        state: &Arc<ScanState>,
        semaphore: &Arc<Semaphore>,
        requests: Vec<BlameRequest>,
    ) -> Result<()> {
        let mut lookups: JoinSet<()> = JoinSet::new();

        for request in requests {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .context("Scan semaphore closed")?;
            let state = Arc::clone(state);
            let root = self.root.clone();
            lookups.spawn_blocking(move || {
                let details = blame::lookup_line(&root, &request.file, request.line);
                drop(permit);
                if let Some(details) = details {
                    state
                        .blame
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(request.hash, details);
                }
            });
        }

        while let Some(joined) = lookups.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Blame lookup task failed: {}", e);
            }
        }

        Ok(())
    }
}

/// Merge cached blame results onto the matching items by content hash.
fn backfill_blame(state: &ScanState, items: &mut [TodoItem]) {
    let blame_map = state.blame.lock().unwrap_or_else(|e| e.into_inner());
    if blame_map.is_empty() {
        return;
    }
    for item in items {
        let hash = content_hash(&item.file, &item.title, &item.body);
        if let Some(details) = blame_map.get(&hash) {
            item.commit_id = Some(details.commit_id.clone());
            item.committer_email = Some(details.committer_email.clone());
        }
    }
}

/// Parse one file into blocks and offer each for admission. Returns the
/// blame lookups owed for admitted items.
async fn parse_file(
    state: &ScanState,
    admission: &Admission,
    root: &Path,
    path: &Path,
    blame_enabled: bool,
) -> Vec<BlameRequest> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Skipping unreadable file {}: {}", path.display(), e);
            return Vec::new();
        }
    };
    let content = String::from_utf8_lossy(&bytes);

    let rel_path = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string();

    let mut requests = Vec::new();
    let mut parser = FileParser::new();
    let mut line_number = 0u32;

    for line in content.lines() {
        line_number += 1;
        if let Some(block) = parser.feed(line_number, line) {
            account_block(state, admission, &rel_path, block, blame_enabled, &mut requests);
        }
    }
    if let Some(block) = parser.finish() {
        account_block(state, admission, &rel_path, block, blame_enabled, &mut requests);
    }

    state
        .line_counts
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .insert(rel_path, line_number);

    requests
}

/// Turn a finalized block into an item and run it through admission.
fn account_block(
    state: &ScanState,
    admission: &Admission,
    file: &str,
    block: Block,
    blame_enabled: bool,
    requests: &mut Vec<BlameRequest>,
) {
    let item = build_item(file, block);

    match admission.admit(&item) {
        AdmitOutcome::Admitted(hash) => {
            if blame_enabled {
                requests.push(BlameRequest {
                    hash,
                    file: item.file.clone(),
                    line: item.line,
                });
            }
            state
                .items
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(item);
        }
        AdmitOutcome::Duplicate => {
            tracing::info!("Skipping duplicate item in {}:{}", item.file, item.line);
            *state.duplicates.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        }
        AdmitOutcome::TooSmall => {
            tracing::info!("Ignoring too-small item in {}:{}", item.file, item.line);
            *state.too_small.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        }
    }
}

/// Assemble an item from a finalized block: first line is the title,
/// the second may carry inline metadata, the rest becomes the body.
fn build_item(file: &str, block: Block) -> TodoItem {
    let mut item = TodoItem {
        kind: block.kind,
        title: block.lines[0].clone(),
        body: String::new(),
        file: file.to_string(),
        line: block.start_line,
        author: block.author,
        category: None,
        parent_issue: None,
        estimate_hours: None,
        commit_id: None,
        committer_email: None,
    };

    if block.lines.len() > 1 {
        let body_lines = if let Some(meta) = parse_metadata_line(&block.lines[1]) {
            item.category = meta.category;
            item.parent_issue = meta.issue;
            item.estimate_hours = meta.estimate_hours;
            // a tag annotation wins over inline metadata
            if item.author.is_none() {
                item.author = meta.author;
            }
            &block.lines[2..]
        } else {
            &block.lines[1..]
        };
        item.body = body_lines.join("\n").trim().to_string();
    }

    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TodoKind;

    fn block(kind: TodoKind, author: Option<&str>, lines: &[&str]) -> Block {
        Block {
            kind,
            author: author.map(|s| s.to_string()),
            start_line: 10,
            lines: lines.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_build_item_title_only() {
        let item = build_item("src/retry.rs", block(TodoKind::Todo, None, &["fix retry logic"]));
        assert_eq!(item.title, "fix retry logic");
        assert_eq!(item.body, "");
        assert_eq!(item.line, 10);
        assert_eq!(item.category, None);
    }

    #[test]
    fn test_build_item_metadata_line_removed_from_body() {
        let item = build_item(
            "src/cache.rs",
            block(
                TodoKind::Todo,
                Some("alice"),
                &["refactor cache", "category=storage estimate=2h", "needs a redesign"],
            ),
        );
        assert_eq!(item.author.as_deref(), Some("alice"));
        assert_eq!(item.category.as_deref(), Some("storage"));
        assert_eq!(item.estimate_hours, Some(2.0));
        assert_eq!(item.body, "needs a redesign");
    }

    #[test]
    fn test_build_item_non_metadata_second_line_is_body() {
        let item = build_item(
            "src/cache.rs",
            block(TodoKind::Fixme, None, &["handle eviction", "this is plain body", "more body"]),
        );
        assert_eq!(item.body, "this is plain body\nmore body");
        assert_eq!(item.category, None);
    }

    #[test]
    fn test_build_item_tag_author_wins_over_metadata() {
        let item = build_item(
            "a.rs",
            block(TodoKind::Todo, Some("alice"), &["tune the backoff", "author=bob issue=3"]),
        );
        assert_eq!(item.author.as_deref(), Some("alice"));
        assert_eq!(item.parent_issue, Some(3));
    }

    #[test]
    fn test_build_item_metadata_author_used_when_absent() {
        let item = build_item(
            "a.rs",
            block(TodoKind::Todo, None, &["tune the backoff", "author=bob"]),
        );
        assert_eq!(item.author.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn test_generate_collects_items_from_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(
            dir.path().join("src/main.rs"),
            "fn main() {}\n// TODO: fix retry logic in the client\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("src/lib.rs"),
            "// FIXME(bob): handle overflow on add\n// carefully\npub fn add() {}\n",
        )
        .unwrap();

        let config = ScanConfig {
            min_words: 1,
            min_chars: 1,
            ..Default::default()
        };
        let generator = TodoGenerator::new(dir.path(), &config, false).unwrap();
        let outcome = generator.generate().await.unwrap();

        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.stats.matched_files, 2);
        assert_eq!(outcome.stats.total_files, 2);
        assert!(outcome.stats.total_lines >= 5);

        let mut titles: Vec<&str> = outcome.items.iter().map(|i| i.title.as_str()).collect();
        titles.sort_unstable();
        assert_eq!(titles, vec!["fix retry logic in the client", "handle overflow on add"]);
    }

    #[tokio::test]
    async fn test_generate_is_idempotent_on_hashes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.py"),
            "# TODO: first item with enough words\n# BUG: second item with enough words\n",
        )
        .unwrap();

        let config = ScanConfig {
            min_words: 1,
            min_chars: 1,
            ..Default::default()
        };
        let generator = TodoGenerator::new(dir.path(), &config, false).unwrap();
        let first = generator.generate().await.unwrap();

        let generator = TodoGenerator::new(dir.path(), &config, false).unwrap();
        let second = generator.generate().await.unwrap();

        let hashes = |items: &[TodoItem]| {
            let mut hs: Vec<String> = items
                .iter()
                .map(|i| content_hash(&i.file, &i.title, &i.body))
                .collect();
            hs.sort_unstable();
            hs
        };
        assert_eq!(hashes(&first.items), hashes(&second.items));
    }

    #[tokio::test]
    async fn test_generate_drops_duplicates_across_files() {
        let dir = tempfile::tempdir().unwrap();
        // Same file-relative content twice in one file: identical
        // (file, title, body) triple, one admitted item.
        std::fs::write(
            dir.path().join("dup.rs"),
            "// TODO: deduplicate me properly\nx();\n// TODO: deduplicate me properly\ny();\n",
        )
        .unwrap();

        let config = ScanConfig {
            min_words: 1,
            min_chars: 1,
            ..Default::default()
        };
        let generator = TodoGenerator::new(dir.path(), &config, false).unwrap();
        let outcome = generator.generate().await.unwrap();

        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.stats.duplicates, 1);
    }

    #[tokio::test]
    async fn test_generate_respects_exclude_patterns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("vendor")).unwrap();
        std::fs::write(dir.path().join("vendor/lib.rs"), "// TODO: vendored item ignored\n").unwrap();
        std::fs::write(dir.path().join("main.rs"), "// TODO: our own item kept\n").unwrap();

        let config = ScanConfig {
            exclude: vec!["vendor/".into()],
            min_words: 1,
            min_chars: 1,
            ..Default::default()
        };
        let generator = TodoGenerator::new(dir.path(), &config, false).unwrap();
        let outcome = generator.generate().await.unwrap();

        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].file, "main.rs");
    }
}
