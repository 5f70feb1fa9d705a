use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Mutex;

use crate::types::TodoItem;

/// Tokens longer than this count as significant title words.
const SIGNIFICANT_WORD_LEN: usize = 2;

/// Content hash identifying a logical to-do item within a run.
///
/// Two blocks hashing equal are the same item no matter which scan
/// task discovered them.
pub fn content_hash(file: &str, title: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file.as_bytes());
    hasher.update(title.as_bytes());
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

/// Number of words in `s` longer than the significance threshold.
pub fn significant_words(s: &str) -> usize {
    s.split_whitespace()
        .filter(|w| w.chars().count() > SIGNIFICANT_WORD_LEN)
        .count()
}

/// Outcome of offering an item for admission.
#[derive(Debug, PartialEq, Eq)]
pub enum AdmitOutcome {
    /// Keep the item; carries its content hash for later bookkeeping
    Admitted(String),
    /// Same content hash was already admitted this run
    Duplicate,
    /// Title fails both the word-count and character-count thresholds
    TooSmall,
}

/// Admission filter shared by all scan tasks: content-hash dedup plus
/// the minimum-size noise filter. Interior mutability so concurrent
/// block finalizations serialize on the one map.
pub struct Admission {
    min_words: usize,
    min_chars: usize,
    seen: Mutex<HashSet<String>>,
}

impl Admission {
    pub fn new(min_words: usize, min_chars: usize) -> Self {
        Self {
            min_words,
            min_chars,
            seen: Mutex::new(HashSet::new()),
        }
    }

    pub fn admit(&self, item: &TodoItem) -> AdmitOutcome {
        let hash = content_hash(&item.file, &item.title, &item.body);

        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        if seen.contains(&hash) {
            return AdmitOutcome::Duplicate;
        }

        if significant_words(&item.title) >= self.min_words
            || item.title.chars().count() >= self.min_chars
        {
            seen.insert(hash.clone());
            AdmitOutcome::Admitted(hash)
        } else {
            AdmitOutcome::TooSmall
        }
    }
}
