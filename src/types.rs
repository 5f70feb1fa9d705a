use serde::{Deserialize, Serialize};

/// Marker vocabulary recognized at the start of a comment line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TodoKind {
    Todo,
    Fixme,
    Bug,
    Hack,
}

impl TodoKind {
    pub const ALL: [TodoKind; 4] = [TodoKind::Todo, TodoKind::Fixme, TodoKind::Bug, TodoKind::Hack];

    /// The canonical upper-case tag as written in source
    pub fn tag(self) -> &'static str {
        match self {
            TodoKind::Todo => "TODO",
            TodoKind::Fixme => "FIXME",
            TodoKind::Bug => "BUG",
            TodoKind::Hack => "HACK",
        }
    }

    /// Lower-case form used in the `type:` label
    pub fn label(self) -> &'static str {
        match self {
            TodoKind::Todo => "todo",
            TodoKind::Fixme => "fixme",
            TodoKind::Bug => "bug",
            TodoKind::Hack => "hack",
        }
    }
}

impl std::fmt::Display for TodoKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// One extracted to-do comment, ready for reconciliation.
///
/// `title` is the natural key when matching against tracker issues;
/// identity within a scan run is the content hash of (file, title, body).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    pub kind: TodoKind,
    pub title: String,
    pub body: String,
    /// Path relative to the scan root
    pub file: String,
    /// 1-based line of the marker line
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_issue: Option<u64>,
    /// Time estimate normalized to hours
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate_hours: Option<f64>,
    /// Filled by the blame backfill pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committer_email: Option<String>,
}

/// Counters reported after a scan run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    /// Regular files seen by the directory walk
    pub total_files: usize,
    /// Files that passed the path filter and were parsed
    pub matched_files: usize,
    /// Sum of line counts over parsed files
    pub total_lines: u64,
    /// Items dropped as content-hash duplicates
    pub duplicates: usize,
    /// Items dropped by the noise-size filter
    pub too_small: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tag_roundtrip() {
        for kind in TodoKind::ALL {
            assert_eq!(kind.tag(), kind.to_string());
            assert_eq!(kind.label(), kind.tag().to_lowercase());
        }
    }

    #[test]
    fn test_kind_serializes_uppercase() {
        let json = serde_json::to_string(&TodoKind::Fixme).unwrap();
        assert_eq!(json, "\"FIXME\"");
    }

    #[test]
    fn test_item_serializes_without_empty_optionals() {
        let item = TodoItem {
            kind: TodoKind::Todo,
            title: "fix retry logic".to_string(),
            body: String::new(),
            file: "src/main.rs".to_string(),
            line: 10,
            author: None,
            category: None,
            parent_issue: None,
            estimate_hours: None,
            commit_id: None,
            committer_email: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("author").is_none());
        assert!(json.get("estimate_hours").is_none());
        assert_eq!(json["line"], 10);
    }
}
