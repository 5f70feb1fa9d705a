use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary project directory with sample source files for testing.
pub struct TestProject {
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new temp directory with a git repo initialized.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        std::process::Command::new("git")
            .args(["init", "--initial-branch=main"])
            .current_dir(dir.path())
            .output()
            .expect("failed to git init");
        std::process::Command::new("git")
            .args(["config", "user.email", "test@darn.dev"])
            .current_dir(dir.path())
            .output()
            .expect("failed to configure git email");
        std::process::Command::new("git")
            .args(["config", "user.name", "Darn Test"])
            .current_dir(dir.path())
            .output()
            .expect("failed to configure git user");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the project root, creating parent dirs as needed.
    pub fn write_file(&self, relative_path: &str, content: &str) {
        let full = self.dir.path().join(relative_path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        std::fs::write(&full, content).expect("failed to write file");
    }

    /// Add all files and commit so git history exists for blame.
    pub fn git_commit(&self, message: &str) {
        std::process::Command::new("git")
            .args(["add", "-A"])
            .current_dir(self.dir.path())
            .output()
            .expect("failed to git add");
        std::process::Command::new("git")
            .args(["commit", "-m", message, "--allow-empty"])
            .current_dir(self.dir.path())
            .output()
            .expect("failed to git commit");
    }

    /// Write source files carrying a known set of to-do comments.
    pub fn write_todo_fixtures(&self) {
        self.write_file(
            "src/retry.rs",
            r#"pub fn retry() {
    // TODO: fix retry logic in the client
    unimplemented!()
}
"#,
        );

        self.write_file(
            "src/cache.rs",
            r#"// TODO(alice): refactor cache invalidation
// category=storage estimate=2h
// needs a redesign before the next release
pub struct Cache;
"#,
        );

        self.write_file(
            "scripts/build.sh",
            r#"#!/bin/sh
# FIXME: handle spaces in artifact paths
echo building
"#,
        );
    }

    /// Write a darn.toml with permissive size thresholds for fixtures.
    pub fn write_config(&self, extra: &str) {
        self.write_file(
            "darn.toml",
            &format!(
                r#"[scan]
min_words = 1
min_chars = 1
{}
"#,
                extra
            ),
        );
    }

    /// Return the path to the darn binary (built via cargo).
    pub fn darn_bin() -> PathBuf {
        PathBuf::from(env!("CARGO_BIN_EXE_darn"))
    }
}
