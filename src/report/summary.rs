// src/report/summary.rs

//! Plain-text end-of-run summary.

use std::fmt::Write;

use crate::progress::ProgressTree;
use crate::sync::{ChangeSet, RepoChanges};

/// Pending changes per repository followed by one `- Failed` line per
/// stage/step that holds a failed command.
pub fn render_summary(tree: &ProgressTree, changes: &ChangeSet) -> String {
    let mut out = String::new();

    if !changes.is_empty() {
        let _ = writeln!(out, "Changes:");
        for (path, change) in changes.iter() {
            match change {
                RepoChanges::Cloned => {
                    let _ = writeln!(out, "- {path}: freshly cloned");
                }
                RepoChanges::Pending(commits) => {
                    let _ = writeln!(out, "- {path}: {} new commit(s)", commits.len());
                    for commit in commits {
                        let _ = writeln!(out, "    {} {} {}", commit.id, commit.date, commit.subject);
                    }
                }
            }
        }
    }

    let failed = tree.failed_steps();
    if failed.is_empty() {
        let _ = writeln!(out, "All commands succeeded");
    } else {
        for (stage, step) in failed {
            let _ = writeln!(out, "- Failed {stage}/{step}");
        }
    }

    out
}
