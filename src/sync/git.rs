// src/sync/git.rs

//! The git command lines the coordinator issues, and parsing of their output.

use tracing::warn;

use crate::config::RepoSpec;
use crate::errors::Result;
use crate::exec::{TemplateArgs, render};

use super::changes::CommitInfo;

pub const FETCH: &str = "git fetch --all";
pub const CURRENT_BRANCH: &str = "git rev-parse --abbrev-ref HEAD";
/// Upstream commits missing locally, oldest first, as `id<TAB>date<TAB>subject`.
pub const UPSTREAM_COMMITS: &str = "git log --reverse --pretty=format:%h%x09%ai%x09%s HEAD..@{upstream}";
pub const REBASE: &str = "git rebase";
pub const REBASE_ABORT: &str = "git rebase --abort";

const CLONE_TEMPLATE: &str = "git clone {url} {path} --branch {branch}";

pub fn clone_command(repo: &RepoSpec) -> Result<String> {
    let args = TemplateArgs::new()
        .named("url", &repo.url)
        .named("path", &repo.path)
        .named("branch", &repo.branch);
    render(CLONE_TEMPLATE, &args)
}

/// Parse [`UPSTREAM_COMMITS`] output. Malformed lines are skipped.
pub fn parse_commits(output: &str) -> Vec<CommitInfo> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut fields = line.splitn(3, '\t');
            match (fields.next(), fields.next(), fields.next()) {
                (Some(id), Some(date), Some(subject)) => Some(CommitInfo {
                    id: id.trim().to_string(),
                    date: date.trim().to_string(),
                    subject: subject.trim_end().to_string(),
                }),
                _ => {
                    warn!(line, "unparseable git log line; skipping");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_command_uses_url_path_and_branch() {
        let repo = RepoSpec {
            path: "erp".to_string(),
            url: "git@github.com:gisce/erp.git".to_string(),
            branch: "developer".to_string(),
            user: "gisce".to_string(),
            tests: vec![],
        };
        assert_eq!(
            clone_command(&repo).unwrap(),
            "git clone git@github.com:gisce/erp.git erp --branch developer"
        );
    }

    #[test]
    fn parses_log_lines_in_order() {
        let out = "a1b2c3d\t2024-05-01 09:00:00 +0200\tFix invoice rounding\n\
                   e4f5a6b\t2024-05-02 10:30:00 +0200\tAdd tariff 3.0TD: peaks\tand tabs\n";
        let commits = parse_commits(out);

        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].id, "a1b2c3d");
        assert_eq!(commits[0].subject, "Fix invoice rounding");
        assert_eq!(commits[1].date, "2024-05-02 10:30:00 +0200");
        assert_eq!(commits[1].subject, "Add tariff 3.0TD: peaks\tand tabs");
    }

    #[test]
    fn malformed_and_blank_lines_are_skipped() {
        let commits = parse_commits("\n garbage \nabc\t2024-01-01\tok\n");
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].id, "abc");
    }
}
