// src/sync/changes.rs

//! Per-repository pending upstream changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One upstream commit not yet present locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    pub date: String,
    pub subject: String,
}

/// What a synchronised repository contributes to the change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoChanges {
    /// The repository did not exist and was freshly cloned.
    Cloned,
    /// Upstream commits, oldest first. Never empty.
    Pending(Vec<CommitInfo>),
}

/// Repository path -> pending changes. Repositories that are up to date,
/// on the wrong branch, or failed to sync have no entry.
///
/// Keyed by a `BTreeMap` so iteration order (and therefore reports and
/// equality) depends only on content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(BTreeMap<String, RepoChanges>);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_cloned(&mut self, path: impl Into<String>) {
        self.0.insert(path.into(), RepoChanges::Cloned);
    }

    /// Record pending commits; an empty list records nothing.
    pub fn insert_pending(&mut self, path: impl Into<String>, commits: Vec<CommitInfo>) {
        if !commits.is_empty() {
            self.0.insert(path.into(), RepoChanges::Pending(commits));
        }
    }

    pub fn get(&self, path: &str) -> Option<&RepoChanges> {
        self.0.get(path)
    }

    /// Pending commits for `path`, if any. `None` for cloned repositories.
    pub fn pending(&self, path: &str) -> Option<&[CommitInfo]> {
        match self.0.get(path) {
            Some(RepoChanges::Pending(commits)) => Some(commits),
            _ => None,
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RepoChanges)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}
