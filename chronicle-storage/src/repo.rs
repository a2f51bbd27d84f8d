// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-document repository facade: the public surface every caller (sync
//! gateway, offline tooling) uses to read and mutate a document's history.

use crate::content::Content;
use crate::lock::LockRegistry;
use crate::objects::{Commit, ObjectId};
use crate::refs::{RefError, RefStore};
use crate::store::{ObjectStore, StoreError};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::path::PathBuf;
use thiserror::Error;

pub const MAIN_BRANCH: &str = "main";
const BASELINE_MESSAGE: &str = "Import document baseline";

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("unknown document: {0}")]
    UnknownDocument(String),

    #[error("unknown branch: {0}")]
    UnknownBranch(String),

    #[error("unknown commit: {0}")]
    UnknownCommit(String),

    #[error("no changes to commit")]
    NoChanges,

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for RepoError {
    fn from(err: StoreError) -> Self {
        RepoError::Storage(err.to_string())
    }
}

impl From<RefError> for RepoError {
    fn from(err: RefError) -> Self {
        match err {
            RefError::UnknownBranch(name) => RepoError::UnknownBranch(name),
            RefError::UnknownTag(name) => RepoError::UnknownCommit(name),
            other => RepoError::Storage(other.to_string()),
        }
    }
}

/// Metadata returned to callers for a single commit. Line-delta counters are
/// reserved but always zero.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CommitInfo {
    pub hash: String,
    pub message: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub added: u32,
    pub removed: u32,
}

impl CommitInfo {
    fn from_commit(oid: ObjectId, commit: &Commit) -> Self {
        Self {
            hash: oid.short(),
            message: commit.message.clone(),
            author: commit.author.clone(),
            created_at: commit.timestamp,
            added: 0,
            removed: 0,
        }
    }
}

/// One document's objects + refs, held together behind the per-document
/// lock registry entry.
struct DocumentRepo {
    objects: ObjectStore,
    refs: RefStore,
}

/// Content-addressed, per-document version history.
pub struct RepoStore {
    repos_dir: Option<PathBuf>,
    documents: DashMap<String, DocumentRepo>,
    locks: LockRegistry,
}

impl RepoStore {
    pub fn in_memory() -> Self {
        Self {
            repos_dir: None,
            documents: DashMap::new(),
            locks: LockRegistry::new(),
        }
    }

    pub fn with_persistence(repos_dir: PathBuf) -> Self {
        Self {
            repos_dir: Some(repos_dir),
            documents: DashMap::new(),
            locks: LockRegistry::new(),
        }
    }

    fn open_document(&self, document_id: &str) -> Result<(), RepoError> {
        if self.documents.contains_key(document_id) {
            return Ok(());
        }
        let (objects, refs) = match &self.repos_dir {
            Some(repos_dir) => {
                let doc_dir = repos_dir.join(document_id);
                let objects = ObjectStore::with_persistence(doc_dir.join("objects"))?;
                let refs = RefStore::with_persistence(doc_dir.join("refs"))?;
                (objects, refs)
            }
            None => (ObjectStore::in_memory(), RefStore::in_memory()),
        };
        self.documents
            .entry(document_id.to_string())
            .or_insert(DocumentRepo { objects, refs });
        Ok(())
    }

    fn require_document(&self, document_id: &str) -> Result<(), RepoError> {
        if self.documents.contains_key(document_id) {
            Ok(())
        } else {
            Err(RepoError::UnknownDocument(document_id.to_string()))
        }
    }

    /// Idempotent: a repo that already exists is left untouched.
    pub fn ensure_repo(
        &self,
        document_id: &str,
        initial: Content,
        author: &str,
    ) -> Result<(), RepoError> {
        if author.trim().is_empty() {
            return Err(RepoError::Validation("author must not be empty".into()));
        }
        let _guard = self.locks.lock(document_id);
        self.open_document(document_id)?;

        let doc = self.documents.get(document_id).expect("just opened");
        if doc.refs.branch_exists(MAIN_BRANCH) {
            return Ok(());
        }

        let commit = Commit::root(author, BASELINE_MESSAGE, initial);
        let oid = doc.objects.put(commit)?;
        doc.refs.ensure_branch(MAIN_BRANCH, oid)?;
        Ok(())
    }

    /// Idempotent: if `name` already exists, returns success untouched.
    pub fn ensure_branch(
        &self,
        document_id: &str,
        name: &str,
        from: &str,
    ) -> Result<(), RepoError> {
        self.require_document(document_id)?;
        let _guard = self.locks.lock(document_id);
        let doc = self.documents.get(document_id).expect("checked above");

        if doc.refs.branch_exists(name) {
            return Ok(());
        }
        let tip = doc
            .refs
            .branch_tip(from)
            .map_err(|_| RepoError::UnknownBranch(from.to_string()))?;
        doc.refs.ensure_branch(name, tip)?;
        Ok(())
    }

    /// Appends a new commit on `branch`. Rejected with `NoChanges` unless
    /// `allow_empty` when identical to the branch tip.
    pub fn commit(
        &self,
        document_id: &str,
        branch: &str,
        content: Content,
        author: &str,
        message: &str,
        allow_empty: bool,
    ) -> Result<CommitInfo, RepoError> {
        if author.trim().is_empty() {
            return Err(RepoError::Validation("author must not be empty".into()));
        }
        self.require_document(document_id)?;
        let _guard = self.locks.lock(document_id);
        let doc = self.documents.get(document_id).expect("checked above");

        let tip_oid = doc.refs.branch_tip(branch)?;
        let tip_commit = doc.objects.get_required(&tip_oid)?;

        if !allow_empty && !crate::content::has_changes(&tip_commit.content, &content) {
            return Err(RepoError::NoChanges);
        }

        let commit = Commit::child(tip_oid, author, message, content);
        let oid = doc.objects.put(commit.clone())?;
        doc.refs.update_branch(branch, oid)?;
        Ok(CommitInfo::from_commit(oid, &commit))
    }

    pub fn head(&self, document_id: &str, branch: &str) -> Result<(Content, CommitInfo), RepoError> {
        self.require_document(document_id)?;
        let _guard = self.locks.lock(document_id);
        let doc = self.documents.get(document_id).expect("checked above");

        let oid = doc.refs.branch_tip(branch)?;
        let commit = doc.objects.get_required(&oid)?;
        let info = CommitInfo::from_commit(oid, &commit);
        Ok((commit.content, info))
    }

    /// Resolves a short or full hash, branch name, or tag name to content.
    pub fn content_by_hash(
        &self,
        document_id: &str,
        hash_or_rev: &str,
    ) -> Result<Content, RepoError> {
        self.require_document(document_id)?;
        let doc = self.documents.get(document_id).expect("checked above");

        let oid = self.resolve(&doc, hash_or_rev)?;
        let commit = doc.objects.get_required(&oid)?;
        Ok(commit.content)
    }

    /// Resolves a branch/tag name or full hex hash to an id, rejecting a
    /// hash that parses but was never committed to this document.
    fn resolve(&self, doc: &DocumentRepo, rev: &str) -> Result<ObjectId, RepoError> {
        if let Some(oid) = doc.refs.resolve_ref_or_full_hash(rev) {
            return if doc.objects.exists(&oid) {
                Ok(oid)
            } else {
                Err(RepoError::UnknownCommit(rev.to_string()))
            };
        }
        // Short-hash resolution: find the one stored commit whose hex
        // starts with the given prefix.
        if rev.len() >= 4 {
            for branch in doc.refs.list_branches() {
                if let Some(oid) = self.find_by_prefix(doc, branch.1, rev) {
                    return Ok(oid);
                }
            }
        }
        Err(RepoError::UnknownCommit(rev.to_string()))
    }

    fn find_by_prefix(&self, doc: &DocumentRepo, from: ObjectId, prefix: &str) -> Option<ObjectId> {
        let mut current = Some(from);
        let mut visited = std::collections::HashSet::new();
        while let Some(oid) = current {
            if !visited.insert(oid) {
                break;
            }
            if oid.to_hex().starts_with(prefix) {
                return Some(oid);
            }
            let commit = doc.objects.get(&oid)?;
            current = commit.parents.first().copied();
        }
        None
    }

    /// Newest-first commit history on `branch`. `limit <= 0` means
    /// unbounded.
    pub fn history(
        &self,
        document_id: &str,
        branch: &str,
        limit: i64,
    ) -> Result<Vec<CommitInfo>, RepoError> {
        self.require_document(document_id)?;
        let _guard = self.locks.lock(document_id);
        let doc = self.documents.get(document_id).expect("checked above");

        let mut entries = Vec::new();
        let mut current = Some(doc.refs.branch_tip(branch)?);
        let mut visited = std::collections::HashSet::new();

        while let Some(oid) = current {
            if !visited.insert(oid) {
                break;
            }
            if limit > 0 && entries.len() as i64 >= limit {
                break;
            }
            let commit = doc.objects.get_required(&oid)?;
            entries.push(CommitInfo::from_commit(oid, &commit));
            current = commit.parents.first().copied();
        }
        Ok(entries)
    }

    /// Idempotent: re-tagging the same target is a no-op; a different
    /// target on an existing name is an error.
    pub fn create_tag(&self, document_id: &str, hash: &str, name: &str) -> Result<(), RepoError> {
        self.require_document(document_id)?;
        let _guard = self.locks.lock(document_id);
        let doc = self.documents.get(document_id).expect("checked above");

        let oid = self.resolve(&doc, hash)?;
        doc.refs.create_tag(name, oid)?;
        Ok(())
    }

    /// Copy-commit merge: overwrites `main`'s tip with `source_branch`'s
    /// content, always as a non-empty commit (`allow_empty = true`), with a
    /// structured trailer appended to `message`.
    pub fn merge_into_main(
        &self,
        document_id: &str,
        source_branch: &str,
        author: &str,
        message: &str,
    ) -> Result<CommitInfo, RepoError> {
        if author.trim().is_empty() {
            return Err(RepoError::Validation("author must not be empty".into()));
        }
        self.require_document(document_id)?;
        let _guard = self.locks.lock(document_id);
        let doc = self.documents.get(document_id).expect("checked above");

        let source_oid = doc.refs.branch_tip(source_branch)?;
        let source_commit = doc.objects.get_required(&source_oid)?;
        let main_oid = doc.refs.branch_tip(MAIN_BRANCH)?;

        let full_message = format!(
            "{message}\n\nmerge: source={source_branch} target=main actor={author} mode=copy-commit"
        );
        let commit = Commit::merge(
            vec![main_oid, source_oid],
            author,
            full_message,
            source_commit.content,
        );
        let oid = doc.objects.put(commit.clone())?;
        doc.refs.update_branch(MAIN_BRANCH, oid)?;
        Ok(CommitInfo::from_commit(oid, &commit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    fn content(purpose: &str) -> Content {
        Content {
            title: "ADR 142".into(),
            subtitle: "Retention policy".into(),
            purpose: purpose.into(),
            tiers: "gold".into(),
            enforce: "strict".into(),
            doc: json!({"type": "doc", "content": []}),
        }
    }

    #[test]
    fn ensure_repo_is_idempotent() {
        let store = RepoStore::in_memory();
        store
            .ensure_repo("doc-1", content("baseline"), "Avery")
            .unwrap();
        store
            .ensure_repo("doc-1", content("different"), "Avery")
            .unwrap();

        let (head, _) = store.head("doc-1", MAIN_BRANCH).unwrap();
        assert_eq!(head.purpose, "baseline");
    }

    #[test]
    fn round_trip_doc_scenario() {
        let store = RepoStore::in_memory();
        store
            .ensure_repo("doc-1", content("baseline"), "Avery")
            .unwrap();
        store
            .ensure_branch("doc-1", "proposal-doc-1", MAIN_BRANCH)
            .unwrap();
        store
            .commit(
                "doc-1",
                "proposal-doc-1",
                content("Updated purpose"),
                "Avery",
                "Update purpose",
                false,
            )
            .unwrap();

        let (head, _) = store.head("doc-1", "proposal-doc-1").unwrap();
        assert_eq!(head.purpose, "Updated purpose");
    }

    #[test]
    fn no_changes_rejected_unless_allow_empty() {
        let store = RepoStore::in_memory();
        store
            .ensure_repo("doc-1", content("baseline"), "Avery")
            .unwrap();
        let result = store.commit(
            "doc-1",
            MAIN_BRANCH,
            content("baseline"),
            "Avery",
            "no-op",
            false,
        );
        assert!(matches!(result, Err(RepoError::NoChanges)));
    }

    #[test]
    fn merge_into_main_copies_source_content() {
        let store = RepoStore::in_memory();
        store
            .ensure_repo("doc-1", content("baseline"), "Avery")
            .unwrap();
        store
            .ensure_branch("doc-1", "proposal-doc-1", MAIN_BRANCH)
            .unwrap();
        store
            .commit(
                "doc-1",
                "proposal-doc-1",
                content("proposed"),
                "Avery",
                "Propose change",
                false,
            )
            .unwrap();

        let info = store
            .merge_into_main("doc-1", "proposal-doc-1", "Avery", "Merge")
            .unwrap();
        assert!(info
            .message
            .contains("merge: source=proposal-doc-1 target=main actor=Avery mode=copy-commit"));

        let (main_head, _) = store.head("doc-1", MAIN_BRANCH).unwrap();
        let (branch_head, _) = store.head("doc-1", "proposal-doc-1").unwrap();
        assert_eq!(main_head, branch_head);
    }

    #[test]
    fn concurrent_writers_produce_one_commit_each() {
        let store = Arc::new(RepoStore::in_memory());
        store
            .ensure_repo("doc-1", content("baseline"), "Avery")
            .unwrap();
        store
            .ensure_branch("doc-1", "proposal-doc-1", MAIN_BRANCH)
            .unwrap();

        let handles: Vec<_> = (0..12)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    store
                        .commit(
                            "doc-1",
                            "proposal-doc-1",
                            content(&format!("purpose-{i:02}")),
                            "Avery",
                            "concurrent edit",
                            false,
                        )
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let history = store.history("doc-1", "proposal-doc-1", -1).unwrap();
        assert_eq!(history.len(), 13);

        let (head, _) = store.head("doc-1", "proposal-doc-1").unwrap();
        assert!(head.purpose.starts_with("purpose-"));
    }

    #[test]
    fn create_tag_idempotent() {
        let store = RepoStore::in_memory();
        store
            .ensure_repo("doc-1", content("baseline"), "Avery")
            .unwrap();
        let (_, info) = store.head("doc-1", MAIN_BRANCH).unwrap();
        store.create_tag("doc-1", &info.hash, "v1").unwrap();
        store.create_tag("doc-1", &info.hash, "v1").unwrap();
    }

    #[test]
    fn history_respects_limit() {
        let store = RepoStore::in_memory();
        store
            .ensure_repo("doc-1", content("baseline"), "Avery")
            .unwrap();
        for i in 0..5 {
            store
                .commit(
                    "doc-1",
                    MAIN_BRANCH,
                    content(&format!("v{i}")),
                    "Avery",
                    "edit",
                    false,
                )
                .unwrap();
        }
        let limited = store.history("doc-1", MAIN_BRANCH, 3).unwrap();
        assert_eq!(limited.len(), 3);
    }

    #[test]
    fn content_by_hash_rejects_well_formed_but_uncommitted_hash() {
        let store = RepoStore::in_memory();
        store
            .ensure_repo("doc-1", content("baseline"), "Avery")
            .unwrap();

        let bogus = Commit::root("nobody", "never committed", content("ghost"))
            .object_id()
            .to_hex();
        let result = store.content_by_hash("doc-1", &bogus);
        assert!(matches!(result, Err(RepoError::UnknownCommit(_))));
    }

    #[test]
    fn create_tag_rejects_well_formed_but_uncommitted_hash() {
        let store = RepoStore::in_memory();
        store
            .ensure_repo("doc-1", content("baseline"), "Avery")
            .unwrap();

        let bogus = Commit::root("nobody", "never committed", content("ghost"))
            .object_id()
            .to_hex();
        let result = store.create_tag("doc-1", &bogus, "v1");
        assert!(matches!(result, Err(RepoError::UnknownCommit(_))));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = RepoStore::with_persistence(dir.path().to_path_buf());
            store
                .ensure_repo("doc-1", content("baseline"), "Avery")
                .unwrap();
        }
        let reopened = RepoStore::with_persistence(dir.path().to_path_buf());
        reopened
            .ensure_repo("doc-1", content("baseline"), "Avery")
            .unwrap();
        let (head, _) = reopened.head("doc-1", MAIN_BRANCH).unwrap();
        assert_eq!(head.purpose, "baseline");
    }
}
