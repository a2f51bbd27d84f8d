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

//! Branches and tags: mutable/immutable references to commits.
//!
//! One `RefStore` per document. Branch names are unique per document and
//! are never deleted; tags are immutable once created.

use crate::objects::ObjectId;
use dashmap::DashMap;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RefError {
    #[error("unknown branch: {0}")]
    UnknownBranch(String),

    #[error("unknown tag: {0}")]
    UnknownTag(String),

    #[error("tag already exists with a different target: {0}")]
    TagExists(String),

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reference store for a single document's branches and tags, optionally
/// persisted to `<docID>/refs/{heads,tags}/<name>` files holding the target
/// full hex hash.
pub struct RefStore {
    branches: DashMap<String, ObjectId>,
    tags: DashMap<String, ObjectId>,
    refs_dir: Option<PathBuf>,
}

impl RefStore {
    pub fn in_memory() -> Self {
        Self {
            branches: DashMap::new(),
            tags: DashMap::new(),
            refs_dir: None,
        }
    }

    pub fn with_persistence(refs_dir: PathBuf) -> Result<Self, RefError> {
        fs::create_dir_all(refs_dir.join("heads"))?;
        fs::create_dir_all(refs_dir.join("tags"))?;

        let store = Self {
            branches: DashMap::new(),
            tags: DashMap::new(),
            refs_dir: Some(refs_dir),
        };
        store.load()?;
        Ok(store)
    }

    fn load(&self) -> Result<(), RefError> {
        let Some(refs_dir) = &self.refs_dir else {
            return Ok(());
        };

        for (dir, map) in [
            (refs_dir.join("heads"), &self.branches),
            (refs_dir.join("tags"), &self.tags),
        ] {
            if !dir.exists() {
                continue;
            }
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                let content = fs::read_to_string(entry.path())?;
                if let Ok(oid) = ObjectId::from_hex(content.trim()) {
                    map.insert(name, oid);
                }
            }
        }
        Ok(())
    }

    fn persist(&self, kind: &str, name: &str, oid: &ObjectId) -> Result<(), RefError> {
        let Some(refs_dir) = &self.refs_dir else {
            return Ok(());
        };
        fs::write(refs_dir.join(kind).join(name), format!("{}\n", oid.to_hex()))?;
        Ok(())
    }

    /// Idempotent: no-op if `name` already exists.
    pub fn ensure_branch(&self, name: &str, target: ObjectId) -> Result<(), RefError> {
        if self.branches.contains_key(name) {
            return Ok(());
        }
        self.branches.insert(name.to_string(), target);
        self.persist("heads", name, &target)
    }

    pub fn update_branch(&self, name: &str, target: ObjectId) -> Result<(), RefError> {
        self.branches.insert(name.to_string(), target);
        self.persist("heads", name, &target)
    }

    pub fn branch_tip(&self, name: &str) -> Result<ObjectId, RefError> {
        self.branches
            .get(name)
            .map(|r| *r)
            .ok_or_else(|| RefError::UnknownBranch(name.to_string()))
    }

    pub fn branch_exists(&self, name: &str) -> bool {
        self.branches.contains_key(name)
    }

    pub fn list_branches(&self) -> Vec<(String, ObjectId)> {
        self.branches
            .iter()
            .map(|r| (r.key().clone(), *r.value()))
            .collect()
    }

    /// Idempotent: no-op if `name` already points at `target`; error if it
    /// already exists pointing elsewhere.
    pub fn create_tag(&self, name: &str, target: ObjectId) -> Result<(), RefError> {
        if let Some(existing) = self.tags.get(name) {
            return if *existing == target {
                Ok(())
            } else {
                Err(RefError::TagExists(name.to_string()))
            };
        }
        self.tags.insert(name.to_string(), target);
        self.persist("tags", name, &target)
    }

    pub fn tag_target(&self, name: &str) -> Result<ObjectId, RefError> {
        self.tags
            .get(name)
            .map(|r| *r)
            .ok_or_else(|| RefError::UnknownTag(name.to_string()))
    }

    pub fn list_tags(&self) -> Vec<(String, ObjectId)> {
        self.tags
            .iter()
            .map(|r| (r.key().clone(), *r.value()))
            .collect()
    }

    /// Resolve a branch name, tag name, or full commit hex to an id. This
    /// only checks that a full hash is syntactically valid hex of the right
    /// length; `RepoStore::resolve` confirms the id was actually committed
    /// before trusting it, and also handles short-hash resolution.
    pub fn resolve_ref_or_full_hash(&self, rev: &str) -> Option<ObjectId> {
        if let Some(oid) = self.branches.get(rev) {
            return Some(*oid);
        }
        if let Some(oid) = self.tags.get(rev) {
            return Some(*oid);
        }
        if rev.len() == 64 {
            return ObjectId::from_hex(rev).ok();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(seed: &str) -> ObjectId {
        ObjectId::from_content(seed.as_bytes())
    }

    #[test]
    fn ensure_branch_is_idempotent() {
        let store = RefStore::in_memory();
        let a = oid("a");
        store.ensure_branch("main", a).unwrap();
        store.ensure_branch("main", oid("b")).unwrap();
        assert_eq!(store.branch_tip("main").unwrap(), a);
    }

    #[test]
    fn create_tag_idempotent_same_target_errors_on_different_target() {
        let store = RefStore::in_memory();
        let a = oid("a");
        store.create_tag("v1", a).unwrap();
        store.create_tag("v1", a).unwrap();
        assert!(store.create_tag("v1", oid("b")).is_err());
    }

    #[test]
    fn persists_and_reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let refs_dir = dir.path().join("refs");
        let a = oid("a");
        {
            let store = RefStore::with_persistence(refs_dir.clone()).unwrap();
            store.ensure_branch("main", a).unwrap();
            store.create_tag("v1", a).unwrap();
        }
        let reloaded = RefStore::with_persistence(refs_dir).unwrap();
        assert_eq!(reloaded.branch_tip("main").unwrap(), a);
        assert_eq!(reloaded.tag_target("v1").unwrap(), a);
    }
}
