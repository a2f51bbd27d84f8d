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

//! Content-addressable commit storage for a single document.
//!
//! Commits are deduplicated by id: storing the same commit twice is a no-op.
//! When persisted, each commit lands at
//! `objects/<full-hex>/{content.json,commit.json}`.

use crate::content;
use crate::objects::{Commit, ObjectId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("corrupted object {0}: {1}")]
    Corrupted(ObjectId, String),

    #[error("content error: {0}")]
    Content(#[from] content::ContentError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// On-disk commit metadata sidecar: everything in `Commit` except the
/// content, which lives separately in `content.json`.
#[derive(Debug, Serialize, Deserialize)]
struct CommitMetadata {
    hash: String,
    parents: Vec<String>,
    author: String,
    message: String,
    timestamp_us: i64,
}

pub struct ObjectStore {
    commits: DashMap<ObjectId, Commit>,
    objects_dir: Option<PathBuf>,
}

impl ObjectStore {
    pub fn in_memory() -> Self {
        Self {
            commits: DashMap::new(),
            objects_dir: None,
        }
    }

    pub fn with_persistence(objects_dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&objects_dir)?;
        let store = Self {
            commits: DashMap::new(),
            objects_dir: Some(objects_dir),
        };
        store.load()?;
        Ok(store)
    }

    fn load(&self) -> Result<(), StoreError> {
        let Some(objects_dir) = &self.objects_dir else {
            return Ok(());
        };
        for entry in std::fs::read_dir(objects_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let dir = entry.path();
            let oid = match ObjectId::from_hex(&entry.file_name().to_string_lossy()) {
                Ok(oid) => oid,
                Err(_) => continue,
            };
            let metadata_bytes = std::fs::read(dir.join("commit.json"))?;
            let metadata: CommitMetadata = serde_json::from_slice(&metadata_bytes)?;
            let content_bytes = std::fs::read(dir.join("content.json"))?;
            let content = content::decode(&content_bytes)?;

            let parents = metadata
                .parents
                .iter()
                .map(|hex| {
                    ObjectId::from_hex(hex)
                        .map_err(|_| StoreError::Corrupted(oid, format!("bad parent hex {hex}")))
                })
                .collect::<Result<Vec<_>, _>>()?;

            let timestamp = chrono::DateTime::from_timestamp_micros(metadata.timestamp_us)
                .ok_or_else(|| StoreError::Corrupted(oid, "bad timestamp".to_string()))?;

            self.commits.insert(
                oid,
                Commit {
                    parents,
                    author: metadata.author,
                    message: metadata.message,
                    timestamp,
                    content,
                },
            );
        }
        Ok(())
    }

    fn persist(&self, oid: &ObjectId, commit: &Commit) -> Result<(), StoreError> {
        let Some(objects_dir) = &self.objects_dir else {
            return Ok(());
        };
        let dir = objects_dir.join(oid.to_hex());
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("content.json"), content::encode(&commit.content))?;

        let metadata = CommitMetadata {
            hash: oid.to_hex(),
            parents: commit.parents.iter().map(ObjectId::to_hex).collect(),
            author: commit.author.clone(),
            message: commit.message.clone(),
            timestamp_us: commit
                .timestamp
                .timestamp_micros(),
        };
        std::fs::write(
            dir.join("commit.json"),
            serde_json::to_vec_pretty(&metadata)?,
        )?;
        Ok(())
    }

    /// Store a commit, computing its id. Idempotent: storing identical
    /// content twice returns the same id without rewriting anything.
    pub fn put(&self, commit: Commit) -> Result<ObjectId, StoreError> {
        let oid = commit.object_id();
        if self.commits.contains_key(&oid) {
            return Ok(oid);
        }
        self.persist(&oid, &commit)?;
        self.commits.insert(oid, commit);
        Ok(oid)
    }

    pub fn get(&self, oid: &ObjectId) -> Option<Commit> {
        self.commits.get(oid).map(|r| r.clone())
    }

    pub fn get_required(&self, oid: &ObjectId) -> Result<Commit, StoreError> {
        self.get(oid).ok_or(StoreError::NotFound(*oid))
    }

    pub fn exists(&self, oid: &ObjectId) -> bool {
        self.commits.contains_key(oid)
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content(title: &str) -> content::Content {
        content::Content {
            title: title.to_string(),
            subtitle: "s".into(),
            purpose: "p".into(),
            tiers: "gold".into(),
            enforce: "strict".into(),
            doc: json!({}),
        }
    }

    #[test]
    fn put_is_idempotent_by_content() {
        let store = ObjectStore::in_memory();
        let commit = Commit::root("avery", "first", content("t"));
        let a = store.put(commit.clone()).unwrap();
        let b = store.put(commit).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn persists_and_reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let objects_dir = dir.path().join("objects");
        let oid;
        {
            let store = ObjectStore::with_persistence(objects_dir.clone()).unwrap();
            let commit = Commit::root("avery", "first", content("t"));
            oid = store.put(commit).unwrap();
        }
        let reloaded = ObjectStore::with_persistence(objects_dir).unwrap();
        let commit = reloaded.get_required(&oid).unwrap();
        assert_eq!(commit.message, "first");
        assert_eq!(commit.content.title, "t");
    }

    #[test]
    fn missing_object_is_not_found() {
        let store = ObjectStore::in_memory();
        let bogus = Commit::root("a", "b", content("x")).object_id();
        assert!(matches!(
            store.get_required(&bogus),
            Err(StoreError::NotFound(_))
        ));
    }
}
