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

//! Per-document, content-addressed version history.
//!
//! A repository per document: branches and tags point into a BLAKE3-hashed
//! commit chain, mutation is serialized through a per-document lock, and
//! everything persists as plain files under `REPOS_DIR/<documentID>/`.

pub mod content;
pub mod lock;
pub mod objects;
pub mod refs;
pub mod repo;
pub mod store;

pub use content::{Content, ContentError, FieldDiff};
pub use lock::{DocumentGuard, LockRegistry};
pub use objects::{Commit, ObjectId, ParseError};
pub use refs::{RefError, RefStore};
pub use repo::{CommitInfo, RepoError, RepoStore, MAIN_BRANCH};
pub use store::{ObjectStore, StoreError};
