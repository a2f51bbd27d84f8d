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

//! Content-addressed commit objects.
//!
//! Each commit is immutable once created; its id is the BLAKE3 hash of its
//! own canonical encoding (parents, author, message, timestamp, content —
//! everything but the hash itself).

use crate::content::{self, Content};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full commit hash (BLAKE3, 32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub [u8; 32]);

impl ObjectId {
    pub fn from_content(bytes: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(bytes);
        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The public identifier: first 7 hex characters of the full hash.
    pub fn short(&self) -> String {
        self.to_hex()[..7].to_string()
    }

    pub fn from_hex(s: &str) -> Result<Self, ParseError> {
        let bytes = hex::decode(s).map_err(|_| ParseError::InvalidHex)?;
        if bytes.len() != 32 {
            return Err(ParseError::InvalidLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    InvalidHex,
    InvalidLength,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::InvalidHex => write!(f, "invalid hex string"),
            ParseError::InvalidLength => write!(f, "invalid length (expected 32 bytes)"),
        }
    }
}

impl std::error::Error for ParseError {}

/// A commit: an immutable snapshot of `Content` with parent references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub parents: Vec<ObjectId>,
    pub author: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub content: Content,
}

impl Commit {
    pub fn root(author: impl Into<String>, message: impl Into<String>, content: Content) -> Self {
        Self {
            parents: vec![],
            author: author.into(),
            message: message.into(),
            timestamp: Utc::now(),
            content,
        }
    }

    pub fn child(
        parent: ObjectId,
        author: impl Into<String>,
        message: impl Into<String>,
        content: Content,
    ) -> Self {
        Self {
            parents: vec![parent],
            author: author.into(),
            message: message.into(),
            timestamp: Utc::now(),
            content,
        }
    }

    pub fn merge(
        parents: Vec<ObjectId>,
        author: impl Into<String>,
        message: impl Into<String>,
        content: Content,
    ) -> Self {
        Self {
            parents,
            author: author.into(),
            message: message.into(),
            timestamp: Utc::now(),
            content,
        }
    }

    /// Hash is computed over the canonical content encoding plus the rest of
    /// the commit metadata, so identical content committed by different
    /// authors/messages never collides.
    pub fn object_id(&self) -> ObjectId {
        let mut buf = Vec::new();
        for parent in &self.parents {
            buf.extend_from_slice(&parent.0);
        }
        buf.extend_from_slice(self.author.as_bytes());
        buf.push(0);
        buf.extend_from_slice(self.message.as_bytes());
        buf.push(0);
        buf.extend_from_slice(self.timestamp.to_rfc3339().as_bytes());
        buf.push(0);
        buf.extend_from_slice(&content::encode(&self.content));
        ObjectId::from_content(&buf)
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content() -> Content {
        Content {
            title: "t".into(),
            subtitle: "s".into(),
            purpose: "p".into(),
            tiers: "gold".into(),
            enforce: "strict".into(),
            doc: json!({}),
        }
    }

    #[test]
    fn short_hash_is_seven_hex_chars() {
        let commit = Commit::root("avery", "Import document baseline", content());
        let id = commit.object_id();
        assert_eq!(id.short().len(), 7);
        assert!(id.to_hex().starts_with(&id.short()));
    }

    #[test]
    fn hex_round_trip() {
        let commit = Commit::root("avery", "msg", content());
        let id = commit.object_id();
        let parsed = ObjectId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn distinct_messages_hash_differently() {
        let a = Commit::root("avery", "first", content());
        let b = Commit::root("avery", "second", content());
        assert_ne!(a.object_id(), b.object_id());
    }
}
