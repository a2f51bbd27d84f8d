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

//! Canonical document payload and its deterministic codec.
//!
//! `Content` is the entity stored at every commit: a handful of scalar
//! fields plus an opaque rich-tree `doc`. Encoding is deterministic (fixed
//! field order, stable whitespace) so the same logical content always hashes
//! to the same object id.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The canonical document payload stored at each commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub title: String,
    pub subtitle: String,
    pub purpose: String,
    pub tiers: String,
    pub enforce: String,
    /// Opaque rich-tree JSON. Stored verbatim; never schema-validated.
    pub doc: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to decode content: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One scalar-field difference, or the sentinel `doc` entry when the rich
/// trees differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field: String,
    pub before: String,
    pub after: String,
}

/// Encode `Content` to its canonical byte sequence: pretty-printed JSON with
/// keys in declaration order and a terminating newline, suitable for
/// content-addressed hashing and for the `content.json` on-disk contract.
pub fn encode(content: &Content) -> Vec<u8> {
    let mut bytes = serde_json::to_vec_pretty(content).expect("Content serializes infallibly");
    bytes.push(b'\n');
    bytes
}

/// Decode a previously-encoded `Content`.
pub fn decode(bytes: &[u8]) -> Result<Content, ContentError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Recursively sort object keys and drop the top-level whitespace noise so
/// two differently-formatted encodings of the same logical tree compare
/// equal.
fn normalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<(String, serde_json::Value)> = map
                .iter()
                .map(|(k, v)| (k.clone(), normalize(v)))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            serde_json::Value::Object(entries.into_iter().collect())
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(normalize).collect())
        }
        other => other.clone(),
    }
}

fn docs_differ(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    normalize(a) != normalize(b)
}

/// True if any scalar field differs or the normalized rich trees differ.
pub fn has_changes(a: &Content, b: &Content) -> bool {
    a.title != b.title
        || a.subtitle != b.subtitle
        || a.purpose != b.purpose
        || a.tiers != b.tiers
        || a.enforce != b.enforce
        || docs_differ(&a.doc, &b.doc)
}

/// Field-by-field diff, scalar fields in sorted-by-name order, with a
/// sentinel `doc` entry appended when the rich trees differ.
pub fn diff_fields(a: &Content, b: &Content) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();

    let scalar = [
        ("enforce", &a.enforce, &b.enforce),
        ("purpose", &a.purpose, &b.purpose),
        ("subtitle", &a.subtitle, &b.subtitle),
        ("tiers", &a.tiers, &b.tiers),
        ("title", &a.title, &b.title),
    ];

    for (field, before, after) in scalar {
        if before != after {
            diffs.push(FieldDiff {
                field: field.to_string(),
                before: before.clone(),
                after: after.clone(),
            });
        }
    }

    if docs_differ(&a.doc, &b.doc) {
        diffs.push(FieldDiff {
            field: "doc".to_string(),
            before: "<rich tree>".to_string(),
            after: "<rich tree>".to_string(),
        });
    }

    diffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Content {
        Content {
            title: "ADR 142".to_string(),
            subtitle: "Retention policy".to_string(),
            purpose: "Define retention tiers".to_string(),
            tiers: "gold, silver, bronze".to_string(),
            enforce: "strict".to_string(),
            doc: json!({"type": "doc", "content": [{"type": "heading"}]}),
        }
    }

    #[test]
    fn round_trip() {
        let content = sample();
        let bytes = encode(&content);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(content, decoded);
    }

    #[test]
    fn encode_is_deterministic_and_newline_terminated() {
        let content = sample();
        let a = encode(&content);
        let b = encode(&content);
        assert_eq!(a, b);
        assert_eq!(*a.last().unwrap(), b'\n');
    }

    #[test]
    fn whitespace_and_key_order_do_not_count_as_changes() {
        let mut a = sample();
        let mut b = sample();
        a.doc = json!({"type": "doc", "content": [{"type": "heading"}]});
        b.doc = json!({"content": [{"type":  "heading"}], "type": "doc"});
        assert!(!has_changes(&a, &b));
        assert!(diff_fields(&a, &b).is_empty());
    }

    #[test]
    fn scalar_change_is_detected() {
        let a = sample();
        let mut b = sample();
        b.purpose = "Updated purpose".to_string();

        assert!(has_changes(&a, &b));
        let diffs = diff_fields(&a, &b);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].field, "purpose");
        assert_eq!(diffs[0].after, "Updated purpose");
    }

    #[test]
    fn doc_change_emits_sentinel_entry() {
        let a = sample();
        let mut b = sample();
        b.doc = json!({"type": "doc", "content": []});

        let diffs = diff_fields(&a, &b);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].field, "doc");
    }
}
