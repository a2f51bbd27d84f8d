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

//! Shared request/response shapes for the search facade.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Document,
    Thread,
    Decision,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Document => "document",
            RecordType::Thread => "thread",
            RecordType::Decision => "decision",
        }
    }

    pub const ALL: [RecordType; 3] = [RecordType::Document, RecordType::Thread, RecordType::Decision];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Visibility {
    Internal,
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    #[serde(default)]
    pub filter_type: Option<RecordType>,
    #[serde(default)]
    pub filter_space_id: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub is_external: bool,
}

impl SearchQuery {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn limit_or_default(&self) -> u32 {
        self.limit.unwrap_or(20).min(200)
    }

    pub fn offset_or_default(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub id: String,
    pub title: String,
    pub snippet: String,
    pub document_id: String,
    pub space_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub total: u64,
    pub query: String,
}

impl SearchResponse {
    pub fn empty(query: &str) -> Self {
        Self {
            results: Vec::new(),
            total: 0,
            query: query.to_string(),
        }
    }

    /// External viewers must never see internal-visibility thread hits.
    pub fn sanitize_for_external(mut self) -> Self {
        self.results
            .retain(|hit| !matches!((hit.record_type, hit.visibility), (RecordType::Thread, Some(Visibility::Internal))));
        self.total = self.results.len() as u64;
        self
    }
}

/// A record pushed into the primary index or read in bulk from the
/// relational fallback for reindexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexableRecord {
    pub record_type: RecordType,
    pub id: String,
    pub title: String,
    pub body: String,
    pub document_id: String,
    pub space_id: String,
    pub visibility: Option<Visibility>,
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_internal_threads_only() {
        let response = SearchResponse {
            results: vec![
                SearchHit {
                    record_type: RecordType::Thread,
                    id: "t1".into(),
                    title: "internal thread".into(),
                    snippet: "".into(),
                    document_id: "d1".into(),
                    space_id: "s1".into(),
                    visibility: Some(Visibility::Internal),
                },
                SearchHit {
                    record_type: RecordType::Document,
                    id: "d1".into(),
                    title: "doc".into(),
                    snippet: "".into(),
                    document_id: "d1".into(),
                    space_id: "s1".into(),
                    visibility: Some(Visibility::Internal),
                },
            ],
            total: 2,
            query: "retention".into(),
        };

        let sanitized = response.sanitize_for_external();
        assert_eq!(sanitized.results.len(), 1);
        assert_eq!(sanitized.results[0].record_type, RecordType::Document);
    }

    #[test]
    fn blank_query_is_detected() {
        let query = SearchQuery {
            text: "   ".into(),
            filter_type: None,
            filter_space_id: None,
            limit: None,
            offset: None,
            is_external: false,
        };
        assert!(query.is_blank());
    }
}
