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

//! Client for the primary full-text index. Speaks the same REST shape as a
//! Meilisearch instance: `POST /indexes/:uid/search`, `PATCH
//! /indexes/:uid/settings`, `GET /health`.

use crate::error::SearchError;
use crate::types::{IndexableRecord, RecordType, SearchHit, SearchQuery, SearchResponse, Visibility};
use serde::{Deserialize, Serialize};
use serde_json::json;

const INDEX_NAMES: [(RecordType, &str); 3] = [
    (RecordType::Document, "documents"),
    (RecordType::Thread, "threads"),
    (RecordType::Decision, "decisions"),
];

fn index_name(record_type: RecordType) -> &'static str {
    INDEX_NAMES
        .iter()
        .find(|(ty, _)| *ty == record_type)
        .map(|(_, name)| *name)
        .expect("every RecordType has an index")
}

pub struct PrimaryIndexClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct IndexSearchRequest<'a> {
    q: &'a str,
    filter: Option<String>,
    limit: u32,
    offset: u32,
}

#[derive(Debug, Deserialize)]
struct IndexSearchResponse {
    hits: Vec<serde_json::Value>,
    #[serde(rename = "estimatedTotalHits")]
    estimated_total_hits: u64,
}

impl PrimaryIndexClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.api_key)
    }

    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        matches!(
            self.authed(self.client.get(&url)).send().await,
            Ok(response) if response.status().is_success()
        )
    }

    fn build_filter(space_id: Option<&str>, record_type: RecordType) -> Option<String> {
        let mut clauses = Vec::new();
        if let Some(space_id) = space_id {
            clauses.push(format!("spaceId = \"{space_id}\""));
        }
        if record_type == RecordType::Thread {
            // Primary queries always run per-index; internal filtering for
            // external viewers happens after retrieval regardless of backend.
        }
        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" AND "))
        }
    }

    async fn search_index(
        &self,
        record_type: RecordType,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let url = format!("{}/indexes/{}/search", self.base_url, index_name(record_type));
        let body = IndexSearchRequest {
            q: &query.text,
            filter: Self::build_filter(query.filter_space_id.as_deref(), record_type),
            limit: query.limit_or_default(),
            offset: query.offset_or_default(),
        };

        let response = self
            .authed(self.client.post(&url).json(&body))
            .send()
            .await?
            .error_for_status()?
            .json::<IndexSearchResponse>()
            .await?;

        Ok(response
            .hits
            .into_iter()
            .filter_map(|value| hit_from_json(record_type, value))
            .collect())
    }

    /// Query every requested index and merge results, newest-ranked first
    /// as each backend returns them.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        let types: Vec<RecordType> = match query.filter_type {
            Some(ty) => vec![ty],
            None => RecordType::ALL.to_vec(),
        };

        let mut results = Vec::new();
        for record_type in types {
            results.extend(self.search_index(record_type, query).await?);
        }

        let total = results.len() as u64;
        Ok(SearchResponse {
            results,
            total,
            query: query.text.clone(),
        })
    }

    async fn upsert(&self, record: &IndexableRecord) -> Result<(), SearchError> {
        let url = format!(
            "{}/indexes/{}/documents",
            self.base_url,
            index_name(record.record_type)
        );
        self.authed(self.client.post(&url).json(&[to_index_document(record)]))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn index_record(&self, record: &IndexableRecord) -> Result<(), SearchError> {
        self.upsert(record).await
    }

    pub async fn delete_record(&self, record_type: RecordType, id: &str) -> Result<(), SearchError> {
        let url = format!(
            "{}/indexes/{}/documents/{}",
            self.base_url,
            index_name(record_type),
            id
        );
        self.authed(self.client.delete(&url)).send().await?.error_for_status()?;
        Ok(())
    }

    pub async fn bulk_index(&self, records: &[IndexableRecord]) -> Result<(), SearchError> {
        for batch in records.chunks(500) {
            for record_type in RecordType::ALL {
                let documents: Vec<_> = batch
                    .iter()
                    .filter(|r| r.record_type == record_type)
                    .map(to_index_document)
                    .collect();
                if documents.is_empty() {
                    continue;
                }
                let url = format!(
                    "{}/indexes/{}/documents",
                    self.base_url,
                    index_name(record_type)
                );
                self.authed(self.client.post(&url).json(&documents))
                    .send()
                    .await?
                    .error_for_status()?;
            }
        }
        Ok(())
    }

    /// Reconfigures primary keys, filterable, and searchable attributes for
    /// every index. Called when the index transitions from unhealthy to
    /// healthy so a freshly restarted backend is immediately queryable.
    pub async fn configure_indexes(&self) -> Result<(), SearchError> {
        for (_, name) in INDEX_NAMES {
            let url = format!("{}/indexes/{}/settings", self.base_url, name);
            let settings = json!({
                "searchableAttributes": ["title", "body"],
                "filterableAttributes": ["spaceId", "visibility", "status", "documentId"],
            });
            self.authed(self.client.patch(&url).json(&settings))
                .send()
                .await?
                .error_for_status()?;

            let pk_url = format!("{}/indexes/{}", self.base_url, name);
            self.authed(self.client.patch(&pk_url).json(&json!({"primaryKey": "id"})))
                .send()
                .await?
                .error_for_status()?;
        }
        Ok(())
    }
}

fn to_index_document(record: &IndexableRecord) -> serde_json::Value {
    json!({
        "id": record.id,
        "title": record.title,
        "body": record.body,
        "documentId": record.document_id,
        "spaceId": record.space_id,
        "visibility": record.visibility,
        "status": record.status,
    })
}

fn hit_from_json(record_type: RecordType, value: serde_json::Value) -> Option<SearchHit> {
    Some(SearchHit {
        record_type,
        id: value.get("id")?.as_str()?.to_string(),
        title: value.get("title").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        snippet: value
            .get("_formatted")
            .and_then(|v| v.get("body"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        document_id: value
            .get("documentId")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        space_id: value.get("spaceId").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        visibility: value
            .get("visibility")
            .and_then(|v| v.as_str())
            .and_then(|v| match v {
                "INTERNAL" => Some(Visibility::Internal),
                "EXTERNAL" => Some(Visibility::External),
                _ => None,
            }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_from_json_parses_formatted_snippet() {
        let value = json!({
            "id": "doc-1",
            "title": "ADR 142",
            "_formatted": {"body": "…retention tiers…"},
            "documentId": "doc-1",
            "spaceId": "s-1",
            "visibility": "INTERNAL",
        });
        let hit = hit_from_json(RecordType::Document, value).unwrap();
        assert_eq!(hit.snippet, "…retention tiers…");
        assert_eq!(hit.visibility, Some(Visibility::Internal));
    }

    #[test]
    fn index_name_is_stable_per_type() {
        assert_eq!(index_name(RecordType::Document), "documents");
        assert_eq!(index_name(RecordType::Thread), "threads");
        assert_eq!(index_name(RecordType::Decision), "decisions");
    }
}
