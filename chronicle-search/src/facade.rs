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

//! The facade callers use: one `search` call that transparently picks the
//! primary index or the relational fallback, plus fire-and-forget index
//! maintenance.

use crate::error::SearchError;
use crate::fallback::FallbackClient;
use crate::health::IndexHealthMonitor;
use crate::primary::PrimaryIndexClient;
use crate::types::{IndexableRecord, RecordType, SearchQuery, SearchResponse};
use std::sync::Arc;
use tracing::warn;

pub struct SearchFacade {
    primary: Arc<PrimaryIndexClient>,
    fallback: Arc<FallbackClient>,
    health: Arc<IndexHealthMonitor>,
}

impl SearchFacade {
    pub fn new(primary: Arc<PrimaryIndexClient>, fallback: Arc<FallbackClient>) -> Arc<Self> {
        let health = IndexHealthMonitor::new();
        health.spawn(primary.clone());
        Arc::new(Self {
            primary,
            fallback,
            health,
        })
    }

    pub async fn search(&self, query: SearchQuery) -> Result<SearchResponse, SearchError> {
        if query.is_blank() {
            return Ok(SearchResponse::empty(&query.text));
        }

        let response = if self.health.is_healthy() {
            match self.primary.search(&query).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(error = %err, "primary index query failed, falling back");
                    self.fallback.search(&query).await?
                }
            }
        } else {
            self.fallback.search(&query).await?
        };

        Ok(if query.is_external {
            response.sanitize_for_external()
        } else {
            response
        })
    }

    fn dispatch_maintenance<F>(&self, op: F)
    where
        F: std::future::Future<Output = Result<(), SearchError>> + Send + 'static,
    {
        if !self.health.is_healthy() {
            return;
        }
        tokio::spawn(async move {
            if let Err(err) = op.await {
                warn!(error = %err, "index maintenance operation failed");
            }
        });
    }

    pub fn index_record(&self, record: IndexableRecord) {
        let primary = self.primary.clone();
        self.dispatch_maintenance(async move { primary.index_record(&record).await });
    }

    pub fn delete_record(&self, record_type: RecordType, id: String) {
        let primary = self.primary.clone();
        self.dispatch_maintenance(async move { primary.delete_record(record_type, &id).await });
    }

    /// Loads every record from the relational backend and pushes them to
    /// the primary index in bulk batches.
    pub async fn reindex_all_from_fallback(&self) -> Result<(), SearchError> {
        if !self.health.is_healthy() {
            return Ok(());
        }
        let records = self.fallback.all_records().await?;
        self.primary.bulk_index(&records).await
    }

    pub fn shutdown(&self) {
        self.health.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_query_short_circuits() {
        let query = SearchQuery {
            text: "  ".into(),
            filter_type: None,
            filter_space_id: None,
            limit: None,
            offset: None,
            is_external: false,
        };
        assert!(query.is_blank());
    }
}
