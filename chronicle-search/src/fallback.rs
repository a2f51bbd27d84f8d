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

//! Relational full-text fallback: a `tsvector`-backed UNION query across
//! `documents`, `threads`, and `decisions`, used when the primary index is
//! unhealthy or fails.

use crate::error::SearchError;
use crate::types::{IndexableRecord, RecordType, SearchHit, SearchQuery, SearchResponse, Visibility};
use sqlx::postgres::PgPool;
use sqlx::QueryBuilder;
use sqlx::Row;

pub struct FallbackClient {
    pool: PgPool,
}

impl FallbackClient {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One UNION query across the requested record types, each clause
    /// sharing the same `plainto_tsquery('english', …)` expression.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        let types: Vec<RecordType> = match query.filter_type {
            Some(ty) => vec![ty],
            None => RecordType::ALL.to_vec(),
        };

        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new("");
        for (i, record_type) in types.iter().enumerate() {
            if i > 0 {
                builder.push(" UNION ALL ");
            }
            push_type_clause(&mut builder, *record_type, &query.text, query.filter_space_id.as_deref());
        }
        builder.push(" ORDER BY rank DESC LIMIT ");
        builder.push_bind(query.limit_or_default() as i64);
        builder.push(" OFFSET ");
        builder.push_bind(query.offset_or_default() as i64);

        let rows = builder.build().fetch_all(&self.pool).await?;
        let results = rows.iter().map(row_to_hit).collect::<Vec<_>>();
        let total = results.len() as u64;

        Ok(SearchResponse {
            results,
            total,
            query: query.text.clone(),
        })
    }

    /// Bulk-reads every row of every record-type table, for pushing into a
    /// freshly (re)configured primary index.
    pub async fn all_records(&self) -> Result<Vec<IndexableRecord>, SearchError> {
        let mut records = Vec::new();
        for (table, record_type) in [
            ("documents", RecordType::Document),
            ("threads", RecordType::Thread),
            ("decisions", RecordType::Decision),
        ] {
            let query = format!(
                "SELECT id, title, body, document_id, space_id, visibility, status FROM {table}"
            );
            let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
            for row in rows {
                records.push(IndexableRecord {
                    record_type,
                    id: row.try_get("id")?,
                    title: row.try_get("title")?,
                    body: row.try_get("body")?,
                    document_id: row.try_get("document_id")?,
                    space_id: row.try_get("space_id")?,
                    visibility: row
                        .try_get::<Option<String>, _>("visibility")?
                        .and_then(|v| match v.as_str() {
                            "INTERNAL" => Some(Visibility::Internal),
                            "EXTERNAL" => Some(Visibility::External),
                            _ => None,
                        }),
                    status: row.try_get("status")?,
                });
            }
        }
        Ok(records)
    }
}

fn push_type_clause<'a>(
    builder: &mut QueryBuilder<'a, sqlx::Postgres>,
    record_type: RecordType,
    text: &'a str,
    space_id: Option<&'a str>,
) {
    let table = match record_type {
        RecordType::Document => "documents",
        RecordType::Thread => "threads",
        RecordType::Decision => "decisions",
    };

    builder.push(format!(
        "SELECT '{}' AS kind, id, title, body, document_id, space_id, visibility, \
         ts_rank(search_vector, plainto_tsquery('english', ",
        record_type.as_str()
    ));
    builder.push_bind(text);
    builder.push(format!(")) AS rank FROM {table} WHERE search_vector @@ plainto_tsquery('english', "));
    builder.push_bind(text);
    builder.push(")");
    if let Some(space_id) = space_id {
        builder.push(" AND space_id = ");
        builder.push_bind(space_id);
    }
}

fn row_to_hit(row: &sqlx::postgres::PgRow) -> SearchHit {
    let kind: String = row.try_get("kind").unwrap_or_default();
    let record_type = match kind.as_str() {
        "thread" => RecordType::Thread,
        "decision" => RecordType::Decision,
        _ => RecordType::Document,
    };
    let body: String = row.try_get("body").unwrap_or_default();
    SearchHit {
        record_type,
        id: row.try_get("id").unwrap_or_default(),
        title: row.try_get("title").unwrap_or_default(),
        snippet: body.chars().take(200).collect(),
        document_id: row.try_get("document_id").unwrap_or_default(),
        space_id: row.try_get("space_id").unwrap_or_default(),
        visibility: row
            .try_get::<Option<String>, _>("visibility")
            .ok()
            .flatten()
            .and_then(|v| match v.as_str() {
                "INTERNAL" => Some(Visibility::Internal),
                "EXTERNAL" => Some(Visibility::External),
                _ => None,
            }),
    }
}
