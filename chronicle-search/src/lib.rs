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

//! Hybrid search: a primary full-text index with automatic failover to a
//! relational full-text fallback.

pub mod error;
pub mod facade;
pub mod fallback;
pub mod health;
pub mod primary;
pub mod types;

pub use error::SearchError;
pub use facade::SearchFacade;
pub use fallback::FallbackClient;
pub use health::IndexHealthMonitor;
pub use primary::PrimaryIndexClient;
pub use types::{IndexableRecord, RecordType, SearchHit, SearchQuery, SearchResponse, Visibility};
