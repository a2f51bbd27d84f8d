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

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("primary index unavailable: {0}")]
    BackendUnavailable(String),

    #[error("relational fallback error: {0}")]
    Fallback(#[from] sqlx::Error),

    #[error("primary index request error: {0}")]
    Primary(#[from] reqwest::Error),

    #[error("validation: {0}")]
    Validation(String),
}
