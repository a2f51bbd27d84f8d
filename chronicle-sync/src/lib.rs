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

//! Real-time sync gateway: authenticates WebSocket clients, fans out
//! canonical document state per `(documentId, branchId)` room, and
//! persists writes through `chronicle_storage::RepoStore`.

pub mod auth;
pub mod config;
pub mod endpoints;
pub mod gateway;
pub mod room;

pub use auth::{build_validator, AuthError, Identity, TokenValidator};
pub use config::SyncConfig;
pub use endpoints::{health, ready, HealthResponse, ReadyState};
pub use gateway::{ws_handler, ConnectParams, GatewayState};
pub use room::{Room, RoomSnapshot, RoomTable, ServerEnvelope};
