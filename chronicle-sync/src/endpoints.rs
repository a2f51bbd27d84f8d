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

//! `/health` and `/ready` — liveness always reports room counts; readiness
//! additionally probes the host API's `/api/health`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::gateway::GatewayState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub rooms: usize,
}

pub async fn health(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(HealthResponse {
        ok: true,
        service: "sync",
        rooms: state.rooms.room_count(),
    })
}

#[derive(Clone)]
pub struct ReadyState {
    pub gateway: Arc<GatewayState>,
    pub api_base_url: Option<String>,
}

pub async fn ready(State(state): State<ReadyState>) -> impl IntoResponse {
    let Some(api_base_url) = &state.api_base_url else {
        return (StatusCode::OK, Json(HealthResponse {
            ok: true,
            service: "sync",
            rooms: state.gateway.rooms.room_count(),
        }));
    };

    let client = reqwest::Client::new();
    let url = format!("{api_base_url}/api/health");
    let api_ok = matches!(client.get(&url).send().await, Ok(resp) if resp.status().is_success());

    let status = if api_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(HealthResponse {
            ok: api_ok,
            service: "sync",
            rooms: state.gateway.rooms.room_count(),
        }),
    )
}
