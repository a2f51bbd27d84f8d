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

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use chronicle_search::{FallbackClient, PrimaryIndexClient, SearchFacade};
use chronicle_storage::RepoStore;
use chronicle_sync::{auth, config::SyncConfig, endpoints, gateway, GatewayState, ReadyState, RoomTable};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chronicle_sync=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SyncConfig::from_env();
    tracing::info!(addr = %config.addr, repos_dir = ?config.repos_dir, "starting chronicle-sync");

    let repo = Arc::new(RepoStore::with_persistence(config.repos_dir.clone()));
    let rooms = Arc::new(RoomTable::new());
    let validator: Arc<dyn auth::TokenValidator> = Arc::from(auth::build_validator(&config));

    let _search = match (&config.search_primary_url, &config.database_url) {
        (Some(url), Some(database_url)) => {
            let primary = Arc::new(PrimaryIndexClient::new(
                url.clone(),
                config.search_primary_key.clone().unwrap_or_default(),
            ));
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let fallback = Arc::new(FallbackClient::new(pool));
            Some(SearchFacade::new(primary, fallback))
        }
        _ => {
            tracing::warn!(
                "SEARCH_PRIMARY_URL or DATABASE_URL not set; hybrid search is not available from this process"
            );
            None
        }
    };

    let gateway_state = Arc::new(GatewayState {
        repo,
        rooms: rooms.clone(),
        validator,
    });

    let ready_state = ReadyState {
        gateway: gateway_state.clone(),
        api_base_url: config.api_base_url.clone(),
    };

    let cors = match &config.cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_origin(origin.parse::<axum::http::HeaderValue>()?),
        None => {
            tracing::warn!("CORS_ORIGIN not set; allowing any origin (development mode)");
            CorsLayer::new().allow_methods(Any).allow_headers(Any).allow_origin(Any)
        }
    };

    let app = Router::new()
        .route("/ws", get(gateway::ws_handler))
        .with_state(gateway_state.clone())
        .route("/health", get(endpoints::health).with_state(gateway_state.clone()))
        .route("/ready", get(endpoints::ready).with_state(ready_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = config.addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "sync gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(rooms))
        .await?;

    Ok(())
}

async fn shutdown_signal(rooms: Arc<RoomTable>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received, closing {} active rooms", rooms.room_count());
    rooms.shutdown();
}
