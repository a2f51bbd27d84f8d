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

//! Sync gateway configuration, read entirely from the environment. There is
//! no config-file layer here; that's the host application's job.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub addr: String,
    pub repos_dir: PathBuf,
    pub database_url: Option<String>,
    pub cors_origin: Option<String>,

    pub jwt_secret: Option<String>,
    pub sync_token: Option<String>,
    pub access_ttl_seconds: u64,
    pub refresh_ttl_seconds: u64,

    pub search_primary_url: Option<String>,
    pub search_primary_key: Option<String>,

    pub sync_port: u16,
    pub sync_data_dir: PathBuf,
    pub api_base_url: Option<String>,
    pub token_secret: Option<String>,
}

fn default_access_ttl() -> u64 {
    900
}

fn default_refresh_ttl() -> u64 {
    60 * 60 * 24 * 30
}

fn default_sync_port() -> u16 {
    8787
}

impl SyncConfig {
    /// Reads every recognized environment variable, falling back to
    /// development-friendly defaults.
    pub fn from_env() -> Self {
        Self {
            addr: std::env::var("ADDR").unwrap_or_else(|_| "0.0.0.0:8787".to_string()),
            repos_dir: std::env::var("REPOS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/repos")),
            database_url: std::env::var("DATABASE_URL").ok(),
            cors_origin: std::env::var("CORS_ORIGIN").ok(),

            jwt_secret: std::env::var("JWT_SECRET").ok(),
            sync_token: std::env::var("SYNC_TOKEN").ok(),
            access_ttl_seconds: std::env::var("ACCESS_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_access_ttl),
            refresh_ttl_seconds: std::env::var("REFRESH_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_refresh_ttl),

            search_primary_url: std::env::var("SEARCH_PRIMARY_URL").ok(),
            search_primary_key: std::env::var("SEARCH_PRIMARY_KEY").ok(),

            sync_port: std::env::var("SYNC_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_sync_port),
            sync_data_dir: std::env::var("SYNC_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/sync")),
            api_base_url: std::env::var("API_BASE_URL").ok(),
            token_secret: std::env::var("TOKEN_SECRET").ok(),
        }
    }

    /// An HTTP delegate validates tokens against the host API when
    /// configured; otherwise the gateway validates locally.
    pub fn uses_http_token_delegate(&self) -> bool {
        self.api_base_url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane_without_any_env() {
        // Isolated to this process; other tests may set/unset the same
        // vars, so only assert on keys this test doesn't touch.
        let config = SyncConfig::from_env();
        assert_eq!(config.access_ttl_seconds > 0, true);
        assert!(config.sync_port > 0);
    }

    #[test]
    fn http_delegate_used_only_when_api_base_url_set() {
        std::env::remove_var("API_BASE_URL");
        let config = SyncConfig::from_env();
        assert!(!config.uses_http_token_delegate());

        std::env::set_var("API_BASE_URL", "http://localhost:4000");
        let config = SyncConfig::from_env();
        assert!(config.uses_http_token_delegate());
        std::env::remove_var("API_BASE_URL");
    }
}
