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

//! Validates the `token` query parameter on connect into a user identity
//! and a writable flag.

use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SyncConfig;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token rejected")]
    Rejected,

    #[error("auth backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub user_name: String,
    pub writable: bool,
}

#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<Identity, AuthError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    writable: bool,
    exp: usize,
}

/// Validates tokens as local JWTs signed with `JWT_SECRET`, or as the raw
/// static `SYNC_TOKEN` (treated as a full-access service credential).
pub struct LocalTokenValidator {
    jwt_secret: Option<String>,
    sync_token: Option<String>,
}

impl LocalTokenValidator {
    pub fn new(jwt_secret: Option<String>, sync_token: Option<String>) -> Self {
        Self {
            jwt_secret,
            sync_token,
        }
    }
}

#[async_trait]
impl TokenValidator for LocalTokenValidator {
    async fn validate(&self, token: &str) -> Result<Identity, AuthError> {
        if let Some(sync_token) = &self.sync_token {
            if !sync_token.is_empty() && token == sync_token {
                return Ok(Identity {
                    user_name: "service".to_string(),
                    writable: true,
                });
            }
        }

        let secret = self.jwt_secret.as_ref().ok_or(AuthError::Rejected)?;
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AuthError::Rejected)?;

        Ok(Identity {
            user_name: data.claims.sub,
            writable: data.claims.writable,
        })
    }
}

/// Delegates validation to the host API's bearer-auth introspection
/// endpoint.
pub struct HttpTokenValidator {
    client: reqwest::Client,
    api_base_url: String,
}

impl HttpTokenValidator {
    pub fn new(api_base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IntrospectResponse {
    #[serde(rename = "userName")]
    user_name: String,
    writable: bool,
}

#[async_trait]
impl TokenValidator for HttpTokenValidator {
    async fn validate(&self, token: &str) -> Result<Identity, AuthError> {
        let url = format!("{}/api/auth/introspect", self.api_base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| AuthError::Backend(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Rejected);
        }

        let body: IntrospectResponse = response
            .json()
            .await
            .map_err(|err| AuthError::Backend(err.to_string()))?;

        Ok(Identity {
            user_name: body.user_name,
            writable: body.writable,
        })
    }
}

/// Picks the HTTP delegate when `API_BASE_URL` is configured, else falls
/// back to local JWT/static-token validation.
pub fn build_validator(config: &SyncConfig) -> Box<dyn TokenValidator> {
    if let Some(api_base_url) = &config.api_base_url {
        Box::new(HttpTokenValidator::new(api_base_url.clone()))
    } else {
        Box::new(LocalTokenValidator::new(
            config.jwt_secret.clone(),
            config.sync_token.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    #[tokio::test]
    async fn sync_token_grants_writable_service_identity() {
        let validator = LocalTokenValidator::new(None, Some("svc-secret".to_string()));
        let identity = validator.validate("svc-secret").await.unwrap();
        assert!(identity.writable);
        assert_eq!(identity.user_name, "service");
    }

    #[tokio::test]
    async fn valid_jwt_is_accepted() {
        let claims = Claims {
            sub: "avery".to_string(),
            writable: true,
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let validator = LocalTokenValidator::new(Some("test-secret".to_string()), None);
        let identity = validator.validate(&token).await.unwrap();
        assert_eq!(identity.user_name, "avery");
        assert!(identity.writable);
    }

    #[tokio::test]
    async fn expired_jwt_is_rejected() {
        let claims = Claims {
            sub: "avery".to_string(),
            writable: true,
            exp: (chrono::Utc::now().timestamp() - 3600) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let validator = LocalTokenValidator::new(Some("test-secret".to_string()), None);
        assert!(validator.validate(&token).await.is_err());
    }
}
