use crate::config::UserServiceConfig;
use crate::error::{RelayError, RelayResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// What the customer-record service knows about a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserLookupResult {
    pub found: bool,
    pub display_name: Option<String>,
    pub registered_at: Option<String>,
}

impl UserLookupResult {
    pub fn not_found() -> Self {
        Self::default()
    }
}

/// Best-effort caller enrichment. Never fails: every fault maps to
/// [`UserLookupResult::not_found`].
#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn lookup(&self, phone: Option<&str>) -> UserLookupResult;
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    exists: bool,
    name: Option<String>,
    created_at: Option<String>,
}

/// Looks callers up via `GET {base_url}/api/user?phone=...`
pub struct HttpUserLookup {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpUserLookup {
    pub fn new(config: UserServiceConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    async fn fetch(&self, phone: &str) -> RelayResult<UserResponse> {
        let response = self
            .client
            .get(format!("{}/api/user", self.base_url))
            .query(&[("phone", phone)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RelayError::LookupUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::LookupUnavailable(format!("status {}", status)));
        }

        response
            .json::<UserResponse>()
            .await
            .map_err(|e| RelayError::LookupUnavailable(format!("decode error: {}", e)))
    }
}

#[async_trait]
impl UserLookup for HttpUserLookup {
    async fn lookup(&self, phone: Option<&str>) -> UserLookupResult {
        let Some(phone) = phone.map(str::trim).filter(|p| !p.is_empty()) else {
            return UserLookupResult::not_found();
        };

        match self.fetch(phone).await {
            Ok(user) if user.exists => UserLookupResult {
                found: true,
                display_name: user.name,
                registered_at: user.created_at,
            },
            Ok(_) => {
                tracing::debug!("[UserLookup] No customer registered with phone {}", phone);
                UserLookupResult::not_found()
            }
            Err(e) => {
                tracing::warn!("[UserLookup] {}", e);
                UserLookupResult::not_found()
            }
        }
    }
}
