//! Authentication context shared by every request of a process.
//!
//! The session owns the current access token. It is created once, handed to
//! the transport, and torn down explicitly on sign-out. Refreshing is
//! single-flight: concurrent 401s trigger one refresh, and late callers reuse
//! its result.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::ApiError;

/// Obtains a fresh access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> Result<String, ApiError>;
}

// Compile-time assertion: TokenRefresher must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn TokenRefresher) {}
};

/// Process-wide auth state.
pub struct Session {
    token: RwLock<Option<String>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    refresh_lock: Mutex<()>,
}

impl Session {
    /// A session with no token and no way to refresh one.
    pub fn anonymous() -> Self {
        Self {
            token: RwLock::new(None),
            refresher: None,
            refresh_lock: Mutex::new(()),
        }
    }

    /// A session seeded with `token`, optionally able to refresh it.
    pub fn new(token: Option<String>, refresher: Option<Arc<dyn TokenRefresher>>) -> Self {
        Self {
            token: RwLock::new(token),
            refresher,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Replace the access token, e.g. after sign-in.
    pub async fn init(&self, token: impl Into<String>) {
        *self.token.write().await = Some(token.into());
        debug!("session initialized");
    }

    pub async fn access_token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Refresh the access token after `stale` was rejected.
    ///
    /// Returns `true` when a usable token is available afterwards. If another
    /// caller already replaced `stale` while we waited, no second refresh is
    /// issued. A failed refresh clears the token.
    pub async fn refresh_after(&self, stale: Option<&str>) -> bool {
        let _guard = self.refresh_lock.lock().await;

        {
            let current = self.token.read().await;
            if current.is_some() && current.as_deref() != stale {
                debug!("token already refreshed by a concurrent request");
                return true;
            }
        }

        let Some(refresher) = &self.refresher else {
            *self.token.write().await = None;
            return false;
        };

        match refresher.refresh().await {
            Ok(token) => {
                *self.token.write().await = Some(token);
                info!("access token refreshed");
                true
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, clearing session");
                *self.token.write().await = None;
                false
            }
        }
    }

    /// Forget the access token (sign-out).
    pub async fn teardown(&self) {
        *self.token.write().await = None;
        debug!("session torn down");
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Refreshes by POSTing the refresh token to `/auth/token/refresh`.
pub struct RefreshEndpoint {
    http: reqwest::Client,
    url: String,
    refresh_token: String,
}

impl RefreshEndpoint {
    pub fn new(http: reqwest::Client, base_url: &str, refresh_token: impl Into<String>) -> Self {
        Self {
            http,
            url: format!("{}/auth/token/refresh", base_url.trim_end_matches('/')),
            refresh_token: refresh_token.into(),
        }
    }
}

#[async_trait]
impl TokenRefresher for RefreshEndpoint {
    async fn refresh(&self) -> Result<String, ApiError> {
        let response = self
            .http
            .post(&self.url)
            .json(&serde_json::json!({ "refresh": self.refresh_token }))
            .send()
            .await?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        if !(200..300).contains(&status) {
            return Err(ApiError::from_response(status, &bytes));
        }

        let body: RefreshResponse = serde_json::from_slice(&bytes)?;
        Ok(body.access)
    }
}
