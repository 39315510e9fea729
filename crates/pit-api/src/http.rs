//! reqwest-backed [`Transport`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::session::Session;
use crate::transport::{Method, Transport};

/// Sends JSON requests to the platform API with the session's bearer token.
///
/// A 401 asks the session to refresh and retries the request exactly once.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    config: ApiConfig,
    session: Arc<Session>,
}

impl HttpTransport {
    pub fn new(config: ApiConfig, session: Arc<Session>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ApiError::Network)?;
        Ok(Self {
            http,
            config,
            session,
        })
    }

    /// Underlying client, shared with e.g. a [`crate::session::RefreshEndpoint`].
    pub fn client(&self) -> &Client {
        &self.http
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Result<(u16, Vec<u8>), ApiError> {
        let mut builder = match method {
            Method::Get => self.http.get(url),
            Method::Post => self.http.post(url),
            Method::Patch => self.http.patch(url),
            Method::Delete => self.http.delete(url),
        };
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?.to_vec();
        Ok((status, bytes))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let url = self.config.url(path);
        let token = self.session.access_token().await;

        debug!(%method, path, "request");
        let (mut status, mut bytes) = self
            .send_once(method, &url, token.as_deref(), body.as_ref())
            .await?;

        if status == 401 {
            if !self.session.refresh_after(token.as_deref()).await {
                return Err(ApiError::Unauthorized);
            }
            let retry_token = self.session.access_token().await;
            debug!(%method, path, "retrying after token refresh");
            (status, bytes) = self
                .send_once(method, &url, retry_token.as_deref(), body.as_ref())
                .await?;
        }

        if !(200..300).contains(&status) {
            let err = ApiError::from_response(status, &bytes);
            warn!(%method, path, status, error = %err, "request failed");
            return Err(err);
        }

        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}
