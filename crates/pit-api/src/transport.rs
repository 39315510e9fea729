//! The `Transport` trait: the single seam between the workflow engine and
//! the network.
//!
//! Every query function takes `&dyn Transport`, so the engine can run
//! against the real HTTP client or an in-memory backend in tests.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;

/// HTTP verb of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// Performs one authenticated JSON request.
///
/// `path` is relative to the API root and starts with `/`. An empty success
/// body is reported as `Value::Null`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ApiError>;
}

// Compile-time assertion: Transport must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Transport) {}
};

/// GET `path` and decode the response.
pub async fn get_json<T: DeserializeOwned>(
    transport: &dyn Transport,
    path: &str,
) -> Result<T, ApiError> {
    let value = transport.request(Method::Get, path, None).await?;
    Ok(serde_json::from_value(value)?)
}

/// Send `body` with `method` to `path` and decode the response.
pub async fn send_json<B, T>(
    transport: &dyn Transport,
    method: Method,
    path: &str,
    body: &B,
) -> Result<T, ApiError>
where
    B: Serialize + ?Sized + Sync,
    T: DeserializeOwned,
{
    let payload = serde_json::to_value(body)?;
    let value = transport.request(method, path, Some(payload)).await?;
    Ok(serde_json::from_value(value)?)
}

/// DELETE `path`, discarding any response body.
pub async fn delete(transport: &dyn Transport, path: &str) -> Result<(), ApiError> {
    transport.request(Method::Delete, path, None).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Echoes the request back so the helpers can be checked in isolation.
    struct EchoTransport {
        seen: Mutex<Vec<(Method, String)>>,
    }

    #[async_trait]
    impl Transport for EchoTransport {
        async fn request(
            &self,
            method: Method,
            path: &str,
            body: Option<Value>,
        ) -> Result<Value, ApiError> {
            self.seen.lock().unwrap().push((method, path.to_owned()));
            Ok(body.unwrap_or(Value::Null))
        }
    }

    #[tokio::test]
    async fn send_json_roundtrips_through_dyn_transport() {
        let echo = EchoTransport {
            seen: Mutex::new(Vec::new()),
        };
        let transport: &dyn Transport = &echo;
        let out: Value = send_json(transport, Method::Patch, "/x/1", &serde_json::json!({"a": 1}))
            .await
            .unwrap();
        assert_eq!(out["a"], 1);
        delete(transport, "/x/1").await.unwrap();

        let seen = echo.seen.lock().unwrap();
        assert_eq!(seen[0], (Method::Patch, "/x/1".to_owned()));
        assert_eq!(seen[1].0, Method::Delete);
    }

    #[tokio::test]
    async fn get_json_reports_decode_errors() {
        let echo = EchoTransport {
            seen: Mutex::new(Vec::new()),
        };
        let result: Result<Vec<i64>, _> = get_json(&echo, "/nothing").await;
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[test]
    fn method_display() {
        assert_eq!(Method::Patch.to_string(), "PATCH");
    }
}
