//! Transport layer abstraction.
//!
//! Repositories talk to the admin API only through [`Transport`], so tests can
//! script responses with `mock::MockTransport` (behind the `mock` feature)
//! and production code uses [`HttpTransport`].

use crate::config::ClientConfig;
use crate::error::{DataError, DataResult};
use async_trait::async_trait;
use backoffice_types::ApiContext;
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// HTTP verbs used by the admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request against the admin API, relative to its base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path starting with `/`, e.g. `/search/product`.
    pub path: String,
    pub body: Option<Value>,
    pub context: ApiContext,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, context: &ApiContext) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            context: context.clone(),
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A response as received, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body. `Null` for empty bodies (e.g. 204).
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests to the admin API.
///
/// Implementations return `Ok` for every response the server produced,
/// including error statuses; `Err` is reserved for requests that never got a
/// response (`DataError::Network`).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> DataResult<ApiResponse>;
}

/// [`Transport`] over HTTP(S) using reqwest.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    default_token: Option<String>,
}

impl HttpTransport {
    /// Creates a transport for the configured API.
    pub fn new(config: &ClientConfig) -> DataResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DataError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_token: config.access_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> DataResult<ApiResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Patch => self.client.patch(&url),
            Method::Delete => self.client.delete(&url),
        };

        builder = builder.header("Accept", "application/json");
        for (name, value) in request.context.headers() {
            builder = builder.header(name, value);
        }
        if request.context.auth_token.is_none()
            && let Some(token) = &self.default_token
        {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!("{} {}", request.method, url);

        let response = builder
            .send()
            .await
            .map_err(|e| DataError::Network(format!("{} {} failed: {e}", request.method, request.path)))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| DataError::Network(format!("failed to read response body: {e}")))?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        debug!("{} {} -> {}", request.method, request.path, status);
        Ok(ApiResponse { status, body })
    }
}

/// A scripted transport for testing. Enabled by the `mock` feature.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Mutex, MutexGuard, PoisonError};

    #[derive(Clone)]
    enum Reply {
        Respond(ApiResponse),
        Fail(String),
    }

    #[derive(Default)]
    struct Script {
        pending: VecDeque<Reply>,
        last: Option<Reply>,
    }

    impl Script {
        fn next(&mut self) -> Option<Reply> {
            match self.pending.pop_front() {
                Some(reply) => {
                    self.last = Some(reply.clone());
                    Some(reply)
                }
                None => self.last.clone(),
            }
        }
    }

    /// Replies with scripted responses per `(method, path)` and records every
    /// request it receives.
    ///
    /// Scripted replies for a route are served in order; once they run out
    /// the last one served is repeated. Unscripted routes answer 404.
    #[derive(Default)]
    pub struct MockTransport {
        routes: Mutex<HashMap<(Method, String), Script>>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Scripts a response for `method path`.
        pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
            self.push(method, path, Reply::Respond(ApiResponse::new(status, body)))
        }

        /// Scripts a network failure for `method path`.
        pub fn fail(&self, method: Method, path: &str, message: &str) -> &Self {
            self.push(method, path, Reply::Fail(message.to_string()))
        }

        fn push(&self, method: Method, path: &str, reply: Reply) -> &Self {
            lock(&self.routes)
                .entry((method, path.to_string()))
                .or_default()
                .pending
                .push_back(reply);
            self
        }

        /// All requests received so far, in order.
        pub fn requests(&self) -> Vec<ApiRequest> {
            lock(&self.requests).clone()
        }

        /// Requests received for `method path`.
        pub fn requests_to(&self, method: Method, path: &str) -> Vec<ApiRequest> {
            lock(&self.requests)
                .iter()
                .filter(|r| r.method == method && r.path == path)
                .cloned()
                .collect()
        }

        pub fn request_count(&self) -> usize {
            lock(&self.requests).len()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: ApiRequest) -> DataResult<ApiResponse> {
            let key = (request.method, request.path.clone());
            lock(&self.requests).push(request);

            let reply = lock(&self.routes).get_mut(&key).and_then(Script::next);
            match reply {
                Some(Reply::Respond(response)) => Ok(response),
                Some(Reply::Fail(message)) => Err(DataError::Network(message)),
                None => Ok(ApiResponse::new(
                    404,
                    serde_json::json!({"errors": [{"status": "404", "detail": "No route found"}]}),
                )),
            }
        }
    }
}
