//! Request-response transport shared by the HTTP adapters.
//!
//! # Responsibilities
//! - POST a JSON body under an explicit deadline
//! - Map non-success statuses and connection failures to typed errors
//! - Probe a health path with a short timeout

use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::backends::{BackendError, BackendId, BackendResult};
use crate::resilience::timeouts::with_deadline;

/// HTTP client bound to one backend endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    backend: BackendId,
    client: reqwest::Client,
    endpoint: Url,
    health_url: Url,
    request_timeout: Duration,
    headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(
        backend: BackendId,
        endpoint: &str,
        health_path: &str,
        request_timeout: Duration,
        headers: HeaderMap,
    ) -> BackendResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| BackendError::transport(backend, format!("invalid endpoint '{}': {}", endpoint, e)))?;
        let health_url = endpoint
            .join(health_path)
            .map_err(|e| BackendError::transport(backend, format!("invalid health path '{}': {}", health_path, e)))?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("assistant-orchestrator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BackendError::transport(backend, e.to_string()))?;

        Ok(Self {
            backend,
            client,
            endpoint,
            health_url,
            request_timeout,
            headers,
        })
    }

    /// POST `body` and decode a JSON reply, all under the request deadline.
    pub async fn post_json<B, T>(&self, body: &B) -> BackendResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let backend = self.backend;
        with_deadline(backend, self.request_timeout, async {
            let response = self
                .client
                .post(self.endpoint.clone())
                .headers(self.headers.clone())
                .json(body)
                .send()
                .await
                .map_err(|e| self.map_error(e))?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                let detail: String = detail.chars().take(200).collect();
                return Err(BackendError::transport(backend, format!("HTTP {}: {}", status, detail)));
            }

            response
                .json::<T>()
                .await
                .map_err(|e| BackendError::invalid(backend, e.to_string()))
        })
        .await
    }

    /// GET the health path. Returns the outcome and round-trip time.
    pub async fn check_health(&self, timeout: Duration) -> (bool, Duration) {
        let started = Instant::now();
        let request = self
            .client
            .get(self.health_url.clone())
            .headers(self.headers.clone())
            .timeout(timeout)
            .send();

        let healthy = match tokio::time::timeout(timeout, request).await {
            Ok(Ok(response)) => {
                let ok = response.status().is_success();
                if !ok {
                    tracing::debug!(backend = %self.backend, status = %response.status(), "Health probe non-success status");
                }
                ok
            }
            Ok(Err(e)) => {
                tracing::debug!(backend = %self.backend, error = %e, "Health probe connection error");
                false
            }
            Err(_) => {
                tracing::debug!(backend = %self.backend, "Health probe timeout");
                false
            }
        };
        (healthy, started.elapsed())
    }

    fn map_error(&self, error: reqwest::Error) -> BackendError {
        if error.is_timeout() {
            BackendError::Timeout {
                backend: self.backend,
                timeout_ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            BackendError::transport(self.backend, error.to_string())
        }
    }
}
