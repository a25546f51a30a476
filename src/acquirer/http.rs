//! HTTP transport shared by the provider adapters.

use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::{header::CONTENT_TYPE, Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::Instrument;

use crate::acquirer::error::AcquirerError;
use crate::utils::sanitize::sanitize_json;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub type CircuitBreaker =
    StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

pub fn new_circuit_breaker(failure_threshold: u32, reset_timeout: Duration) -> CircuitBreaker {
    let backoff = backoff::equal_jittered(reset_timeout, reset_timeout * 2);
    let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
    Config::new().failure_policy(policy).build()
}

/// `"closed"` while calls are permitted, `"open"` otherwise.
pub fn circuit_state(breaker: &CircuitBreaker) -> &'static str {
    if breaker.is_call_permitted() {
        "closed"
    } else {
        "open"
    }
}

/// Joins a provider base address and an endpoint path with exactly one slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// JSON-over-HTTP client bound to one provider base address. Every call runs
/// inside the adapter's tracing span and through the gateway's circuit breaker.
#[derive(Clone)]
pub struct ProviderClient {
    client: Client,
    base_url: String,
    circuit_breaker: CircuitBreaker,
    span: tracing::Span,
}

/// Extra headers and authentication for one request.
#[derive(Debug, Default)]
pub struct RequestOptions<'a> {
    pub headers: Vec<(&'static str, String)>,
    pub bearer: Option<&'a str>,
}

impl<'a> RequestOptions<'a> {
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn bearer(mut self, token: &'a str) -> Self {
        self.bearer = Some(token);
        self
    }
}

impl ProviderClient {
    pub fn new(
        base_url: String,
        timeout: Duration,
        circuit_breaker: CircuitBreaker,
        span: tracing::Span,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(ProviderClient {
            client,
            base_url,
            circuit_breaker,
            span,
        })
    }

    pub async fn post_json<Req, Resp>(
        &self,
        path: &str,
        body: &Req,
        options: RequestOptions<'_>,
    ) -> Result<Resp, AcquirerError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        self.send_json(Method::POST, path, Some(body), options).await
    }

    /// Sends `body` as JSON and decodes the JSON reply. A reply that does not
    /// decode is an error regardless of the HTTP status.
    pub async fn send_json<Req, Resp>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Req>,
        options: RequestOptions<'_>,
    ) -> Result<Resp, AcquirerError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = join_url(&self.base_url, path);
        let payload = match body {
            Some(body) => Some(serde_json::to_value(body).map_err(|e| {
                AcquirerError::Validation(format!("request could not be encoded: {}", e))
            })?),
            None => None,
        };

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in &options.headers {
            request = request.header(*name, value);
        }
        if let Some(token) = options.bearer {
            request = request.bearer_auth(token);
        }
        if let Some(payload) = &payload {
            tracing::debug!(
                method = %method,
                url = %url,
                body = %sanitize_json(payload),
                "Provider request"
            );
            request = request.json(payload);
        }

        let result = self
            .circuit_breaker
            .call(async move {
                let response = request.send().await?;
                let status = response.status();
                let bytes = response.bytes().await?;
                Ok::<_, AcquirerError>((status, bytes))
            })
            .instrument(self.span.clone())
            .await;

        let (status, bytes) = match result {
            Ok(reply) => reply,
            Err(FailsafeError::Rejected) => {
                tracing::warn!(parent: &self.span, url = %url, "provider circuit breaker is open");
                return Err(AcquirerError::CircuitOpen(self.base_url.clone()));
            }
            Err(FailsafeError::Inner(e)) => {
                tracing::warn!(parent: &self.span, url = %url, error = %e, "provider call failed");
                return Err(e);
            }
        };

        let _entered = self.span.enter();
        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(value) => {
                tracing::debug!(
                    status = status.as_u16(),
                    body = %sanitize_json(&value),
                    "Provider response"
                );
                serde_json::from_value(value).map_err(|e| AcquirerError::Decode {
                    status: status.as_u16(),
                    message: e.to_string(),
                })
            }
            Err(e) => {
                tracing::warn!(
                    status = status.as_u16(),
                    body_size = bytes.len(),
                    "Provider response is not JSON"
                );
                Err(AcquirerError::Decode {
                    status: status.as_u16(),
                    message: e.to_string(),
                })
            }
        }
    }
}
