//! Upstream forwarding seam and the HTTP forwarder.
//!
//! Transport failure is converted into a synthetic 500 response rather
//! than an error: the gateway reports upstream trouble, it does not retry
//! or raise.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use praetor_core::types::{Principal, RequestDescriptor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Value,
}

#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        request: &RequestDescriptor,
        payload: &Value,
        principal: &Principal,
    ) -> UpstreamResponse;
}

/// Forwards requests to the protected backend over HTTP, mirroring method
/// and path onto a configured base URL.
pub struct HttpForwarder {
    client: reqwest::Client,
    base_url: String,
}

impl HttpForwarder {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(
        &self,
        request: &RequestDescriptor,
        payload: &Value,
        principal: &Principal,
    ) -> UpstreamResponse {
        let url = format!("{}{}", self.base_url, request.forward_uri());
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .unwrap_or(reqwest::Method::GET);

        let mut builder = self
            .client
            .request(method, &url)
            .header("x-forwarded-user", &principal.id);
        if !payload.is_null() {
            builder = builder.json(payload);
        }

        match builder.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let text = response.text().await.unwrap_or_default();
                let body = serde_json::from_str(&text)
                    .unwrap_or_else(|_| Value::String(text));
                UpstreamResponse { status, body }
            }
            Err(err) => {
                warn!(url = %url, %err, "upstream request failed");
                UpstreamResponse {
                    status: err.status().map(|s| s.as_u16()).unwrap_or(500),
                    body: json!({ "error": err.to_string() }),
                }
            }
        }
    }
}
