//! HTTP gateway invoker
//!
//! Speaks to a JSON gateway in front of the management service:
//! `POST {base}/invoke/{operation}` with `{"target": .., "arguments": ..}`.
//! The gateway answers `{"result": ..}` or `{"fault": {"name": .., "message": ..}}`.
//! Session cookies set by `Login` are kept by the client's cookie store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::InvokeError;
use crate::identity::ObjectIdentity;
use crate::traits::{Arguments, RemoteInvoker};

/// Request body sent to the gateway
#[derive(Debug, Serialize)]
struct InvokeRequest<'a> {
    target: &'a ObjectIdentity,
    arguments: Arguments,
}

/// Response envelope returned by the gateway
#[derive(Debug, Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    fault: Option<FaultBody>,
}

#[derive(Debug, Deserialize)]
struct FaultBody {
    name: String,
    #[serde(default)]
    message: String,
}

/// `RemoteInvoker` over HTTP
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpInvoker {
    /// Create a new invoker for the gateway at `base_url`
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, InvokeError> {
        let mut base_url = Url::parse(base_url.as_ref())
            .map_err(|e| InvokeError::ConfigError(format!("invalid URL: {e}")))?;
        // `join` replaces the last segment unless the path ends in a slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| InvokeError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Build the endpoint URL for an operation
    fn url(&self, operation: &str) -> Result<Url, InvokeError> {
        self.base_url
            .join(&format!("invoke/{operation}"))
            .map_err(|e| InvokeError::ConfigError(format!("invalid operation path: {e}")))
    }

    /// Map a reqwest failure onto the invoke taxonomy
    fn map_send_error(&self, e: &reqwest::Error) -> InvokeError {
        if e.is_timeout() {
            InvokeError::Timeout {
                timeout: self.timeout,
            }
        } else {
            InvokeError::ConnectionFailed(e.to_string())
        }
    }
}

#[async_trait]
impl RemoteInvoker for HttpInvoker {
    #[instrument(skip(self, arguments), fields(target = %target), level = "debug")]
    async fn invoke(
        &self,
        operation: &str,
        target: &ObjectIdentity,
        arguments: Arguments,
    ) -> Result<Value, InvokeError> {
        let url = self.url(operation)?;
        debug!(%url, "invoking remote operation");

        let response = self
            .client
            .post(url)
            .json(&InvokeRequest { target, arguments })
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!(status, operation, "gateway returned error status");
            return Err(InvokeError::Http { status, message });
        }

        let body: InvokeResponse = response
            .json()
            .await
            .map_err(|e| InvokeError::InvalidResponse(e.to_string()))?;

        match body.fault {
            Some(fault) => Err(InvokeError::Fault {
                name: fault.name,
                message: fault.message,
            }),
            None => Ok(body.result),
        }
    }

    fn invoker_type(&self) -> &'static str {
        "http"
    }
}
