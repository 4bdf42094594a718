//! Minimal JSON-RPC 2.0 client shared by the account-model readers.

use super::ChainError;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;

/// JSON-RPC transport with bounded exponential retry on transient
/// failures (network errors, 429, 5xx).
#[derive(Debug, Clone)]
pub(crate) struct JsonRpcClient {
    client: Client,
    url: String,
}

impl JsonRpcClient {
    pub(crate) fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }

    pub(crate) async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ChainError> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(20)),
            ..Default::default()
        };

        let body = retry(backoff, || async {
            let response = self
                .client
                .post(&self.url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(ChainError::Network(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(ChainError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(ChainError::Http {
                    status: status.as_u16(),
                    message: "server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(ChainError::Http {
                    status: status.as_u16(),
                    message: "client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(ChainError::Parse(e.to_string())))
        })
        .await?;

        if let Some(err) = body.get("error") {
            return Err(ChainError::Http {
                status: 200,
                message: format!("rpc error: {}", err),
            });
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| ChainError::Parse("missing result field".to_string()))
    }
}
