//! Bitcoin reader backed by an Esplora-style explorer HTTP API.

use super::{ChainError, ChainReader, Cursor};
use crate::domain::{Address, Decimal, DepositEvent, Ledger, TimeMs};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Bitcoin deposit reader.
///
/// The explorer's address listing mixes mempool and confirmed
/// transactions; it exposes only a confirmed flag, so confirmation depth
/// saturates at 1. A configured threshold above 1 cannot be honored for
/// this family.
#[derive(Debug, Clone)]
pub struct BitcoinReader {
    client: Client,
    base_url: String,
}

impl BitcoinReader {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ChainError> {
        let url = format!("{}{}", self.base_url, path);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(20)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(&url)
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
            Ok(response)
        })
        .await
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value, ChainError> {
        self.get(path)
            .await?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ChainError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ChainReader for BitcoinReader {
    fn ledger(&self) -> Ledger {
        Ledger::Bitcoin
    }

    async fn list_candidate_events(
        &self,
        address: &Address,
        cursor: &Cursor,
    ) -> Result<(Vec<DepositEvent>, Cursor), ChainError> {
        debug!(address = %address, cursor = ?cursor, "listing bitcoin address txs");

        let body = self
            .get_json(&format!("/address/{}/txs", address.as_str()))
            .await?;
        let txs = body
            .as_array()
            .ok_or_else(|| ChainError::Parse("expected tx array".to_string()))?;

        // Newest first: mempool entries, then confirmed history.
        let mut events = Vec::new();
        let mut newest_confirmed: Option<String> = None;
        for tx in txs {
            let Some(txid) = tx.get("txid").and_then(|v| v.as_str()) else {
                warn!("bitcoin tx missing txid, skipping");
                continue;
            };
            if cursor.as_deref() == Some(txid) {
                break;
            }
            let confirmed = tx
                .pointer("/status/confirmed")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if confirmed && newest_confirmed.is_none() {
                newest_confirmed = Some(txid.to_string());
            }

            match parse_deposit(tx, address, confirmed) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => warn!(txid, error = %e, "failed to parse bitcoin tx, skipping"),
            }
        }

        // Oldest first so acceptance order follows chain order.
        events.reverse();
        let next = match newest_confirmed {
            Some(txid) => Cursor::at(txid),
            None => cursor.clone(),
        };
        Ok((events, next))
    }

    async fn current_balance(&self, address: &Address) -> Result<Decimal, ChainError> {
        let body = self
            .get_json(&format!("/address/{}", address.as_str()))
            .await?;
        let funded = body
            .pointer("/chain_stats/funded_txo_sum")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ChainError::Parse("missing funded_txo_sum".to_string()))?;
        let spent = body
            .pointer("/chain_stats/spent_txo_sum")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ChainError::Parse("missing spent_txo_sum".to_string()))?;
        Ok(Decimal::from_scaled_i128((funded - spent) as i128, 8))
    }

    async fn finalized_fingerprint(&self) -> Result<String, ChainError> {
        let hash = self
            .get("/blocks/tip/hash")
            .await?
            .text()
            .await
            .map_err(|e| ChainError::Parse(e.to_string()))?;
        Ok(hash.trim().to_string())
    }
}

/// Sum the outputs paying the watched address; `Ok(None)` when the
/// transaction does not touch it.
fn parse_deposit(
    tx: &serde_json::Value,
    address: &Address,
    confirmed: bool,
) -> Result<Option<DepositEvent>, ChainError> {
    let txid = tx
        .get("txid")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ChainError::Parse("missing txid".to_string()))?;

    let vouts = tx
        .get("vout")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ChainError::Parse("missing vout".to_string()))?;

    let mut sats: i128 = 0;
    for vout in vouts {
        let to = vout.get("scriptpubkey_address").and_then(|v| v.as_str());
        if to == Some(address.as_str()) {
            sats += vout.get("value").and_then(|v| v.as_i64()).unwrap_or(0) as i128;
        }
    }
    if sats <= 0 {
        return Ok(None);
    }

    let source = tx
        .pointer("/vin/0/prevout/scriptpubkey_address")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");

    Ok(Some(DepositEvent {
        ledger: Ledger::Bitcoin,
        event_id: txid.to_string(),
        source_address: Address::new(source.to_string()),
        native_amount: Decimal::from_scaled_i128(sats, 8),
        observed_at: TimeMs::now(),
        confirmations: if confirmed { 1 } else { 0 },
    }))
}
