//! Solana reader: signature-history scanning with per-transaction
//! balance-delta parsing.
//!
//! The listing is queried at finalized commitment, so every returned
//! signature is already final; depth is still reported as
//! `tip_slot - slot + 1` so the watcher applies one gate across families.

use super::rpc::JsonRpcClient;
use super::{ChainError, ChainReader, Cursor};
use crate::domain::{Address, Decimal, DepositEvent, Ledger, TimeMs};
use async_trait::async_trait;
use tracing::{debug, warn};

const SIGNATURE_PAGE_LIMIT: u64 = 100;

#[derive(Debug, Clone)]
pub struct SolanaReader {
    rpc: JsonRpcClient,
}

impl SolanaReader {
    pub fn new(rpc_url: String) -> Self {
        Self {
            rpc: JsonRpcClient::new(rpc_url),
        }
    }

    async fn finalized_slot(&self) -> Result<u64, ChainError> {
        let result = self
            .rpc
            .call("getSlot", serde_json::json!([{ "commitment": "finalized" }]))
            .await?;
        result
            .as_u64()
            .ok_or_else(|| ChainError::Parse("getSlot not a number".to_string()))
    }
}

#[async_trait]
impl ChainReader for SolanaReader {
    fn ledger(&self) -> Ledger {
        Ledger::Solana
    }

    async fn list_candidate_events(
        &self,
        address: &Address,
        cursor: &Cursor,
    ) -> Result<(Vec<DepositEvent>, Cursor), ChainError> {
        let tip_slot = self.finalized_slot().await?;

        let mut opts = serde_json::json!({
            "limit": SIGNATURE_PAGE_LIMIT,
            "commitment": "finalized",
        });
        if let Some(until) = cursor.as_deref() {
            opts["until"] = serde_json::Value::String(until.to_string());
        }
        let result = self
            .rpc
            .call(
                "getSignaturesForAddress",
                serde_json::json!([address.as_str(), opts]),
            )
            .await?;
        let sigs = result
            .as_array()
            .ok_or_else(|| ChainError::Parse("expected signature array".to_string()))?;

        debug!(address = %address, count = sigs.len(), "solana signatures fetched");

        let newest = sigs
            .first()
            .and_then(|s| s.get("signature"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let mut events = Vec::new();
        for sig_info in sigs {
            if !sig_info.get("err").map(|e| e.is_null()).unwrap_or(false) {
                continue;
            }
            let Some(signature) = sig_info.get("signature").and_then(|v| v.as_str()) else {
                warn!("signature entry missing signature field, skipping");
                continue;
            };

            let tx = self
                .rpc
                .call(
                    "getTransaction",
                    serde_json::json!([signature, {
                        "encoding": "jsonParsed",
                        "commitment": "finalized",
                        "maxSupportedTransactionVersion": 0,
                    }]),
                )
                .await?;
            match parse_deposit(&tx, signature, address, tip_slot) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => warn!(signature, error = %e, "failed to parse solana tx, skipping"),
            }
        }

        // Oldest first so acceptance order follows chain order.
        events.reverse();
        let next = match newest {
            Some(sig) => Cursor::at(sig),
            None => cursor.clone(),
        };
        Ok((events, next))
    }

    async fn current_balance(&self, address: &Address) -> Result<Decimal, ChainError> {
        let result = self
            .rpc
            .call(
                "getBalance",
                serde_json::json!([address.as_str(), { "commitment": "finalized" }]),
            )
            .await?;
        let lamports = result
            .pointer("/value")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ChainError::Parse("getBalance missing value".to_string()))?;
        Ok(Decimal::from_scaled_i128(lamports as i128, 9))
    }

    async fn finalized_fingerprint(&self) -> Result<String, ChainError> {
        let result = self
            .rpc
            .call(
                "getLatestBlockhash",
                serde_json::json!([{ "commitment": "finalized" }]),
            )
            .await?;
        result
            .pointer("/value/blockhash")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| ChainError::Parse("missing blockhash".to_string()))
    }
}

/// Credit the watched account's positive lamport delta; `Ok(None)` when
/// the balance did not increase.
fn parse_deposit(
    tx: &serde_json::Value,
    signature: &str,
    address: &Address,
    tip_slot: u64,
) -> Result<Option<DepositEvent>, ChainError> {
    if !tx
        .pointer("/meta/err")
        .map(|e| e.is_null())
        .unwrap_or(false)
    {
        return Ok(None);
    }

    let slot = tx
        .get("slot")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| ChainError::Parse("missing slot".to_string()))?;
    let keys = tx
        .pointer("/transaction/message/accountKeys")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ChainError::Parse("missing accountKeys".to_string()))?;

    // jsonParsed encodes keys as objects; plain json as strings.
    let key_at = |i: usize| -> Option<&str> {
        keys.get(i).and_then(|k| {
            k.as_str()
                .or_else(|| k.get("pubkey").and_then(|p| p.as_str()))
        })
    };

    let Some(index) = (0..keys.len()).find(|&i| key_at(i) == Some(address.as_str())) else {
        return Ok(None);
    };

    let pre = tx
        .pointer(&format!("/meta/preBalances/{}", index))
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ChainError::Parse("missing preBalances".to_string()))?;
    let post = tx
        .pointer(&format!("/meta/postBalances/{}", index))
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ChainError::Parse("missing postBalances".to_string()))?;

    let delta = post - pre;
    if delta <= 0 {
        return Ok(None);
    }

    Ok(Some(DepositEvent {
        ledger: Ledger::Solana,
        event_id: signature.to_string(),
        source_address: Address::new(key_at(0).unwrap_or("unknown").to_string()),
        native_amount: Decimal::from_scaled_i128(delta as i128, 9),
        observed_at: TimeMs::now(),
        confirmations: tip_slot.saturating_sub(slot) + 1,
    }))
}
