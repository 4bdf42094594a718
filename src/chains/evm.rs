//! EVM reader: JSON-RPC block-range scanning for native transfers.
//!
//! One type serves both EVM families (Ethereum, Polygon); they differ
//! only in endpoint and confirmation policy.

use super::rpc::JsonRpcClient;
use super::{ChainError, ChainReader, Cursor};
use crate::domain::{Address, Decimal, DepositEvent, Ledger, TimeMs};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Upper bound on blocks fetched per tick, to respect RPC rate limits.
const MAX_BLOCKS_PER_TICK: u64 = 50;

#[derive(Debug, Clone)]
pub struct EvmReader {
    ledger: Ledger,
    rpc: JsonRpcClient,
    /// Blocks are only scanned once they are at least this deep, so the
    /// cursor never advances past an insufficiently-confirmed transfer.
    min_confirmations: u64,
}

impl EvmReader {
    pub fn new(ledger: Ledger, rpc_url: String, min_confirmations: u64) -> Self {
        Self {
            ledger,
            rpc: JsonRpcClient::new(rpc_url),
            min_confirmations: min_confirmations.max(1),
        }
    }

    async fn tip_height(&self) -> Result<u64, ChainError> {
        let result = self.rpc.call("eth_blockNumber", serde_json::json!([])).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| ChainError::Parse("eth_blockNumber not a string".to_string()))?;
        parse_hex_u64(hex)
    }
}

#[async_trait]
impl ChainReader for EvmReader {
    fn ledger(&self) -> Ledger {
        self.ledger
    }

    async fn list_candidate_events(
        &self,
        address: &Address,
        cursor: &Cursor,
    ) -> Result<(Vec<DepositEvent>, Cursor), ChainError> {
        let tip = self.tip_height().await?;
        let frontier = tip.saturating_sub(self.min_confirmations - 1);

        let from = match cursor.as_deref() {
            Some(h) => h
                .parse::<u64>()
                .map_err(|_| ChainError::Parse(format!("bad cursor: {}", h)))?
                + 1,
            // First sighting: start at the frontier, credit only new blocks.
            None => return Ok((Vec::new(), Cursor::at(frontier.to_string()))),
        };
        if from > frontier {
            return Ok((Vec::new(), cursor.clone()));
        }
        let to = frontier.min(from + MAX_BLOCKS_PER_TICK - 1);

        debug!(ledger = %self.ledger, from, to, tip, "scanning block range");

        let mut events = Vec::new();
        for height in from..=to {
            let block = self
                .rpc
                .call(
                    "eth_getBlockByNumber",
                    serde_json::json!([format!("{:#x}", height), true]),
                )
                .await?;
            let Some(txs) = block.get("transactions").and_then(|v| v.as_array()) else {
                warn!(ledger = %self.ledger, height, "block without transactions, skipping");
                continue;
            };
            for tx in txs {
                match parse_transfer(tx, self.ledger, address, tip, height) {
                    Ok(Some(event)) => events.push(event),
                    Ok(None) => {}
                    Err(e) => warn!(ledger = %self.ledger, height, error = %e, "bad tx, skipping"),
                }
            }
        }

        Ok((events, Cursor::at(to.to_string())))
    }

    async fn current_balance(&self, address: &Address) -> Result<Decimal, ChainError> {
        let result = self
            .rpc
            .call(
                "eth_getBalance",
                serde_json::json!([address.as_str(), "latest"]),
            )
            .await?;
        let hex = result
            .as_str()
            .ok_or_else(|| ChainError::Parse("eth_getBalance not a string".to_string()))?;
        Ok(Decimal::from_scaled_i128(parse_hex_u128(hex)? as i128, 18))
    }

    async fn finalized_fingerprint(&self) -> Result<String, ChainError> {
        let block = self
            .rpc
            .call(
                "eth_getBlockByNumber",
                serde_json::json!(["latest", false]),
            )
            .await?;
        block
            .get("hash")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| ChainError::Parse("block missing hash".to_string()))
    }
}

fn parse_transfer(
    tx: &serde_json::Value,
    ledger: Ledger,
    address: &Address,
    tip: u64,
    height: u64,
) -> Result<Option<DepositEvent>, ChainError> {
    let Some(to) = tx.get("to").and_then(|v| v.as_str()) else {
        // Contract creation has no `to`.
        return Ok(None);
    };
    if !to.eq_ignore_ascii_case(address.as_str()) {
        return Ok(None);
    }

    let value_hex = tx
        .get("value")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ChainError::Parse("tx missing value".to_string()))?;
    let wei = parse_hex_u128(value_hex)?;
    if wei == 0 {
        return Ok(None);
    }

    let hash = tx
        .get("hash")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ChainError::Parse("tx missing hash".to_string()))?;
    let from = tx.get("from").and_then(|v| v.as_str()).unwrap_or("unknown");

    Ok(Some(DepositEvent {
        ledger,
        event_id: hash.to_lowercase(),
        source_address: Address::new(from.to_lowercase()),
        native_amount: Decimal::from_scaled_i128(wei as i128, 18),
        observed_at: TimeMs::now(),
        confirmations: tip - height + 1,
    }))
}

fn parse_hex_u64(hex: &str) -> Result<u64, ChainError> {
    u64::from_str_radix(hex.trim_start_matches("0x"), 16)
        .map_err(|_| ChainError::Parse(format!("bad hex quantity: {}", hex)))
}

fn parse_hex_u128(hex: &str) -> Result<u128, ChainError> {
    u128::from_str_radix(hex.trim_start_matches("0x"), 16)
        .map_err(|_| ChainError::Parse(format!("bad hex quantity: {}", hex)))
}
