//! Deterministic draw: ticket pool, seed digest, index derivation.
//!
//! Given identical entropy and an identical ordered entry list, the
//! selection is bit-for-bit reproducible by any third party re-running
//! the same hash — the auditability property this system exists for.

use crate::domain::{Decimal, DrawRecord, Entry, Ledger, Round};
use crate::engine::{EntropySource, RoundLedger};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DrawError {
    /// Defensive: unreachable while draws are gated on the target check.
    #[error("ticket pool is empty")]
    EmptyPool,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Ordered ticket pool: families in fixed ledger order, entries in
/// acceptance order within each family, each repeated `tickets` times.
pub fn ticket_pool(rounds: &BTreeMap<Ledger, Round>) -> Vec<&Entry> {
    let mut pool = Vec::new();
    for round in rounds.values() {
        for entry in &round.entries {
            for _ in 0..entry.tickets {
                pool.push(entry);
            }
        }
    }
    pool
}

/// Ordered event ids across all families (one per entry, not per ticket).
pub fn ordered_event_ids(rounds: &BTreeMap<Ledger, Round>) -> Vec<String> {
    rounds
        .values()
        .flat_map(|round| round.entries.iter().map(|e| e.event_id.clone()))
        .collect()
}

/// Canonical seed material: JSON with sorted keys, entropy keyed by
/// ledger symbol, total as a fixed two-decimal string.
pub fn seed_material(
    entropy: &BTreeMap<Ledger, String>,
    event_ids: &[String],
    usd_total: Decimal,
) -> String {
    let entropy_by_symbol: BTreeMap<&str, &str> = entropy
        .iter()
        .map(|(ledger, fingerprint)| (ledger.symbol(), fingerprint.as_str()))
        .collect();
    serde_json::json!({
        "entropy": entropy_by_symbol,
        "eventIds": event_ids,
        "usdTotal": usd_total.to_usd_2dp_string(),
    })
    .to_string()
}

/// Hex-encoded SHA-256 of the seed material.
pub fn seed_digest(material: &str) -> String {
    hex::encode(Sha256::digest(material.as_bytes()))
}

/// First 16 hex chars of the digest as a big-endian u64, modulo the pool
/// size. `pool_size` must be nonzero.
pub fn index_from_digest(digest: &str, pool_size: u64) -> u64 {
    let word = digest
        .get(..16)
        .and_then(|prefix| u64::from_str_radix(prefix, 16).ok())
        .unwrap_or(0);
    word % pool_size
}

/// Runs a draw against the shared round ledger.
///
/// Entropy is gathered before the ledger's critical section is entered;
/// `settle` re-checks the target under the lock, so a draw raced by a
/// concurrent credit either includes that entry or leaves it for the
/// next round.
#[derive(Clone)]
pub struct DrawEngine {
    entropy: EntropySource,
    pot: Arc<RoundLedger>,
}

impl DrawEngine {
    pub fn new(entropy: EntropySource, pot: Arc<RoundLedger>) -> Self {
        Self { entropy, pot }
    }

    /// Collect entropy and settle the round. Returns the audit record,
    /// or None when the target was no longer reached under the lock.
    pub async fn run(&self) -> Result<Option<DrawRecord>, DrawError> {
        let entropy = self.entropy.fingerprint().await;
        let record = self.pot.settle(entropy).await?;
        if let Some(record) = &record {
            info!(
                round_id = record.round_id,
                seed_digest = %record.seed_digest,
                selected_index = record.selected_index,
                pool = record.ticket_pool_size,
                winner = %record.winner.source_address,
                "draw completed"
            );
        }
        Ok(record)
    }
}
