//! Round state and the draw audit record.

use crate::domain::{Decimal, Entry, Ledger, TimeMs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One ledger family's accounting epoch between two draws.
///
/// Entries are kept in acceptance order. The aggregate USD total across
/// all families lives in the round ledger, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub round_id: i64,
    pub started_at: TimeMs,
    pub entries: Vec<Entry>,
}

impl Round {
    pub fn new(round_id: i64, started_at: TimeMs) -> Self {
        Round {
            round_id,
            started_at,
            entries: Vec::new(),
        }
    }

    /// Sum of this family's entry USD amounts.
    pub fn usd_subtotal(&self) -> Decimal {
        self.entries
            .iter()
            .fold(Decimal::zero(), |acc, e| acc + e.usd_amount)
    }
}

/// Immutable audit artifact of one completed draw.
///
/// Every field is published verbatim so any third party can re-run the
/// digest over the same entropy and entry list and reproduce the winner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRecord {
    pub round_id: i64,
    /// One fingerprint per participating ledger; empty string when that
    /// ledger's feed timed out at draw time.
    pub entropy: BTreeMap<Ledger, String>,
    pub ticket_pool_size: u64,
    /// Hex-encoded SHA-256 over the canonical seed material.
    pub seed_digest: String,
    pub selected_index: u64,
    pub winner: Entry,
    pub usd_total: Decimal,
    pub payout_usd: Decimal,
    pub drawn_at: TimeMs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Address;

    fn entry(usd: &str) -> Entry {
        Entry {
            event_id: "tx".to_string(),
            ledger: Ledger::Bitcoin,
            source_address: Address::new("bc1q".to_string()),
            native_amount: Decimal::from_str_canonical("0.001").unwrap(),
            usd_amount: Decimal::from_str_canonical(usd).unwrap(),
            tickets: 1,
            time_ms: TimeMs::new(0),
        }
    }

    #[test]
    fn test_round_usd_subtotal() {
        let mut round = Round::new(1, TimeMs::new(0));
        assert!(round.usd_subtotal().is_zero());
        round.entries.push(entry("47"));
        round.entries.push(entry("53"));
        assert_eq!(round.usd_subtotal().to_canonical_string(), "100");
    }
}
