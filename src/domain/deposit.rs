//! An observed value transfer on one of the watched ledgers.

use crate::domain::{Address, Decimal, Ledger, TimeMs};
use serde::{Deserialize, Serialize};

/// A single observed transfer toward a watched address.
///
/// Created by a watcher on first sighting and immutable afterwards; it is
/// either absorbed into an [`Entry`](crate::domain::Entry) or discarded.
/// `event_id` is the chain-native transaction id / signature, globally
/// unique within its ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositEvent {
    pub ledger: Ledger,
    pub event_id: String,
    pub source_address: Address,
    pub native_amount: Decimal,
    pub observed_at: TimeMs,
    /// Confirmation depth at observation time. The Bitcoin explorer API
    /// only distinguishes mempool (0) from confirmed (1); account-model
    /// readers report `tip - included + 1`.
    pub confirmations: u64,
}

impl DepositEvent {
    pub fn is_confirmed(&self, threshold: u64) -> bool {
        self.confirmations >= threshold
    }
}
