//! A credited contribution to the open round.

use crate::domain::{Address, Decimal, Ledger, TimeMs};
use serde::{Deserialize, Serialize};

/// A deposit that passed the accrual tolerance policy.
///
/// Owned exclusively by the round that accepted it; never mutated and
/// never moved between rounds. `tickets` is always >= 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub event_id: String,
    pub ledger: Ledger,
    pub source_address: Address,
    pub native_amount: Decimal,
    pub usd_amount: Decimal,
    pub tickets: u32,
    pub time_ms: TimeMs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_clone_and_eq() {
        let entry = Entry {
            event_id: "sig1".to_string(),
            ledger: Ledger::Solana,
            source_address: Address::new("payer".to_string()),
            native_amount: Decimal::from_str_canonical("0.5").unwrap(),
            usd_amount: Decimal::from_str_canonical("50").unwrap(),
            tickets: 1,
            time_ms: TimeMs::new(42),
        };
        assert_eq!(entry, entry.clone());
    }
}
