//! Domain primitives: Ledger, Address, TimeMs.

use serde::{Deserialize, Serialize};

/// A supported ledger family.
///
/// The variant order is load-bearing: it is the fixed deterministic order
/// in which families contribute to the ticket pool and to entropy maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Ledger {
    #[serde(rename = "BTC")]
    Bitcoin,
    #[serde(rename = "ETH")]
    Ethereum,
    #[serde(rename = "POL")]
    Polygon,
    #[serde(rename = "SOL")]
    Solana,
}

impl Ledger {
    /// All supported families, in deterministic order.
    pub const ALL: [Ledger; 4] = [
        Ledger::Bitcoin,
        Ledger::Ethereum,
        Ledger::Polygon,
        Ledger::Solana,
    ];

    /// Native asset symbol, also used as the db/wire form.
    pub fn symbol(&self) -> &'static str {
        match self {
            Ledger::Bitcoin => "BTC",
            Ledger::Ethereum => "ETH",
            Ledger::Polygon => "POL",
            Ledger::Solana => "SOL",
        }
    }

    /// Parse the symbol form back into a Ledger.
    pub fn from_symbol(s: &str) -> Option<Ledger> {
        match s {
            "BTC" => Some(Ledger::Bitcoin),
            "ETH" => Some(Ledger::Ethereum),
            "POL" => Some(Ledger::Polygon),
            "SOL" => Some(Ledger::Solana),
            _ => None,
        }
    }
}

impl std::fmt::Display for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

/// A chain address (hex, base58, or bech32 string, depending on the ledger).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Create an Address from a string.
    pub fn new(addr: String) -> Self {
        Address(addr)
    }

    /// Get the address as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
