//! Chain reader abstraction for observing deposits on external ledgers.
//!
//! One implementation per ledger family; the watcher is written once
//! against the trait. Readers do network I/O only — the only state they
//! carry between calls is the opaque cursor the caller hands back.

use crate::domain::{Address, Decimal, DepositEvent, Ledger};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod bitcoin;
pub mod evm;
pub mod mock;
pub(crate) mod rpc;
pub mod solana;

pub use bitcoin::BitcoinReader;
pub use evm::EvmReader;
pub use mock::MockChainReader;
pub use solana::SolanaReader;

/// Opaque per-ledger scan position.
///
/// Bitcoin: newest confirmed txid seen. EVM: last scanned block height.
/// Solana: newest signature seen. `None` means "never scanned".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor(pub Option<String>);

impl Cursor {
    pub fn start() -> Self {
        Cursor(None)
    }

    pub fn at(value: impl Into<String>) -> Self {
        Cursor(Some(value.into()))
    }

    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// Read access to one ledger family.
///
/// Implementations must retry transient failures internally (bounded
/// backoff) and surface only final failures; the caller keeps its cursor
/// unchanged on error so no events are skipped.
#[async_trait]
pub trait ChainReader: Send + Sync + fmt::Debug {
    /// The ledger family this reader observes.
    fn ledger(&self) -> Ledger;

    /// List transfers toward `address` newer than `cursor`, possibly
    /// including insufficiently-confirmed ones, plus the advanced cursor.
    ///
    /// The returned cursor never advances past events that are still
    /// below their final confirmation depth — those stay visible on the
    /// next call.
    async fn list_candidate_events(
        &self,
        address: &Address,
        cursor: &Cursor,
    ) -> Result<(Vec<DepositEvent>, Cursor), ChainError>;

    /// Current balance of `address` in native units.
    async fn current_balance(&self, address: &Address) -> Result<Decimal, ChainError>;

    /// Identifier of the latest finalized block/slot, used as the public
    /// entropy input at draw time.
    async fn finalized_fingerprint(&self) -> Result<String, ChainError>;
}

/// Error type for chain reader operations.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("network error: {0}")]
    Network(String),
    #[error("http error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("rate limited")]
    RateLimited,
}
