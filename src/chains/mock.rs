//! Mock chain reader for testing without network calls.

use super::{ChainError, ChainReader, Cursor};
use crate::domain::{Address, Decimal, DepositEvent, Ledger};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted reader: returns its configured events on every listing (as a
/// real chain keeps re-reporting history), so it also exercises the
/// dedup path.
#[derive(Debug)]
pub struct MockChainReader {
    ledger: Ledger,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    events: Vec<DepositEvent>,
    balance: Decimal,
    fingerprint: String,
    fingerprint_hangs: bool,
    fail_next_list: bool,
    list_calls: u64,
}

impl MockChainReader {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            inner: Mutex::new(Inner {
                events: Vec::new(),
                balance: Decimal::zero(),
                fingerprint: format!("{}-fingerprint", ledger.symbol().to_lowercase()),
                fingerprint_hangs: false,
                fail_next_list: false,
                list_calls: 0,
            }),
        }
    }

    pub fn with_event(self, event: DepositEvent) -> Self {
        self.inner.lock().unwrap().events.push(event);
        self
    }

    pub fn with_events(self, events: Vec<DepositEvent>) -> Self {
        self.inner.lock().unwrap().events.extend(events);
        self
    }

    pub fn with_balance(self, balance: Decimal) -> Self {
        self.inner.lock().unwrap().balance = balance;
        self
    }

    pub fn with_fingerprint(self, fingerprint: impl Into<String>) -> Self {
        self.inner.lock().unwrap().fingerprint = fingerprint.into();
        self
    }

    /// Make `finalized_fingerprint` hang past any reasonable timeout.
    pub fn with_hanging_fingerprint(self) -> Self {
        self.inner.lock().unwrap().fingerprint_hangs = true;
        self
    }

    /// Add an event after construction (shared behind Arc).
    pub fn push_event(&self, event: DepositEvent) {
        self.inner.lock().unwrap().events.push(event);
    }

    /// Drop all scripted events.
    pub fn clear_events(&self) {
        self.inner.lock().unwrap().events.clear();
    }

    /// Fail the next listing with a network error, then recover.
    pub fn fail_next_list(&self) {
        self.inner.lock().unwrap().fail_next_list = true;
    }

    pub fn list_calls(&self) -> u64 {
        self.inner.lock().unwrap().list_calls
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    fn ledger(&self) -> Ledger {
        self.ledger
    }

    async fn list_candidate_events(
        &self,
        _address: &Address,
        _cursor: &Cursor,
    ) -> Result<(Vec<DepositEvent>, Cursor), ChainError> {
        let mut inner = self.inner.lock().unwrap();
        inner.list_calls += 1;
        if inner.fail_next_list {
            inner.fail_next_list = false;
            return Err(ChainError::Network("mock outage".to_string()));
        }
        let cursor = Cursor::at(format!("mock-{}", inner.list_calls));
        Ok((inner.events.clone(), cursor))
    }

    async fn current_balance(&self, _address: &Address) -> Result<Decimal, ChainError> {
        Ok(self.inner.lock().unwrap().balance)
    }

    async fn finalized_fingerprint(&self) -> Result<String, ChainError> {
        let (hangs, fingerprint) = {
            let inner = self.inner.lock().unwrap();
            (inner.fingerprint_hangs, inner.fingerprint.clone())
        };
        if hangs {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(fingerprint)
    }
}
