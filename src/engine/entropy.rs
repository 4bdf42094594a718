//! Public entropy collection from the watched ledgers.

use crate::chains::ChainReader;
use crate::domain::Ledger;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Collects one finalized-block fingerprint per ledger at draw time.
///
/// A ledger that fails or exceeds the per-ledger timeout contributes an
/// empty string instead of blocking the draw: a feed that controls its
/// own response timing can at worst narrow the entropy, never stall the
/// round, and the entry-id list dominates the seed width regardless.
#[derive(Debug, Clone)]
pub struct EntropySource {
    readers: Vec<Arc<dyn ChainReader>>,
    timeout: Duration,
}

impl EntropySource {
    pub fn new(readers: Vec<Arc<dyn ChainReader>>, timeout: Duration) -> Self {
        Self { readers, timeout }
    }

    /// One fingerprint per reader, in deterministic ledger order.
    pub async fn fingerprint(&self) -> BTreeMap<Ledger, String> {
        let fetches = self.readers.iter().map(|reader| {
            let reader = reader.clone();
            let timeout = self.timeout;
            async move {
                let ledger = reader.ledger();
                let fingerprint =
                    match tokio::time::timeout(timeout, reader.finalized_fingerprint()).await {
                        Ok(Ok(value)) => value,
                        Ok(Err(e)) => {
                            warn!(ledger = %ledger, error = %e, "fingerprint failed");
                            String::new()
                        }
                        Err(_) => {
                            warn!(ledger = %ledger, "fingerprint timed out");
                            String::new()
                        }
                    };
                (ledger, fingerprint)
            }
        });

        join_all(fetches).await.into_iter().collect()
    }
}
