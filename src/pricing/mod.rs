//! USD conversion: quote source abstraction and the shared price cache.

use crate::domain::{Decimal, Ledger};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

pub mod coingecko;

pub use coingecko::CoinGeckoSource;

/// Error type for quote retrieval.
#[derive(Debug, Clone, Error)]
pub enum PriceError {
    #[error("network error: {0}")]
    Network(String),
    #[error("http error {status}")]
    Http { status: u16 },
    #[error("parse error: {0}")]
    Parse(String),
}

/// One-shot retrieval of USD quotes for a basket of symbols.
#[async_trait]
pub trait QuoteSource: Send + Sync + fmt::Debug {
    async fn fetch_quotes(&self, symbols: &[&str]) -> Result<HashMap<String, Decimal>, PriceError>;
}

/// Fixed quotes for tests.
#[derive(Debug, Clone, Default)]
pub struct FixedQuoteSource {
    quotes: HashMap<String, Decimal>,
}

impl FixedQuoteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(mut self, symbol: &str, usd: Decimal) -> Self {
        self.quotes.insert(symbol.to_string(), usd);
        self
    }
}

#[async_trait]
impl QuoteSource for FixedQuoteSource {
    async fn fetch_quotes(&self, _symbols: &[&str]) -> Result<HashMap<String, Decimal>, PriceError> {
        Ok(self.quotes.clone())
    }
}

/// Time-bounded cache over one global basket of the four native symbols.
///
/// On expiry the refresh is synchronous; on refresh failure the last
/// known quotes are served. A symbol with no quote yet converts to zero —
/// callers treat a zero USD value as "defer, retry next tick", never as a
/// free entry.
#[derive(Debug)]
pub struct PriceCache {
    source: std::sync::Arc<dyn QuoteSource>,
    ttl: Duration,
    state: tokio::sync::Mutex<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    quotes: HashMap<String, Decimal>,
    fetched_at: Option<Instant>,
}

impl PriceCache {
    pub fn new(source: std::sync::Arc<dyn QuoteSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            state: tokio::sync::Mutex::new(CacheState::default()),
        }
    }

    /// USD per native unit; zero when no quote is available.
    pub async fn price(&self, symbol: &str) -> Decimal {
        let mut state = self.state.lock().await;
        let stale = match state.fetched_at {
            Some(at) => at.elapsed() >= self.ttl,
            None => true,
        };
        if stale {
            let basket: Vec<&str> = Ledger::ALL.iter().map(|l| l.symbol()).collect();
            match self.source.fetch_quotes(&basket).await {
                Ok(quotes) => {
                    state.quotes = quotes;
                    state.fetched_at = Some(Instant::now());
                }
                Err(e) => {
                    warn!(error = %e, "price refresh failed, serving last known quotes");
                }
            }
        }
        state.quotes.get(symbol).copied().unwrap_or_else(Decimal::zero)
    }

    /// Convert a native amount to USD at the cached price.
    pub async fn to_usd(&self, ledger: Ledger, native_amount: Decimal) -> Decimal {
        native_amount * self.price(ledger.symbol()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct CountingSource {
        calls: AtomicU64,
        fail: bool,
    }

    #[async_trait]
    impl QuoteSource for CountingSource {
        async fn fetch_quotes(
            &self,
            _symbols: &[&str],
        ) -> Result<HashMap<String, Decimal>, PriceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PriceError::Network("down".to_string()));
            }
            let mut quotes = HashMap::new();
            quotes.insert("BTC".to_string(), Decimal::from_str_canonical("50000").unwrap());
            Ok(quotes)
        }
    }

    #[tokio::test]
    async fn test_cache_refreshes_once_within_ttl() {
        let source = Arc::new(CountingSource {
            calls: AtomicU64::new(0),
            fail: false,
        });
        let cache = PriceCache::new(source.clone(), Duration::from_secs(60));

        let p1 = cache.price("BTC").await;
        let p2 = cache.price("BTC").await;
        assert_eq!(p1.to_canonical_string(), "50000");
        assert_eq!(p1, p2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cold_cache_with_failing_source_yields_zero() {
        let source = Arc::new(CountingSource {
            calls: AtomicU64::new(0),
            fail: true,
        });
        let cache = PriceCache::new(source, Duration::from_secs(60));
        assert!(cache.price("BTC").await.is_zero());
    }

    #[tokio::test]
    async fn test_unknown_symbol_converts_to_zero() {
        let source = Arc::new(
            FixedQuoteSource::new()
                .with_quote("SOL", Decimal::from_str_canonical("100").unwrap()),
        );
        let cache = PriceCache::new(source, Duration::from_secs(60));

        let usd = cache
            .to_usd(Ledger::Solana, Decimal::from_str_canonical("0.5").unwrap())
            .await;
        assert_eq!(usd.to_canonical_string(), "50");
        assert!(cache
            .to_usd(Ledger::Bitcoin, Decimal::one())
            .await
            .is_zero());
    }
}
