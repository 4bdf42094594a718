//! CoinGecko quote source using the public simple-price endpoint.

use super::{PriceError, QuoteSource};
use crate::domain::Decimal;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Symbol → CoinGecko asset id.
const ASSET_IDS: [(&str, &str); 4] = [
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("POL", "polygon-ecosystem-token"),
    ("SOL", "solana"),
];

#[derive(Debug, Clone)]
pub struct CoinGeckoSource {
    client: Client,
    base_url: String,
}

impl CoinGeckoSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn default_url() -> Self {
        Self::new("https://api.coingecko.com".to_string())
    }
}

#[async_trait]
impl QuoteSource for CoinGeckoSource {
    async fn fetch_quotes(&self, symbols: &[&str]) -> Result<HashMap<String, Decimal>, PriceError> {
        let ids: Vec<&str> = ASSET_IDS
            .iter()
            .filter(|(sym, _)| symbols.contains(sym))
            .map(|(_, id)| *id)
            .collect();
        let url = format!(
            "{}/api/v3/simple/price?ids={}&vs_currencies=usd",
            self.base_url,
            ids.join(",")
        );
        debug!(url = %url, "refreshing quotes");

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(15)),
            ..Default::default()
        };

        let body = retry(backoff, || async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(PriceError::Network(e.to_string())))?;

            let status = response.status();
            if status == 429 || status.is_server_error() {
                return Err(backoff::Error::transient(PriceError::Http {
                    status: status.as_u16(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(PriceError::Http {
                    status: status.as_u16(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(PriceError::Parse(e.to_string())))
        })
        .await?;

        let mut quotes = HashMap::new();
        for (symbol, id) in ASSET_IDS {
            let Some(usd) = body.pointer(&format!("/{}/usd", id)).and_then(|v| v.as_f64()) else {
                continue;
            };
            // f64 is what the API gives; round-trip through the string
            // form to land on an exact decimal.
            match Decimal::from_str_canonical(&usd.to_string()) {
                Ok(price) => {
                    quotes.insert(symbol.to_string(), price);
                }
                Err(e) => warn!(symbol, error = %e, "unparseable quote, skipping"),
            }
        }
        Ok(quotes)
    }
}
