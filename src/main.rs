use anyhow::Context;
use chainpot::chains::{BitcoinReader, ChainReader, EvmReader, SolanaReader};
use chainpot::engine::{DrawEngine, EntropySource, PotConfig, RoundLedger};
use chainpot::notify::{ChannelNotifier, Notifier};
use chainpot::pricing::{CoinGeckoSource, PriceCache};
use chainpot::watcher::Watcher;
use chainpot::{api, config::Config, db::init_db, Address, Ledger, Repository};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Per-ledger timeout for entropy fingerprint collection at draw time.
const ENTROPY_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("configuration error")?;

    let pool = init_db(&config.database_path)
        .await
        .context("failed to initialize database")?;
    let repo = Arc::new(Repository::new(pool));

    // Outbound notifications go to the external chat front end; here the
    // rendered text is drained to the log.
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let notifier: Arc<dyn Notifier> = Arc::new(ChannelNotifier::new(tx));
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            tracing::info!(target: "chainpot::frontend", "{}", message);
        }
    });

    let pot = Arc::new(
        RoundLedger::restore(
            repo.clone(),
            notifier.clone(),
            PotConfig {
                entry_price_usd: config.entry_price_usd,
                entry_tolerance: config.entry_tolerance,
                round_target_usd: config.round_target_usd,
                payout_pct: config.payout_pct,
            },
        )
        .await
        .context("failed to restore round state")?,
    );

    let prices = Arc::new(PriceCache::new(
        Arc::new(CoinGeckoSource::new(config.price_api_url.clone())),
        Duration::from_secs(config.price_ttl_secs),
    ));

    let mut readers: Vec<Arc<dyn ChainReader>> = Vec::new();
    for (&ledger, chain) in &config.chains {
        let reader: Arc<dyn ChainReader> = match ledger {
            Ledger::Bitcoin => Arc::new(BitcoinReader::new(chain.endpoint_url.clone())),
            Ledger::Ethereum | Ledger::Polygon => Arc::new(EvmReader::new(
                ledger,
                chain.endpoint_url.clone(),
                chain.confirmations,
            )),
            Ledger::Solana => Arc::new(SolanaReader::new(chain.endpoint_url.clone())),
        };
        readers.push(reader);
    }

    let entropy = EntropySource::new(readers.clone(), ENTROPY_TIMEOUT);
    let draw = DrawEngine::new(entropy, pot.clone());

    let mut wakes: BTreeMap<Ledger, Arc<Notify>> = BTreeMap::new();
    for reader in readers {
        let ledger = reader.ledger();
        let chain = &config.chains[&ledger];
        let wake = Arc::new(Notify::new());
        wakes.insert(ledger, wake.clone());

        Watcher::new(
            reader,
            Address::new(chain.address.clone()),
            chain.confirmations,
            Duration::from_secs(chain.poll_secs),
            prices.clone(),
            pot.clone(),
            draw.clone(),
            notifier.clone(),
            wake,
        )
        .spawn();
    }

    if wakes.is_empty() {
        tracing::warn!("no ledger addresses configured, nothing will be watched");
    }

    let app = api::create_router(api::AppState {
        repo,
        pot,
        wakes: Arc::new(wakes),
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
