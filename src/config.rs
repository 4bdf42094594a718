use crate::domain::{Decimal, Ledger};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Per-ledger watcher settings. A ledger with no configured address is
/// disabled and gets no watcher.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub address: String,
    pub endpoint_url: String,
    pub confirmations: u64,
    pub poll_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub entry_price_usd: Decimal,
    pub entry_tolerance: Decimal,
    pub round_target_usd: Decimal,
    pub payout_pct: Decimal,
    pub price_api_url: String,
    pub price_ttl_secs: u64,
    pub chains: BTreeMap<Ledger, ChainConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// (ledger, endpoint env key, default endpoint, default poll cadence).
const CHAIN_DEFAULTS: [(Ledger, &str, &str, u64); 4] = [
    (
        Ledger::Bitcoin,
        "BTC_API_URL",
        "https://blockstream.info/api",
        20,
    ),
    (
        Ledger::Ethereum,
        "ETH_RPC_URL",
        "https://cloudflare-eth.com",
        15,
    ),
    (
        Ledger::Polygon,
        "POL_RPC_URL",
        "https://polygon-rpc.com",
        15,
    ),
    (
        Ledger::Solana,
        "SOL_RPC_URL",
        "https://api.mainnet-beta.solana.com",
        12,
    ),
];

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let entry_price_usd = parse_decimal(&env_map, "ENTRY_PRICE_USD", None)?;
        if !entry_price_usd.is_positive() {
            return Err(ConfigError::InvalidValue(
                "ENTRY_PRICE_USD".to_string(),
                "must be > 0".to_string(),
            ));
        }

        let entry_tolerance = parse_decimal(&env_map, "ENTRY_TOLERANCE", Some("0.1"))?;
        let half = Decimal::from_str_canonical("0.5").unwrap_or_default();
        if entry_tolerance > half || entry_tolerance < Decimal::zero() {
            return Err(ConfigError::InvalidValue(
                "ENTRY_TOLERANCE".to_string(),
                "must lie in [0, 0.5]".to_string(),
            ));
        }

        let round_target_usd = parse_decimal(&env_map, "ROUND_TARGET_USD", None)?;
        if !round_target_usd.is_positive() {
            return Err(ConfigError::InvalidValue(
                "ROUND_TARGET_USD".to_string(),
                "must be > 0".to_string(),
            ));
        }

        let payout_pct = parse_decimal(&env_map, "PAYOUT_PCT", Some("1.0"))?;
        let min_payout = Decimal::from_str_canonical("0.10").unwrap_or_default();
        if payout_pct < min_payout || payout_pct > Decimal::one() {
            return Err(ConfigError::InvalidValue(
                "PAYOUT_PCT".to_string(),
                "must lie in [0.10, 1.00]".to_string(),
            ));
        }

        let price_api_url = env_map
            .get("PRICE_API_URL")
            .cloned()
            .unwrap_or_else(|| "https://api.coingecko.com".to_string());
        let price_ttl_secs = parse_u64(&env_map, "PRICE_TTL_SECS", 60)?;

        let mut chains = BTreeMap::new();
        for (ledger, endpoint_key, default_endpoint, default_poll) in CHAIN_DEFAULTS {
            let symbol = ledger.symbol();
            let Some(address) = env_map
                .get(&format!("{}_ADDRESS", symbol))
                .filter(|s| !s.trim().is_empty())
            else {
                continue;
            };

            let confirmations =
                parse_u64(&env_map, &format!("{}_CONFIRMATIONS", symbol), 1)?;
            if confirmations == 0 {
                return Err(ConfigError::InvalidValue(
                    format!("{}_CONFIRMATIONS", symbol),
                    "must be >= 1".to_string(),
                ));
            }
            let poll_secs = parse_u64(&env_map, &format!("{}_POLL_SECS", symbol), default_poll)?;
            if poll_secs == 0 {
                return Err(ConfigError::InvalidValue(
                    format!("{}_POLL_SECS", symbol),
                    "must be >= 1".to_string(),
                ));
            }

            chains.insert(
                ledger,
                ChainConfig {
                    address: address.trim().to_string(),
                    endpoint_url: env_map
                        .get(endpoint_key)
                        .cloned()
                        .unwrap_or_else(|| default_endpoint.to_string()),
                    confirmations,
                    poll_secs,
                },
            );
        }

        Ok(Config {
            port,
            database_path,
            entry_price_usd,
            entry_tolerance,
            round_target_usd,
            payout_pct,
            price_api_url,
            price_ttl_secs,
            chains,
        })
    }
}

fn parse_decimal(
    env_map: &HashMap<String, String>,
    key: &str,
    default: Option<&str>,
) -> Result<Decimal, ConfigError> {
    let raw = match (env_map.get(key), default) {
        (Some(value), _) => value.as_str(),
        (None, Some(default)) => default,
        (None, None) => return Err(ConfigError::MissingEnv(key.to_string())),
    };
    Decimal::from_str_canonical(raw).map_err(|_| {
        ConfigError::InvalidValue(key.to_string(), "must be a decimal number".to_string())
    })
}

fn parse_u64(
    env_map: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match env_map.get(key) {
        Some(value) => value.parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a valid u64".to_string())
        }),
        None => Ok(default),
    }
}
