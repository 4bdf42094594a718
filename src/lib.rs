pub mod api;
pub mod chains;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod notify;
pub mod pricing;
pub mod watcher;

pub use chains::{ChainError, ChainReader, Cursor, MockChainReader};
pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{Address, Decimal, DepositEvent, DrawRecord, Entry, Ledger, Round, TimeMs};
pub use engine::{DrawEngine, EntropySource, PotConfig, RoundLedger};
pub use error::AppError;
pub use notify::{Notifier, PotEvent};
pub use pricing::PriceCache;
pub use watcher::Watcher;
