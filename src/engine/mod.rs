//! Deterministic pool logic: accrual, entropy, draw, and the round
//! ledger that ties them together behind one lock.

pub mod accrual;
pub mod draw;
pub mod entropy;
pub mod round_ledger;

pub use accrual::tickets_for;
pub use draw::{DrawEngine, DrawError};
pub use entropy::EntropySource;
pub use round_ledger::{CreditOutcome, FinalizeOutcome, PotConfig, RoundLedger, RoundSummary};
