//! Domain types and determinism layer for the deposit pool.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Domain primitives: Ledger, Address, TimeMs
//! - DepositEvent / Entry / Round / DrawRecord value types

pub mod decimal;
pub mod deposit;
pub mod entry;
pub mod primitives;
pub mod round;

pub use decimal::Decimal;
pub use deposit::DepositEvent;
pub use entry::Entry;
pub use primitives::{Address, Ledger, TimeMs};
pub use round::{DrawRecord, Round};
