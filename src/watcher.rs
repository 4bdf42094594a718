//! Per-ledger deposit watcher.
//!
//! One watcher task per configured ledger, each on its own cadence. A
//! tick runs to completion before the next begins, so per-ledger work is
//! never reentrant; watchers only meet each other inside the round
//! ledger's critical section. A failed tick is logged and leaves the
//! cursor untouched — the same candidates come back on the next cadence.

use crate::chains::{ChainError, ChainReader, Cursor};
use crate::domain::{Address, Ledger};
use crate::engine::{CreditOutcome, DrawEngine, DrawError, RoundLedger};
use crate::notify::{Notifier, PotEvent};
use crate::pricing::PriceCache;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Draw(#[from] DrawError),
}

pub struct Watcher {
    ledger: Ledger,
    address: Address,
    reader: Arc<dyn ChainReader>,
    prices: Arc<PriceCache>,
    pot: Arc<RoundLedger>,
    draw: DrawEngine,
    notifier: Arc<dyn Notifier>,
    confirmations: u64,
    cadence: Duration,
    wake: Arc<Notify>,
    cursor: Cursor,
}

impl Watcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: Arc<dyn ChainReader>,
        address: Address,
        confirmations: u64,
        cadence: Duration,
        prices: Arc<PriceCache>,
        pot: Arc<RoundLedger>,
        draw: DrawEngine,
        notifier: Arc<dyn Notifier>,
        wake: Arc<Notify>,
    ) -> Self {
        let ledger = reader.ledger();
        // The Bitcoin explorer reports depth 0 or 1 only; a deeper
        // threshold would never be met there.
        let confirmations = match ledger {
            Ledger::Bitcoin => confirmations.min(1),
            _ => confirmations,
        };
        Self {
            ledger,
            address,
            reader,
            prices,
            pot,
            draw,
            notifier,
            confirmations,
            cadence,
            wake,
            cursor: Cursor::start(),
        }
    }

    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(&mut self) {
        info!(
            ledger = %self.ledger,
            address = %self.address,
            cadence_secs = self.cadence.as_secs(),
            confirmations = self.confirmations,
            "watcher started"
        );

        let mut interval = tokio::time::interval(self.cadence);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.wake.notified() => {
                    debug!(ledger = %self.ledger, "woken by inbound notification");
                }
            }
            if let Err(e) = self.tick().await {
                warn!(ledger = %self.ledger, error = %e, "tick failed, cursor unchanged");
            }
        }
    }

    /// One polling cycle: list candidates, gate on confirmation depth,
    /// price, credit, and draw if the pot target was just reached.
    pub async fn tick(&mut self) -> Result<(), WatcherError> {
        let (events, next_cursor) = self
            .reader
            .list_candidate_events(&self.address, &self.cursor)
            .await?;

        let mut evaluated_any = false;
        let mut reached_target = false;

        for event in &events {
            if !event.is_confirmed(self.confirmations) {
                // Stays visible next tick; the cursor never passes it.
                debug!(
                    ledger = %self.ledger,
                    event_id = %event.event_id,
                    depth = event.confirmations,
                    "awaiting confirmations"
                );
                continue;
            }
            if self.pot.is_credited(self.ledger, &event.event_id).await {
                continue;
            }

            let usd_amount = self.prices.to_usd(self.ledger, event.native_amount).await;
            if usd_amount.is_zero() {
                // No quote yet. Defer without marking seen so the event
                // is re-evaluated once the price recovers.
                warn!(
                    ledger = %self.ledger,
                    event_id = %event.event_id,
                    "price unavailable, deferring deposit"
                );
                continue;
            }

            match self.pot.credit(event, usd_amount).await? {
                CreditOutcome::Accepted {
                    reached_target: reached,
                    ..
                } => {
                    evaluated_any = true;
                    reached_target |= reached;
                }
                CreditOutcome::Rejected => evaluated_any = true,
                CreditOutcome::Duplicate => {}
            }
        }

        self.cursor = next_cursor;

        if reached_target {
            match self.draw.run().await {
                Ok(_) => {}
                // Round state untouched; the next target check retries.
                Err(DrawError::EmptyPool) => {
                    warn!(ledger = %self.ledger, "draw aborted on empty pool")
                }
                Err(e) => return Err(e.into()),
            }
        } else if evaluated_any {
            match self.reader.current_balance(&self.address).await {
                Ok(balance) => self.notifier.publish(PotEvent::DepositObserved {
                    ledger: self.ledger,
                    balance,
                }),
                Err(e) => warn!(ledger = %self.ledger, error = %e, "balance refresh failed"),
            }
        }

        Ok(())
    }
}
