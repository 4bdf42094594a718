//! The shared round state and its single critical section.
//!
//! One mutex guards the open rounds, the aggregate USD total, and the
//! credited-event set together: check-dedup-then-insert and settlement
//! are atomic with respect to every concurrent watcher. External network
//! calls never run under this lock — callers gather prices and entropy
//! first and enter the critical section only to mutate shared state.

use crate::db::Repository;
use crate::domain::{Decimal, DepositEvent, DrawRecord, Entry, Ledger, Round, TimeMs};
use crate::engine::accrual::tickets_for;
use crate::engine::draw::{
    index_from_digest, ordered_event_ids, seed_digest, seed_material, ticket_pool, DrawError,
};
use crate::notify::{Notifier, PotEvent};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Accrual and settlement parameters.
#[derive(Debug, Clone)]
pub struct PotConfig {
    pub entry_price_usd: Decimal,
    pub entry_tolerance: Decimal,
    pub round_target_usd: Decimal,
    pub payout_pct: Decimal,
}

/// Outcome of evaluating one deposit event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditOutcome {
    Accepted { tickets: u32, reached_target: bool },
    /// Outside the tolerance bands; marked seen so it is reported once.
    Rejected,
    /// Already credited or already evaluated — silently skipped.
    Duplicate,
}

/// Outcome of a manual finalization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Rotated { closed_round: i64, new_round: i64 },
    AlreadyFinalized,
}

struct PotState {
    round_id: i64,
    rounds: BTreeMap<Ledger, Round>,
    usd_total: Decimal,
    credited: HashSet<(Ledger, String)>,
}

pub struct RoundLedger {
    repo: Arc<Repository>,
    notifier: Arc<dyn Notifier>,
    config: PotConfig,
    state: Mutex<PotState>,
}

impl RoundLedger {
    /// Restore the ledger from durable state, opening round 1 on a fresh
    /// database. Exactly-once crediting survives restarts because the
    /// credited set and the open round's entries are reloaded here.
    pub async fn restore(
        repo: Arc<Repository>,
        notifier: Arc<dyn Notifier>,
        config: PotConfig,
    ) -> Result<Self, sqlx::Error> {
        let round_id = match repo.current_round_id().await? {
            Some(id) => id,
            None => {
                repo.open_round(1, TimeMs::now()).await?;
                1
            }
        };

        let started = repo.load_round_started_at(round_id).await?;
        let mut rounds: BTreeMap<Ledger, Round> = Ledger::ALL
            .iter()
            .map(|&ledger| {
                let at = started.get(&ledger).copied().unwrap_or_else(TimeMs::now);
                (ledger, Round::new(round_id, at))
            })
            .collect();

        let entries = repo.load_entries(round_id).await?;
        let mut usd_total = Decimal::zero();
        for entry in entries {
            usd_total = usd_total + entry.usd_amount;
            if let Some(round) = rounds.get_mut(&entry.ledger) {
                round.entries.push(entry);
            }
        }

        let credited: HashSet<(Ledger, String)> =
            repo.load_credited().await?.into_iter().collect();

        info!(
            round_id,
            usd_total = %usd_total,
            credited = credited.len(),
            "round ledger restored"
        );

        Ok(Self {
            repo,
            notifier,
            config,
            state: Mutex::new(PotState {
                round_id,
                rounds,
                usd_total,
                credited,
            }),
        })
    }

    pub fn config(&self) -> &PotConfig {
        &self.config
    }

    /// Advisory pre-check so watchers can skip price lookups for events
    /// they already evaluated. `credit` re-checks under the same lock.
    pub async fn is_credited(&self, ledger: Ledger, event_id: &str) -> bool {
        let state = self.state.lock().await;
        state.credited.contains(&(ledger, event_id.to_string()))
    }

    pub async fn reached_target(&self) -> bool {
        let state = self.state.lock().await;
        state.usd_total >= self.config.round_target_usd
    }

    pub async fn usd_total(&self) -> Decimal {
        self.state.lock().await.usd_total
    }

    pub async fn current_round_id(&self) -> i64 {
        self.state.lock().await.round_id
    }

    /// Per-family entry counts plus the aggregate, for the status API.
    pub async fn summary(&self) -> RoundSummary {
        let state = self.state.lock().await;
        RoundSummary {
            round_id: state.round_id,
            usd_total: state.usd_total,
            target_usd: self.config.round_target_usd,
            entries_per_ledger: state
                .rounds
                .iter()
                .map(|(&ledger, round)| (ledger, round.entries.len() as u64))
                .collect(),
        }
    }

    /// Evaluate a deposit against the accrual policy and credit it.
    ///
    /// The dedup check, the durable write, and the in-memory append are
    /// one critical section; two watchers observing the same underlying
    /// event cannot both credit it.
    pub async fn credit(
        &self,
        event: &DepositEvent,
        usd_amount: Decimal,
    ) -> Result<CreditOutcome, sqlx::Error> {
        let mut state = self.state.lock().await;

        let key = (event.ledger, event.event_id.clone());
        if state.credited.contains(&key) {
            return Ok(CreditOutcome::Duplicate);
        }

        let tickets = tickets_for(
            usd_amount,
            self.config.entry_price_usd,
            self.config.entry_tolerance,
        );

        if tickets == 0 {
            // Evaluated and out of band: mark seen so the rejection is
            // reported exactly once.
            let fresh = self
                .repo
                .mark_seen(event.ledger, &event.event_id, TimeMs::now())
                .await?;
            state.credited.insert(key);
            if fresh {
                self.notifier.publish(PotEvent::EntryRejected {
                    ledger: event.ledger,
                    native_amount: event.native_amount,
                    usd_amount,
                    entry_price_usd: self.config.entry_price_usd,
                    tolerance: self.config.entry_tolerance,
                });
            }
            return Ok(CreditOutcome::Rejected);
        }

        let entry = Entry {
            event_id: event.event_id.clone(),
            ledger: event.ledger,
            source_address: event.source_address.clone(),
            native_amount: event.native_amount,
            usd_amount,
            tickets,
            time_ms: event.observed_at,
        };

        if !self.repo.credit_entry(state.round_id, &entry).await? {
            // The durable set is authoritative; resync the mirror.
            warn!(ledger = %event.ledger, event_id = %event.event_id,
                  "event already credited durably, skipping");
            state.credited.insert(key);
            return Ok(CreditOutcome::Duplicate);
        }

        state.credited.insert(key);
        state.usd_total = state.usd_total + usd_amount;
        if let Some(round) = state.rounds.get_mut(&event.ledger) {
            round.entries.push(entry);
        }

        self.notifier.publish(PotEvent::EntryAccepted {
            ledger: event.ledger,
            native_amount: event.native_amount,
            usd_amount,
            tickets,
            usd_total: state.usd_total,
            target_usd: self.config.round_target_usd,
        });

        Ok(CreditOutcome::Accepted {
            tickets,
            reached_target: state.usd_total >= self.config.round_target_usd,
        })
    }

    /// Settle the open round with the given entropy: snapshot the pool,
    /// derive the winner, persist the audit record, rotate.
    ///
    /// Returns None when the target is no longer reached under the lock
    /// (a competing settle already rotated). The entire settlement holds
    /// the state lock, so no entry can slip between the pool snapshot
    /// and the rotation.
    pub async fn settle(
        &self,
        entropy: BTreeMap<Ledger, String>,
    ) -> Result<Option<DrawRecord>, DrawError> {
        let mut state = self.state.lock().await;

        if state.usd_total < self.config.round_target_usd {
            return Ok(None);
        }

        let pool = ticket_pool(&state.rounds);
        if pool.is_empty() {
            return Err(DrawError::EmptyPool);
        }

        let event_ids = ordered_event_ids(&state.rounds);
        let material = seed_material(&entropy, &event_ids, state.usd_total);
        let digest = seed_digest(&material);
        let selected_index = index_from_digest(&digest, pool.len() as u64);
        let winner = pool[selected_index as usize].clone();

        let record = DrawRecord {
            round_id: state.round_id,
            entropy,
            ticket_pool_size: pool.len() as u64,
            seed_digest: digest,
            selected_index,
            winner,
            usd_total: state.usd_total,
            payout_usd: state.usd_total * self.config.payout_pct,
            drawn_at: TimeMs::now(),
        };

        let next_round_id = state.round_id + 1;
        let started_at = TimeMs::now();
        self.repo
            .record_draw_and_rotate(&record, next_round_id, started_at)
            .await?;

        rotate_state(&mut state, next_round_id, started_at);
        self.notifier.publish(PotEvent::DrawCompleted(record.clone()));

        Ok(Some(record))
    }

    /// Operator override: record an out-of-band payout and rotate
    /// without a draw.
    ///
    /// Idempotent: rotation only advances when the aggregate total is
    /// nonzero or the caller names the currently open round.
    pub async fn manual_finalize(
        &self,
        ledger: Ledger,
        event_id: &str,
        amount_usd: Option<Decimal>,
        round_id: Option<i64>,
    ) -> Result<FinalizeOutcome, sqlx::Error> {
        let mut state = self.state.lock().await;
        let current = state.round_id;

        let should_rotate = state.usd_total.is_positive() || round_id == Some(current);
        if !should_rotate {
            self.repo
                .record_payout_confirmation(
                    round_id.unwrap_or(current),
                    ledger,
                    event_id,
                    amount_usd,
                    TimeMs::now(),
                )
                .await?;
            return Ok(FinalizeOutcome::AlreadyFinalized);
        }

        let next_round_id = current + 1;
        let started_at = TimeMs::now();
        self.repo
            .finalize_and_rotate(current, ledger, event_id, amount_usd, next_round_id, started_at)
            .await?;

        rotate_state(&mut state, next_round_id, started_at);
        self.notifier.publish(PotEvent::RoundFinalized {
            round_id: current,
            new_round_id: next_round_id,
        });

        Ok(FinalizeOutcome::Rotated {
            closed_round: current,
            new_round: next_round_id,
        })
    }
}

fn rotate_state(state: &mut PotState, next_round_id: i64, started_at: TimeMs) {
    state.round_id = next_round_id;
    state.rounds = Ledger::ALL
        .iter()
        .map(|&ledger| (ledger, Round::new(next_round_id, started_at)))
        .collect();
    state.usd_total = Decimal::zero();
}

/// Snapshot of the open round for the status API.
#[derive(Debug, Clone)]
pub struct RoundSummary {
    pub round_id: i64,
    pub usd_total: Decimal,
    pub target_usd: Decimal,
    pub entries_per_ledger: BTreeMap<Ledger, u64>,
}
