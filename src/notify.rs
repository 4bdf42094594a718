//! Outbound notification contract.
//!
//! The chat front end is an external collaborator: it consumes the plain
//! text rendered here and does its own delivery. Draw notifications
//! render every audit field verbatim so a reader can re-run the digest.

use crate::domain::{Decimal, DrawRecord, Ledger};
use std::fmt;
use tracing::info;

#[derive(Debug, Clone)]
pub enum PotEvent {
    EntryAccepted {
        ledger: Ledger,
        native_amount: Decimal,
        usd_amount: Decimal,
        tickets: u32,
        usd_total: Decimal,
        target_usd: Decimal,
    },
    EntryRejected {
        ledger: Ledger,
        native_amount: Decimal,
        usd_amount: Decimal,
        entry_price_usd: Decimal,
        tolerance: Decimal,
    },
    DepositObserved {
        ledger: Ledger,
        balance: Decimal,
    },
    DrawCompleted(DrawRecord),
    RoundFinalized {
        round_id: i64,
        new_round_id: i64,
    },
}

impl PotEvent {
    /// Plain-text rendering consumed by the front end.
    pub fn render(&self) -> String {
        match self {
            PotEvent::EntryAccepted {
                ledger,
                native_amount,
                usd_amount,
                tickets,
                usd_total,
                target_usd,
            } => format!(
                "Entry accepted on {}: {} {} (~${}) = {} ticket(s). Pot at ${} of ${}.",
                ledger,
                native_amount,
                ledger.symbol(),
                usd_amount.to_usd_2dp_string(),
                tickets,
                usd_total.to_usd_2dp_string(),
                target_usd.to_usd_2dp_string(),
            ),
            PotEvent::EntryRejected {
                ledger,
                native_amount,
                usd_amount,
                entry_price_usd,
                tolerance,
            } => {
                let band = *entry_price_usd * *tolerance;
                format!(
                    "Entry rejected on {}: {} {} (~${}) is outside the accepted range. \
                     Send ${} +/- ${}, or a whole multiple of ${}. No tickets issued.",
                    ledger,
                    native_amount,
                    ledger.symbol(),
                    usd_amount.to_usd_2dp_string(),
                    entry_price_usd.to_usd_2dp_string(),
                    band.to_usd_2dp_string(),
                    entry_price_usd.to_usd_2dp_string(),
                )
            }
            PotEvent::DepositObserved { ledger, balance } => format!(
                "Deposit observed on {}; wallet balance is now {} {}.",
                ledger,
                balance,
                ledger.symbol(),
            ),
            PotEvent::DrawCompleted(record) => {
                let entropy = record
                    .entropy
                    .iter()
                    .map(|(ledger, fp)| format!("{}={}", ledger, fp))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!(
                    "Draw completed for round {}. Collected ${}, payout ${}. \
                     Winner {} on {} via event {} (ticket {} of {}). \
                     Entropy: [{}]. Seed digest: {}.",
                    record.round_id,
                    record.usd_total.to_usd_2dp_string(),
                    record.payout_usd.to_usd_2dp_string(),
                    record.winner.source_address,
                    record.winner.ledger,
                    record.winner.event_id,
                    record.selected_index,
                    record.ticket_pool_size,
                    entropy,
                    record.seed_digest,
                )
            }
            PotEvent::RoundFinalized {
                round_id,
                new_round_id,
            } => format!(
                "Round {} finalized manually; round {} is now open.",
                round_id, new_round_id,
            ),
        }
    }
}

/// Sink for outbound events.
pub trait Notifier: Send + Sync + fmt::Debug {
    fn publish(&self, event: PotEvent);
}

/// Logs rendered events; the default sink when no front end is attached.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn publish(&self, event: PotEvent) {
        info!(message = %event.render(), "pot event");
    }
}

/// Forwards rendered events over a channel to the external front end.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: tokio::sync::mpsc::UnboundedSender<String>,
}

impl ChannelNotifier {
    pub fn new(sender: tokio::sync::mpsc::UnboundedSender<String>) -> Self {
        Self { sender }
    }
}

impl Notifier for ChannelNotifier {
    fn publish(&self, event: PotEvent) {
        // A detached front end is not an error worth failing a tick over.
        let _ = self.sender.send(event.render());
    }
}

/// Buffers events for inspection in tests.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    events: std::sync::Mutex<Vec<PotEvent>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PotEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn rendered(&self) -> Vec<String> {
        self.events().iter().map(|e| e.render()).collect()
    }
}

impl Notifier for CollectingNotifier {
    fn publish(&self, event: PotEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, Entry, TimeMs};
    use std::collections::BTreeMap;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_accepted_render_mentions_totals() {
        let text = PotEvent::EntryAccepted {
            ledger: Ledger::Bitcoin,
            native_amount: dec("0.001"),
            usd_amount: dec("47"),
            tickets: 1,
            usd_total: dec("47"),
            target_usd: dec("500"),
        }
        .render();
        assert!(text.contains("1 ticket"));
        assert!(text.contains("$47.00 of $500.00"));
    }

    #[test]
    fn test_rejected_render_explains_range() {
        let text = PotEvent::EntryRejected {
            ledger: Ledger::Ethereum,
            native_amount: dec("0.01"),
            usd_amount: dec("25"),
            entry_price_usd: dec("50"),
            tolerance: dec("0.1"),
        }
        .render();
        assert!(text.contains("$50.00 +/- $5.00"));
    }

    #[test]
    fn test_draw_render_carries_audit_fields() {
        let mut entropy = BTreeMap::new();
        entropy.insert(Ledger::Bitcoin, "x".to_string());
        entropy.insert(Ledger::Solana, "".to_string());
        let record = DrawRecord {
            round_id: 3,
            entropy,
            ticket_pool_size: 5,
            seed_digest: "abc123".to_string(),
            selected_index: 2,
            winner: Entry {
                event_id: "tx9".to_string(),
                ledger: Ledger::Bitcoin,
                source_address: Address::new("bc1qwinner".to_string()),
                native_amount: dec("0.002"),
                usd_amount: dec("100"),
                tickets: 2,
                time_ms: TimeMs::new(0),
            },
            usd_total: dec("250"),
            payout_usd: dec("250"),
            drawn_at: TimeMs::new(0),
        };
        let text = PotEvent::DrawCompleted(record).render();
        for needle in ["abc123", "tx9", "bc1qwinner", "ticket 2 of 5", "BTC=x", "SOL="] {
            assert!(text.contains(needle), "missing {:?} in {:?}", needle, text);
        }
    }
}
