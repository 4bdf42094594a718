//! Repository layer for database operations.
//!
//! Decimal columns are stored as canonical strings and summed in Rust:
//! SQLite's SUM aggregate returns REAL and would lose precision.

use crate::domain::{Address, Decimal, DrawRecord, Entry, Ledger, TimeMs};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::collections::BTreeMap;
use tracing::warn;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    // =========================================================================
    // Credited-event (dedup) operations
    // =========================================================================

    /// Mark an event as seen without crediting an entry (evaluated and
    /// rejected by the tolerance policy). Returns false if it was
    /// already known.
    pub async fn mark_seen(
        &self,
        ledger: Ledger,
        event_id: &str,
        at: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO credited_events (ledger, event_id, credited_at)
            VALUES (?, ?, ?)
            ON CONFLICT(ledger, event_id) DO NOTHING
            "#,
        )
        .bind(ledger.symbol())
        .bind(event_id)
        .bind(at.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record an event id and its entry atomically. Returns false (and
    /// writes nothing) if the event was already credited.
    pub async fn credit_entry(&self, round_id: i64, entry: &Entry) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO credited_events (ledger, event_id, credited_at)
            VALUES (?, ?, ?)
            ON CONFLICT(ledger, event_id) DO NOTHING
            "#,
        )
        .bind(entry.ledger.symbol())
        .bind(&entry.event_id)
        .bind(entry.time_ms.as_i64())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO entries
                (round_id, ledger, event_id, source_address, native_amount,
                 usd_amount, tickets, time_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(round_id)
        .bind(entry.ledger.symbol())
        .bind(&entry.event_id)
        .bind(entry.source_address.as_str())
        .bind(entry.native_amount.to_canonical_string())
        .bind(entry.usd_amount.to_canonical_string())
        .bind(entry.tickets as i64)
        .bind(entry.time_ms.as_i64())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Load the full credited-event set (reconstruction source after a
    /// restart).
    pub async fn load_credited(&self) -> Result<Vec<(Ledger, String)>, sqlx::Error> {
        let rows = sqlx::query("SELECT ledger, event_id FROM credited_events")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let ledger_str: String = row.get("ledger");
                let event_id: String = row.get("event_id");
                match Ledger::from_symbol(&ledger_str) {
                    Some(ledger) => Some((ledger, event_id)),
                    None => {
                        warn!(ledger = %ledger_str, "unknown ledger in credited_events, skipping");
                        None
                    }
                }
            })
            .collect())
    }

    // =========================================================================
    // Round operations
    // =========================================================================

    /// The highest round id present, if any round was ever opened.
    pub async fn current_round_id(&self) -> Result<Option<i64>, sqlx::Error> {
        let row = sqlx::query("SELECT MAX(round_id) as max_id FROM rounds")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<Option<i64>, _>("max_id"))
    }

    /// Open a round: one row per ledger family.
    pub async fn open_round(&self, round_id: i64, started_at: TimeMs) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for ledger in Ledger::ALL {
            sqlx::query(
                r#"
                INSERT INTO rounds (round_id, ledger, started_at)
                VALUES (?, ?, ?)
                ON CONFLICT(round_id, ledger) DO NOTHING
                "#,
            )
            .bind(round_id)
            .bind(ledger.symbol())
            .bind(started_at.as_i64())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Per-family start times of the given round.
    pub async fn load_round_started_at(
        &self,
        round_id: i64,
    ) -> Result<BTreeMap<Ledger, TimeMs>, sqlx::Error> {
        let rows = sqlx::query("SELECT ledger, started_at FROM rounds WHERE round_id = ?")
            .bind(round_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let ledger_str: String = row.get("ledger");
                let started_at: i64 = row.get("started_at");
                Ledger::from_symbol(&ledger_str).map(|l| (l, TimeMs::new(started_at)))
            })
            .collect())
    }

    /// Entries of a round in acceptance order.
    pub async fn load_entries(&self, round_id: i64) -> Result<Vec<Entry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT ledger, event_id, source_address, native_amount, usd_amount,
                   tickets, time_ms
            FROM entries
            WHERE round_id = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(round_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(row_to_entry).collect())
    }

    // =========================================================================
    // Draw / settlement operations
    // =========================================================================

    /// Persist a completed draw and rotate to the next round, atomically.
    pub async fn record_draw_and_rotate(
        &self,
        record: &DrawRecord,
        next_round_id: i64,
        started_at: TimeMs,
    ) -> Result<(), sqlx::Error> {
        let entropy_json = serde_json::to_string(&record.entropy)
            .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO draws
                (round_id, entropy_json, ticket_pool_size, seed_digest, selected_index,
                 winner_ledger, winner_event_id, winner_address, winner_native_amount,
                 winner_usd_amount, winner_tickets, winner_time_ms,
                 usd_total, payout_usd, drawn_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.round_id)
        .bind(entropy_json)
        .bind(record.ticket_pool_size as i64)
        .bind(&record.seed_digest)
        .bind(record.selected_index as i64)
        .bind(record.winner.ledger.symbol())
        .bind(&record.winner.event_id)
        .bind(record.winner.source_address.as_str())
        .bind(record.winner.native_amount.to_canonical_string())
        .bind(record.winner.usd_amount.to_canonical_string())
        .bind(record.winner.tickets as i64)
        .bind(record.winner.time_ms.as_i64())
        .bind(record.usd_total.to_canonical_string())
        .bind(record.payout_usd.to_canonical_string())
        .bind(record.drawn_at.as_i64())
        .execute(&mut *tx)
        .await?;

        close_and_open(&mut tx, record.round_id, next_round_id, started_at).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Record an out-of-band payout confirmation and rotate without a
    /// draw, atomically.
    pub async fn finalize_and_rotate(
        &self,
        round_id: i64,
        ledger: Ledger,
        event_id: &str,
        amount_usd: Option<Decimal>,
        next_round_id: i64,
        started_at: TimeMs,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        insert_payout_confirmation(&mut tx, round_id, ledger, event_id, amount_usd, started_at)
            .await?;
        close_and_open(&mut tx, round_id, next_round_id, started_at).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Record a payout confirmation for an already-rotated round (the
    /// idempotent repeat-call path).
    pub async fn record_payout_confirmation(
        &self,
        round_id: i64,
        ledger: Ledger,
        event_id: &str,
        amount_usd: Option<Decimal>,
        at: TimeMs,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        insert_payout_confirmation(&mut tx, round_id, ledger, event_id, amount_usd, at).await?;
        tx.commit().await?;
        Ok(())
    }

    /// One draw record by round id.
    pub async fn get_draw(&self, round_id: i64) -> Result<Option<DrawRecord>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM draws WHERE round_id = ?")
            .bind(round_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().and_then(row_to_draw))
    }

    /// All draw records, oldest first.
    pub async fn list_draws(&self) -> Result<Vec<DrawRecord>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM draws ORDER BY round_id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().filter_map(row_to_draw).collect())
    }
}

async fn close_and_open(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    round_id: i64,
    next_round_id: i64,
    started_at: TimeMs,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE rounds SET closed_at = ? WHERE round_id = ? AND closed_at IS NULL")
        .bind(started_at.as_i64())
        .bind(round_id)
        .execute(&mut **tx)
        .await?;

    for ledger in Ledger::ALL {
        sqlx::query(
            r#"
            INSERT INTO rounds (round_id, ledger, started_at)
            VALUES (?, ?, ?)
            ON CONFLICT(round_id, ledger) DO NOTHING
            "#,
        )
        .bind(next_round_id)
        .bind(ledger.symbol())
        .bind(started_at.as_i64())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn insert_payout_confirmation(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    round_id: i64,
    ledger: Ledger,
    event_id: &str,
    amount_usd: Option<Decimal>,
    at: TimeMs,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO payout_confirmations (round_id, ledger, event_id, amount_usd, recorded_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(round_id, ledger, event_id) DO NOTHING
        "#,
    )
    .bind(round_id)
    .bind(ledger.symbol())
    .bind(event_id)
    .bind(amount_usd.map(|a| a.to_canonical_string()))
    .bind(at.as_i64())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn parse_decimal(value: &str, column: &str) -> Decimal {
    Decimal::from_str_canonical(value).unwrap_or_else(|e| {
        warn!(column, value, error = %e, "failed to parse stored decimal, using zero");
        Decimal::zero()
    })
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Option<Entry> {
    let ledger_str: String = row.get("ledger");
    let Some(ledger) = Ledger::from_symbol(&ledger_str) else {
        warn!(ledger = %ledger_str, "unknown ledger in entries, skipping");
        return None;
    };
    let native_amount: String = row.get("native_amount");
    let usd_amount: String = row.get("usd_amount");

    Some(Entry {
        event_id: row.get("event_id"),
        ledger,
        source_address: Address::new(row.get("source_address")),
        native_amount: parse_decimal(&native_amount, "native_amount"),
        usd_amount: parse_decimal(&usd_amount, "usd_amount"),
        tickets: row.get::<i64, _>("tickets") as u32,
        time_ms: TimeMs::new(row.get("time_ms")),
    })
}

fn row_to_draw(row: &sqlx::sqlite::SqliteRow) -> Option<DrawRecord> {
    let entropy_json: String = row.get("entropy_json");
    let entropy: BTreeMap<Ledger, String> = match serde_json::from_str(&entropy_json) {
        Ok(map) => map,
        Err(e) => {
            warn!(error = %e, "unreadable entropy json in draws, skipping");
            return None;
        }
    };
    let winner_ledger_str: String = row.get("winner_ledger");
    let Some(winner_ledger) = Ledger::from_symbol(&winner_ledger_str) else {
        warn!(ledger = %winner_ledger_str, "unknown winner ledger in draws, skipping");
        return None;
    };
    let native_amount: String = row.get("winner_native_amount");
    let usd_amount: String = row.get("winner_usd_amount");
    let usd_total: String = row.get("usd_total");
    let payout_usd: String = row.get("payout_usd");

    Some(DrawRecord {
        round_id: row.get("round_id"),
        entropy,
        ticket_pool_size: row.get::<i64, _>("ticket_pool_size") as u64,
        seed_digest: row.get("seed_digest"),
        selected_index: row.get::<i64, _>("selected_index") as u64,
        winner: Entry {
            event_id: row.get("winner_event_id"),
            ledger: winner_ledger,
            source_address: Address::new(row.get("winner_address")),
            native_amount: parse_decimal(&native_amount, "winner_native_amount"),
            usd_amount: parse_decimal(&usd_amount, "winner_usd_amount"),
            tickets: row.get::<i64, _>("winner_tickets") as u32,
            time_ms: TimeMs::new(row.get("winner_time_ms")),
        },
        usd_total: parse_decimal(&usd_total, "usd_total"),
        payout_usd: parse_decimal(&payout_usd, "payout_usd"),
        drawn_at: TimeMs::new(row.get("drawn_at")),
    })
}
