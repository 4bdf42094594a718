//! Draw reproducibility: the seed digest is the SHA-256 of the canonical
//! seed JSON, and identical frozen inputs always select the same winner.

use chainpot::db::{init_db, Repository};
use chainpot::domain::{Address, Decimal, DepositEvent, Ledger, TimeMs};
use chainpot::engine::{PotConfig, RoundLedger};
use chainpot::notify::CollectingNotifier;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;

fn dec(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn deposit(ledger: Ledger, id: &str) -> DepositEvent {
    DepositEvent {
        ledger,
        event_id: id.to_string(),
        source_address: Address::new(format!("{}-sender", id)),
        native_amount: dec("1"),
        observed_at: TimeMs::new(1000),
        confirmations: 30,
    }
}

async fn pot_with_target(target: &str) -> (Arc<RoundLedger>, Arc<Repository>, TempDir) {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("test.db").to_string_lossy().to_string();
    let pool = init_db(&db_path).await.unwrap();
    let repo = Arc::new(Repository::new(pool));
    let pot = RoundLedger::restore(
        repo.clone(),
        Arc::new(CollectingNotifier::new()),
        PotConfig {
            entry_price_usd: dec("50"),
            entry_tolerance: dec("0.10"),
            round_target_usd: dec(target),
            payout_pct: dec("1"),
        },
    )
    .await
    .unwrap();
    (Arc::new(pot), repo, temp)
}

fn audit_entropy() -> BTreeMap<Ledger, String> {
    // One ledger timed out and contributed an empty fingerprint.
    let mut entropy = BTreeMap::new();
    entropy.insert(Ledger::Bitcoin, "x".to_string());
    entropy.insert(Ledger::Ethereum, "y".to_string());
    entropy.insert(Ledger::Polygon, "z".to_string());
    entropy.insert(Ledger::Solana, "".to_string());
    entropy
}

#[tokio::test]
async fn test_seed_digest_matches_hand_computed_canonical_json() {
    let (pot, _repo, _temp) = pot_with_target("150").await;

    pot.credit(&deposit(Ledger::Bitcoin, "tx-b"), dec("50"))
        .await
        .unwrap();
    pot.credit(&deposit(Ledger::Ethereum, "tx-e"), dec("50"))
        .await
        .unwrap();
    pot.credit(&deposit(Ledger::Solana, "tx-s"), dec("50"))
        .await
        .unwrap();

    let record = pot.settle(audit_entropy()).await.unwrap().expect("draw");

    // Any conforming implementation hashing the same canonical JSON
    // string must land on this digest byte-for-byte.
    let material = r#"{"entropy":{"BTC":"x","ETH":"y","POL":"z","SOL":""},"eventIds":["tx-b","tx-e","tx-s"],"usdTotal":"150.00"}"#;
    let expected = hex::encode(Sha256::digest(material.as_bytes()));

    assert_eq!(record.seed_digest, expected);
    assert_eq!(record.ticket_pool_size, 3);
    assert!(record.selected_index < 3);
    assert_eq!(record.entropy, audit_entropy());
}

#[tokio::test]
async fn test_identical_inputs_select_identical_winner() {
    let (pot_a, _ra, _ta) = pot_with_target("100").await;
    let (pot_b, _rb, _tb) = pot_with_target("100").await;

    for pot in [&pot_a, &pot_b] {
        pot.credit(&deposit(Ledger::Bitcoin, "tx-1"), dec("47"))
            .await
            .unwrap();
        pot.credit(&deposit(Ledger::Polygon, "tx-2"), dec("103"))
            .await
            .unwrap();
    }

    let a = pot_a.settle(audit_entropy()).await.unwrap().unwrap();
    let b = pot_b.settle(audit_entropy()).await.unwrap().unwrap();

    assert_eq!(a.seed_digest, b.seed_digest);
    assert_eq!(a.selected_index, b.selected_index);
    assert_eq!(a.winner, b.winner);
    // 1 ticket for $47, 2 tickets for $103.
    assert_eq!(a.ticket_pool_size, 3);
}

#[tokio::test]
async fn test_entropy_change_changes_digest() {
    let (pot_a, _ra, _ta) = pot_with_target("50").await;
    let (pot_b, _rb, _tb) = pot_with_target("50").await;

    for pot in [&pot_a, &pot_b] {
        pot.credit(&deposit(Ledger::Bitcoin, "tx-1"), dec("50"))
            .await
            .unwrap();
    }

    let a = pot_a.settle(audit_entropy()).await.unwrap().unwrap();

    let mut other = audit_entropy();
    other.insert(Ledger::Bitcoin, "different-block".to_string());
    let b = pot_b.settle(other).await.unwrap().unwrap();

    assert_ne!(a.seed_digest, b.seed_digest);
}

#[tokio::test]
async fn test_draw_record_is_retained_for_audit() {
    let (pot, repo, _temp) = pot_with_target("50").await;

    pot.credit(&deposit(Ledger::Solana, "sig-1"), dec("50"))
        .await
        .unwrap();
    let record = pot.settle(audit_entropy()).await.unwrap().unwrap();

    let stored = repo.get_draw(record.round_id).await.unwrap().unwrap();
    assert_eq!(stored, record);
}
