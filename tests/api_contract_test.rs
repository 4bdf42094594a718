//! Contract tests for the HTTP surface: camelCase field names, decimals
//! as strings, JSON error envelopes, and byte-identical repeat reads.

use axum::http::StatusCode;
use chainpot::api::{self, AppState};
use chainpot::db::{init_db, Repository};
use chainpot::domain::{Address, Decimal, DepositEvent, Ledger, TimeMs};
use chainpot::engine::{PotConfig, RoundLedger};
use chainpot::notify::CollectingNotifier;
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;
use tower::util::ServiceExt;

struct TestApp {
    app: axum::Router,
    pot: Arc<RoundLedger>,
    _temp: TempDir,
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

async fn setup_test_app() -> TestApp {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("test.db").to_string_lossy().to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));

    let pot = Arc::new(
        RoundLedger::restore(
            repo.clone(),
            Arc::new(CollectingNotifier::new()),
            PotConfig {
                entry_price_usd: dec("50"),
                entry_tolerance: dec("0.10"),
                round_target_usd: dec("500"),
                payout_pct: dec("1"),
            },
        )
        .await
        .expect("restore failed"),
    );

    let mut wakes = BTreeMap::new();
    wakes.insert(Ledger::Bitcoin, Arc::new(Notify::new()));

    let app = api::create_router(AppState {
        repo,
        pot: pot.clone(),
        wakes: Arc::new(wakes),
    });

    TestApp {
        app,
        pot,
        _temp: temp,
    }
}

async fn request(app: axum::Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Vec<u8>) {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            axum::body::Body::from(json.to_string())
        }
        None => axum::body::Body::empty(),
    };
    let resp = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, bytes)
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

/// Assert all keys in a JSON object are camelCase
fn assert_all_keys_camel_case(value: &serde_json::Value, path: &str) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                // Entropy maps are keyed by ledger symbol, not field name.
                if path.ends_with(".entropy") || path.ends_with(".entriesPerLedger") {
                    continue;
                }
                assert!(
                    key.chars().next().map_or(true, |c| c.is_lowercase()),
                    "Key '{}' at path '{}' should start with lowercase (camelCase)",
                    key,
                    path
                );
                assert!(
                    !key.contains('_'),
                    "Key '{}' at path '{}' should not contain underscores (camelCase)",
                    key,
                    path
                );
                assert_all_keys_camel_case(val, &format!("{}.{}", path, key));
            }
        }
        serde_json::Value::Array(arr) => {
            for (i, val) in arr.iter().enumerate() {
                assert_all_keys_camel_case(val, &format!("{}[{}]", path, i));
            }
        }
        _ => {}
    }
}

#[tokio::test]
async fn test_health_and_ready() {
    let test_app = setup_test_app().await;

    let (status, body) = request(test_app.app.clone(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), "ok");

    let (status, body) = request(test_app.app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), "ready");
}

#[tokio::test]
async fn test_current_round_contract() {
    let test_app = setup_test_app().await;
    test_app
        .pot
        .credit(&deposit(Ledger::Bitcoin, "tx1"), dec("47"))
        .await
        .unwrap();

    let (status, body) = request(test_app.app, "GET", "/v1/rounds/current", None).await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_all_keys_camel_case(&json, "root");
    assert_eq!(json["roundId"], 1);
    assert_eq!(json["usdTotal"], "47", "decimals go out as strings");
    assert_eq!(json["targetUsd"], "500");
    assert_eq!(json["entriesPerLedger"]["BTC"], 1);
    assert_eq!(json["entriesPerLedger"]["SOL"], 0);
}

#[tokio::test]
async fn test_draw_endpoints_render_audit_record_verbatim() {
    let test_app = setup_test_app().await;
    test_app
        .pot
        .credit(&deposit(Ledger::Bitcoin, "tx1"), dec("250"))
        .await
        .unwrap();
    test_app
        .pot
        .credit(&deposit(Ledger::Solana, "sig1"), dec("250"))
        .await
        .unwrap();

    let mut entropy = BTreeMap::new();
    entropy.insert(Ledger::Bitcoin, "block-x".to_string());
    entropy.insert(Ledger::Solana, "".to_string());
    let record = test_app.pot.settle(entropy).await.unwrap().expect("draw");

    let (status, body) = request(test_app.app.clone(), "GET", "/v1/draws/1", None).await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_all_keys_camel_case(&json, "root");
    assert_eq!(json["roundId"], 1);
    assert_eq!(json["seedDigest"], record.seed_digest.as_str());
    assert_eq!(json["selectedIndex"], record.selected_index);
    assert_eq!(json["ticketPoolSize"], 10);
    assert_eq!(json["entropy"]["BTC"], "block-x");
    assert_eq!(json["entropy"]["SOL"], "");
    assert_eq!(json["usdTotal"], "500");
    assert_eq!(json["payoutUsd"], "500");
    assert_eq!(json["winner"]["eventId"], record.winner.event_id.as_str());

    let (status, body) = request(test_app.app, "GET", "/v1/draws", None).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["draws"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_draw_not_found_is_json_error() {
    let test_app = setup_test_app().await;

    let (status, body) = request(test_app.app, "GET", "/v1/draws/9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_finalize_is_idempotent_over_http() {
    let test_app = setup_test_app().await;
    test_app
        .pot
        .credit(&deposit(Ledger::Bitcoin, "tx1"), dec("47"))
        .await
        .unwrap();

    let payload = r#"{"ledger":"BTC","eventId":"payout-tx","amountUsd":"47"}"#;

    let (status, body) = request(
        test_app.app.clone(),
        "POST",
        "/v1/admin/finalize",
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "rotated");
    assert_eq!(json["closedRound"], 1);
    assert_eq!(json["newRound"], 2);

    let (status, body) = request(test_app.app, "POST", "/v1/admin/finalize", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "alreadyFinalized");
    assert_eq!(test_app.pot.current_round_id().await, 2);
}

#[tokio::test]
async fn test_finalize_rejects_unknown_ledger() {
    let test_app = setup_test_app().await;

    let (status, body) = request(
        test_app.app,
        "POST",
        "/v1/admin/finalize",
        Some(r#"{"ledger":"DOGE","eventId":"x"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("DOGE"));
}

#[tokio::test]
async fn test_webhook_nudge_routes_by_ledger() {
    let test_app = setup_test_app().await;

    let (status, _) = request(test_app.app.clone(), "POST", "/v1/webhook/BTC", None).await;
    assert_eq!(status, StatusCode::OK);

    // Configured but unwatched ledger.
    let (status, body) = request(test_app.app.clone(), "POST", "/v1/webhook/SOL", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].is_string());

    let (status, _) = request(test_app.app, "POST", "/v1/webhook/XRP", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_repeat_reads_are_byte_identical() {
    let test_app = setup_test_app().await;
    test_app
        .pot
        .credit(&deposit(Ledger::Polygon, "tx1"), dec("55"))
        .await
        .unwrap();

    for uri in ["/v1/rounds/current", "/v1/draws"] {
        let (_s1, b1) = request(test_app.app.clone(), "GET", uri, None).await;
        let (_s2, b2) = request(test_app.app.clone(), "GET", uri, None).await;
        assert_eq!(b1, b2, "{} must return byte-identical responses", uri);
    }
}
