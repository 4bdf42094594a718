//! Draw audit endpoints. Every DrawRecord field is rendered verbatim;
//! decimal values go out as strings to preserve precision.

use super::AppState;
use crate::domain::DrawRecord;
use crate::error::AppError;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerResponse {
    pub ledger: String,
    pub event_id: String,
    pub source_address: String,
    pub native_amount: String,
    pub usd_amount: String,
    pub tickets: u32,
    pub time_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawResponse {
    pub round_id: i64,
    pub entropy: BTreeMap<String, String>,
    pub ticket_pool_size: u64,
    pub seed_digest: String,
    pub selected_index: u64,
    pub winner: WinnerResponse,
    pub usd_total: String,
    pub payout_usd: String,
    pub drawn_at: i64,
}

impl From<DrawRecord> for DrawResponse {
    fn from(record: DrawRecord) -> Self {
        DrawResponse {
            round_id: record.round_id,
            entropy: record
                .entropy
                .iter()
                .map(|(ledger, fp)| (ledger.symbol().to_string(), fp.clone()))
                .collect(),
            ticket_pool_size: record.ticket_pool_size,
            seed_digest: record.seed_digest,
            selected_index: record.selected_index,
            winner: WinnerResponse {
                ledger: record.winner.ledger.symbol().to_string(),
                event_id: record.winner.event_id,
                source_address: record.winner.source_address.as_str().to_string(),
                native_amount: record.winner.native_amount.to_canonical_string(),
                usd_amount: record.winner.usd_amount.to_canonical_string(),
                tickets: record.winner.tickets,
                time_ms: record.winner.time_ms.as_i64(),
            },
            usd_total: record.usd_total.to_canonical_string(),
            payout_usd: record.payout_usd.to_canonical_string(),
            drawn_at: record.drawn_at.as_i64(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DrawListResponse {
    pub draws: Vec<DrawResponse>,
}

pub async fn list_draws(State(state): State<AppState>) -> Result<Json<DrawListResponse>, AppError> {
    let draws = state
        .repo
        .list_draws()
        .await?
        .into_iter()
        .map(DrawResponse::from)
        .collect();
    Ok(Json(DrawListResponse { draws }))
}

pub async fn get_draw(
    State(state): State<AppState>,
    Path(round_id): Path<i64>,
) -> Result<Json<DrawResponse>, AppError> {
    let record = state
        .repo
        .get_draw(round_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no draw for round {}", round_id)))?;
    Ok(Json(record.into()))
}
