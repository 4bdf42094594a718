//! Operator overrides consumed from the chat front end.

use super::AppState;
use crate::domain::{Decimal, Ledger};
use crate::engine::FinalizeOutcome;
use crate::error::AppError;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub ledger: String,
    pub event_id: String,
    pub amount_usd: Option<String>,
    pub round_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_round: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_round: Option<i64>,
}

/// Record an out-of-band payout and rotate the round without a draw.
/// Idempotent against repeated invocation.
pub async fn finalize(
    State(state): State<AppState>,
    Json(request): Json<FinalizeRequest>,
) -> Result<Json<FinalizeResponse>, AppError> {
    let ledger = Ledger::from_symbol(&request.ledger)
        .ok_or_else(|| AppError::BadRequest(format!("unknown ledger: {}", request.ledger)))?;

    let amount_usd = match &request.amount_usd {
        Some(raw) => Some(Decimal::from_str_canonical(raw).map_err(|_| {
            AppError::BadRequest(format!("amountUsd is not a decimal: {}", raw))
        })?),
        None => None,
    };

    let outcome = state
        .pot
        .manual_finalize(ledger, &request.event_id, amount_usd, request.round_id)
        .await?;

    Ok(Json(match outcome {
        FinalizeOutcome::Rotated {
            closed_round,
            new_round,
        } => FinalizeResponse {
            status: "rotated",
            closed_round: Some(closed_round),
            new_round: Some(new_round),
        },
        FinalizeOutcome::AlreadyFinalized => FinalizeResponse {
            status: "alreadyFinalized",
            closed_round: None,
            new_round: None,
        },
    }))
}
