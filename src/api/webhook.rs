//! Inbound wake-up nudges from external notification transports.
//!
//! The payload is ignored on purpose: a nudge only moves the next poll
//! forward, the watcher still observes the chain itself.

use super::AppState;
use crate::domain::Ledger;
use crate::error::AppError;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct NudgeResponse {
    pub status: &'static str,
}

pub async fn nudge(
    State(state): State<AppState>,
    Path(ledger): Path<String>,
) -> Result<Json<NudgeResponse>, AppError> {
    let ledger = Ledger::from_symbol(&ledger)
        .ok_or_else(|| AppError::BadRequest(format!("unknown ledger: {}", ledger)))?;

    let wake = state
        .wakes
        .get(&ledger)
        .ok_or_else(|| AppError::NotFound(format!("ledger {} is not watched", ledger)))?;

    wake.notify_one();
    Ok(Json(NudgeResponse { status: "accepted" }))
}
