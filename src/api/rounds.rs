use super::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentRoundResponse {
    pub round_id: i64,
    pub usd_total: String,
    pub target_usd: String,
    pub entries_per_ledger: BTreeMap<String, u64>,
}

pub async fn get_current_round(State(state): State<AppState>) -> Json<CurrentRoundResponse> {
    let summary = state.pot.summary().await;
    Json(CurrentRoundResponse {
        round_id: summary.round_id,
        usd_total: summary.usd_total.to_canonical_string(),
        target_usd: summary.target_usd.to_canonical_string(),
        entries_per_ledger: summary
            .entries_per_ledger
            .iter()
            .map(|(ledger, count)| (ledger.symbol().to_string(), *count))
            .collect(),
    })
}
