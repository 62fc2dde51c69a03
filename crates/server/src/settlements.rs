//! Settlement endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use engine::{Caller, Settlement, SettlementNew, SettlementSuggestion, SettlementUpdate};

use crate::{ServerError, server::ServerState};

pub async fn list(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
) -> Result<Json<Vec<Settlement>>, ServerError> {
    Ok(Json(state.engine.list_settlements(&trip_id, &caller).await?))
}

pub async fn create(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
    Json(payload): Json<SettlementNew>,
) -> Result<(StatusCode, Json<Settlement>), ServerError> {
    let settlement = state
        .engine
        .create_settlement(&trip_id, payload, &caller)
        .await?;
    Ok((StatusCode::CREATED, Json(settlement)))
}

pub async fn update(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path((trip_id, settlement_id)): Path<(String, String)>,
    Json(payload): Json<SettlementUpdate>,
) -> Result<Json<Settlement>, ServerError> {
    let settlement = state
        .engine
        .update_settlement(&trip_id, &settlement_id, payload, &caller)
        .await?;
    Ok(Json(settlement))
}

pub async fn delete(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path((trip_id, settlement_id)): Path<(String, String)>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_settlement(&trip_id, &settlement_id, &caller)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Greedy plan that settles every balance.
pub async fn suggested(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
) -> Result<Json<Vec<SettlementSuggestion>>, ServerError> {
    Ok(Json(
        state
            .engine
            .suggested_settlements(&trip_id, &caller)
            .await?,
    ))
}
