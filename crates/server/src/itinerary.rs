//! Itinerary endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use engine::{Caller, ItineraryItem, ItineraryItemNew, ItineraryItemUpdate};

use crate::{ServerError, server::ServerState};

pub async fn list(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
) -> Result<Json<Vec<ItineraryItem>>, ServerError> {
    Ok(Json(state.engine.list_itinerary(&trip_id, &caller).await?))
}

pub async fn create(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
    Json(payload): Json<ItineraryItemNew>,
) -> Result<(StatusCode, Json<ItineraryItem>), ServerError> {
    let item = state
        .engine
        .create_itinerary_item(&trip_id, payload, &caller)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path((trip_id, item_id)): Path<(String, String)>,
    Json(payload): Json<ItineraryItemUpdate>,
) -> Result<Json<ItineraryItem>, ServerError> {
    let item = state
        .engine
        .update_itinerary_item(&trip_id, &item_id, payload, &caller)
        .await?;
    Ok(Json(item))
}

pub async fn delete(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path((trip_id, item_id)): Path<(String, String)>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_itinerary_item(&trip_id, &item_id, &caller)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
