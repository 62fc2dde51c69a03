//! Two-phase AI edits: propose, then apply by nonce.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Serialize;
use serde_json::Value;

use api_types::ai::{EditsApplied, EditsApply, EditsPropose, EditsProposed};
use engine::{ApplyOutcome, Caller, EditRequest, ItineraryOp, ProposedEdits};

use crate::{ServerError, docs::parse_patch, server::ServerState};

fn to_values<T: Serialize>(items: &[T]) -> Result<Vec<Value>, ServerError> {
    items
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()
        .map_err(|err| {
            tracing::error!("failed to encode proposed edits: {err}");
            ServerError::Generic("failed to encode proposed edits".to_string())
        })
}

/// The ops a client sent back with the nonce, when they parse.
fn echoed_edits(payload: &EditsApply) -> Option<ProposedEdits> {
    if payload.trip_doc_patch.is_empty() && payload.itinerary_ops.is_empty() {
        return None;
    }

    let trip_doc_patch = parse_patch(payload.trip_doc_patch.clone()).ok()?;
    let itinerary_ops = payload
        .itinerary_ops
        .iter()
        .cloned()
        .map(serde_json::from_value::<ItineraryOp>)
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    Some(ProposedEdits {
        trip_doc_patch,
        itinerary_ops,
    })
}

pub async fn propose(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
    Json(payload): Json<EditsPropose>,
) -> Result<Json<EditsProposed>, ServerError> {
    let request = EditRequest {
        user_request: payload.user_request,
        edit_doc: payload.edit_doc,
        edit_itinerary: payload.edit_itinerary,
    };
    let proposal = state
        .engine
        .propose_edits(&trip_id, request, state.generator.as_ref(), &caller)
        .await?;

    Ok(Json(EditsProposed {
        trip_doc_patch: to_values(&proposal.trip_doc_patch)?,
        itinerary_ops: to_values(&proposal.itinerary_ops)?,
        nonce: proposal.nonce,
        nonce_expires_at: proposal.expires_at,
    }))
}

pub async fn apply(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
    Json(payload): Json<EditsApply>,
) -> Result<Json<EditsApplied>, ServerError> {
    let outcome: ApplyOutcome = match echoed_edits(&payload) {
        Some(echoed) => {
            state
                .engine
                .apply_echoed_edits(
                    &trip_id,
                    &payload.nonce,
                    payload.client_revision,
                    &echoed,
                    &caller,
                )
                .await?
        }
        None => {
            if !payload.trip_doc_patch.is_empty() || !payload.itinerary_ops.is_empty() {
                tracing::warn!(
                    trip_id = %trip_id,
                    nonce = %payload.nonce,
                    "ignoring unreadable echoed edits"
                );
            }
            state
                .engine
                .apply_edits(&trip_id, &payload.nonce, payload.client_revision, &caller)
                .await?
        }
    };

    Ok(Json(EditsApplied {
        new_revision: outcome.new_revision,
        updated_at: outcome.updated_at,
        created_item_ids: outcome.created_item_ids,
        updated_item_ids: outcome.updated_item_ids,
        deleted_item_ids: outcome.deleted_item_ids,
    }))
}
