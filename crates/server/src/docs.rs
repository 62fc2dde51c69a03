//! Trip document endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde_json::Value;

use api_types::doc::{DocCommitted, DocPatch};
use engine::{Caller, EngineError, PatchOp};

use crate::{ServerError, server::ServerState};

/// Parses RFC 6902 operations; a malformed one rejects the whole patch.
pub(crate) fn parse_patch(patch: Vec<Value>) -> Result<Vec<PatchOp>, EngineError> {
    patch
        .into_iter()
        .enumerate()
        .map(|(index, op)| {
            serde_json::from_value(op).map_err(|err| {
                EngineError::Validation(format!("patch operation {index} is malformed: {err}"))
            })
        })
        .collect()
}

pub async fn get(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let doc = state.engine.trip_doc(&trip_id, &caller).await?;
    Ok(Json(doc.to_json()))
}

pub async fn patch(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
    Json(payload): Json<DocPatch>,
) -> Result<Json<DocCommitted>, ServerError> {
    let ops = parse_patch(payload.patch)?;
    let commit = state
        .engine
        .patch_trip_doc(&trip_id, payload.client_revision, &ops, &caller)
        .await?;
    Ok(Json(DocCommitted {
        revision: commit.revision,
        updated_at: commit.updated_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_operations() {
        let ops = parse_patch(vec![
            json!({"op": "replace", "path": "/shared_notes", "value": "hi"}),
            json!({"op": "remove", "path": "/lodgings/0"}),
        ])
        .unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1].path(), "/lodgings/0");
    }

    #[test]
    fn unknown_operation_is_a_validation_error() {
        let err = parse_patch(vec![json!({"op": "merge", "path": "/title"})]).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
