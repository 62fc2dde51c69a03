use chrono::{DateTime, Utc};
use sea_orm::{DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use crate::{
    Caller, EngineError, ResultEngine, TripDoc,
    patch::PatchOp,
    trip_doc::{self, INITIAL_REVISION, default_body, patched_body, validate_body},
};

use super::{Engine, with_tx};

/// Revision and commit time of an accepted patch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocCommit {
    pub revision: i64,
    pub updated_at: DateTime<Utc>,
}

impl Engine {
    /// Current document of a trip.
    pub async fn trip_doc(&self, trip_id: &str, caller: &Caller) -> ResultEngine<TripDoc> {
        with_tx!(self, |db_tx| {
            self.require_trip_read(&db_tx, trip_id, caller).await?;
            self.load_or_init_doc(&db_tx, trip_id).await
        })
    }

    /// Apply a JSON Patch to the document at `client_revision`.
    ///
    /// The patch is all or nothing. A stale `client_revision` returns
    /// `Conflict` and leaves the document untouched.
    pub async fn patch_trip_doc(
        &self,
        trip_id: &str,
        client_revision: i64,
        ops: &[PatchOp],
        caller: &Caller,
    ) -> ResultEngine<DocCommit> {
        let _guard = self.lock_trip(trip_id).await;
        with_tx!(self, |db_tx| {
            self.require_trip_write(&db_tx, trip_id, caller).await?;
            let doc = self.load_or_init_doc(&db_tx, trip_id).await?;
            let commit = self
                .commit_doc_patch(&db_tx, &doc, client_revision, ops)
                .await?;
            tracing::info!(
                trip_id,
                revision = commit.revision,
                ops = ops.len(),
                "trip doc patched"
            );
            Ok(commit)
        })
    }

    /// Load the doc row, creating the default document when the trip has
    /// none yet.
    pub(super) async fn load_or_init_doc(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
    ) -> ResultEngine<TripDoc> {
        if let Some(model) = trip_doc::Entity::find_by_id(trip_id.to_string())
            .one(db)
            .await?
        {
            return TripDoc::try_from(model);
        }
        let trip = self.find_trip(db, trip_id).await?;
        let doc = self.insert_default_doc(db, trip_id, &trip.name).await?;
        tracing::debug!(trip_id, "default trip doc created");
        Ok(doc)
    }

    pub(super) async fn insert_default_doc(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
        title: &str,
    ) -> ResultEngine<TripDoc> {
        let doc = TripDoc {
            trip_id: trip_id.to_string(),
            revision: INITIAL_REVISION,
            updated_at: self.now(),
            body: validate_body(default_body(title))?,
        };
        trip_doc::ActiveModel::from(&doc).insert(db).await?;
        Ok(doc)
    }

    /// Revision check, patch and conditional write of the new body.
    ///
    /// The caller holds the trip lock and owns the transaction.
    pub(super) async fn commit_doc_patch(
        &self,
        db: &DatabaseTransaction,
        doc: &TripDoc,
        client_revision: i64,
        ops: &[PatchOp],
    ) -> ResultEngine<DocCommit> {
        if client_revision != doc.revision {
            return Err(stale_revision(client_revision, doc.revision));
        }
        let next = TripDoc {
            trip_id: doc.trip_id.clone(),
            revision: doc.revision + 1,
            updated_at: self.now(),
            body: patched_body(doc, ops)?,
        };

        let result = trip_doc::Entity::update_many()
            .set(trip_doc::ActiveModel::from(&next))
            .filter(trip_doc::Column::TripId.eq(doc.trip_id.clone()))
            .filter(trip_doc::Column::Revision.eq(client_revision))
            .exec(db)
            .await?;
        if result.rows_affected != 1 {
            return Err(EngineError::Conflict(format!(
                "trip doc changed while writing revision {}",
                next.revision
            )));
        }

        Ok(DocCommit {
            revision: next.revision,
            updated_at: next.updated_at,
        })
    }
}

pub(super) fn stale_revision(client_revision: i64, current: i64) -> EngineError {
    EngineError::Conflict(format!(
        "client revision {client_revision} does not match current revision {current}"
    ))
}
