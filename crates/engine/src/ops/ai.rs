use sea_orm::{DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*, sea_query::Expr};
use uuid::Uuid;

use crate::{
    AiProposal, ApplyOutcome, Caller, EditGenerator, EditRequest, EngineError, ItineraryItem,
    ItineraryOp, ProposalStatus, ProposedEdits, ResultEngine, TripDoc,
    proposals,
    trip_doc::patched_body,
};

use super::{Engine, itinerary::ItemChange, with_tx};

impl Engine {
    /// Ask `generator` for edits and park them under a fresh nonce.
    ///
    /// The generator runs outside any transaction or trip lock. Nothing of
    /// the trip is modified. Proposals that expired more than one TTL ago
    /// are purged, so a late apply still reports `Expired` in between.
    pub async fn propose_edits(
        &self,
        trip_id: &str,
        request: EditRequest,
        generator: &dyn EditGenerator,
        caller: &Caller,
    ) -> ResultEngine<AiProposal> {
        if request.user_request.trim().is_empty() {
            return Err(EngineError::Validation(
                "user_request must not be empty".to_string(),
            ));
        }
        if !request.edit_doc && !request.edit_itinerary {
            return Err(EngineError::Validation(
                "nothing to edit: both edit_doc and edit_itinerary are off".to_string(),
            ));
        }

        let (doc, items) = with_tx!(self, |db_tx| {
            self.require_trip_write(&db_tx, trip_id, caller).await?;
            let doc = self.load_or_init_doc(&db_tx, trip_id).await?;
            let items = self.itinerary_items(&db_tx, trip_id).await?;
            Ok::<_, EngineError>((doc, items))
        })?;

        let edits = generator
            .generate(&request, &doc, &items)
            .await?
            .filtered(&request);
        check_proposed_edits(trip_id, &doc, &edits)?;

        let now = self.now();
        let proposal = AiProposal {
            nonce: Uuid::new_v4().to_string(),
            trip_id: trip_id.to_string(),
            trip_doc_patch: edits.trip_doc_patch,
            itinerary_ops: edits.itinerary_ops,
            status: ProposalStatus::Proposed,
            created_at: now,
            expires_at: now + self.proposal_ttl,
        };

        let purge_before = now - self.proposal_ttl;
        let purged = with_tx!(self, |db_tx| {
            let purged = proposals::Entity::delete_many()
                .filter(proposals::Column::ExpiresAt.lt(purge_before))
                .exec(&db_tx)
                .await?;
            proposals::ActiveModel::try_from(&proposal)?
                .insert(&db_tx)
                .await?;
            Ok::<_, EngineError>(purged.rows_affected)
        })?;

        tracing::info!(
            trip_id,
            nonce = %proposal.nonce,
            doc_ops = proposal.trip_doc_patch.len(),
            itinerary_ops = proposal.itinerary_ops.len(),
            purged,
            "edits proposed"
        );
        Ok(proposal)
    }

    /// Apply a stored proposal at `client_revision`.
    ///
    /// The doc patch, every itinerary op and the nonce consumption commit
    /// together or not at all. When the revision moved since the proposal,
    /// the proposal is superseded and `Conflict` is returned.
    pub async fn apply_edits(
        &self,
        trip_id: &str,
        nonce: &str,
        client_revision: i64,
        caller: &Caller,
    ) -> ResultEngine<ApplyOutcome> {
        self.apply_proposal(trip_id, nonce, client_revision, None, caller)
            .await
    }

    /// Like [`Engine::apply_edits`], for clients that send the proposed
    /// edits back. The stored edits are applied; a mismatch is only logged.
    pub async fn apply_echoed_edits(
        &self,
        trip_id: &str,
        nonce: &str,
        client_revision: i64,
        echoed: &ProposedEdits,
        caller: &Caller,
    ) -> ResultEngine<ApplyOutcome> {
        self.apply_proposal(trip_id, nonce, client_revision, Some(echoed), caller)
            .await
    }

    async fn apply_proposal(
        &self,
        trip_id: &str,
        nonce: &str,
        client_revision: i64,
        echoed: Option<&ProposedEdits>,
        caller: &Caller,
    ) -> ResultEngine<ApplyOutcome> {
        let _guard = self.lock_trip(trip_id).await;
        let result = with_tx!(self, |db_tx| {
            self.apply_proposal_in_tx(&db_tx, trip_id, nonce, client_revision, echoed, caller)
                .await
        });

        match result {
            Err(EngineError::Conflict(reason)) => {
                self.supersede_proposal(nonce).await?;
                tracing::warn!(trip_id, nonce, %reason, "proposal superseded");
                Err(EngineError::Conflict(reason))
            }
            Ok(outcome) => {
                tracing::info!(
                    trip_id,
                    nonce,
                    revision = outcome.new_revision,
                    created = outcome.created_item_ids.len(),
                    updated = outcome.updated_item_ids.len(),
                    deleted = outcome.deleted_item_ids.len(),
                    "proposal applied"
                );
                Ok(outcome)
            }
            Err(err) => Err(err),
        }
    }

    async fn apply_proposal_in_tx(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
        nonce: &str,
        client_revision: i64,
        echoed: Option<&ProposedEdits>,
        caller: &Caller,
    ) -> ResultEngine<ApplyOutcome> {
        self.require_trip_write(db, trip_id, caller).await?;

        let proposal = self.find_proposal(db, trip_id, nonce).await?;
        match proposal.status {
            ProposalStatus::Proposed => {}
            ProposalStatus::Applied => {
                return Err(EngineError::AlreadyUsed(format!(
                    "nonce {nonce} was already applied"
                )));
            }
            ProposalStatus::Superseded => {
                return Err(EngineError::AlreadyUsed(format!(
                    "nonce {nonce} was superseded, propose again"
                )));
            }
        }
        if self.now() > proposal.expires_at {
            return Err(EngineError::Expired(format!(
                "nonce {nonce} expired at {}",
                proposal.expires_at
            )));
        }
        if let Some(echoed) = echoed
            && (echoed.trip_doc_patch != proposal.trip_doc_patch
                || echoed.itinerary_ops != proposal.itinerary_ops)
        {
            tracing::warn!(
                trip_id,
                nonce,
                "resent edits differ from the proposal, applying the stored edits"
            );
        }

        let doc = self.load_or_init_doc(db, trip_id).await?;
        let commit = self
            .commit_doc_patch(db, &doc, client_revision, &proposal.trip_doc_patch)
            .await?;

        let mut outcome = ApplyOutcome {
            new_revision: commit.revision,
            updated_at: commit.updated_at,
            created_item_ids: Vec::new(),
            updated_item_ids: Vec::new(),
            deleted_item_ids: Vec::new(),
        };
        for op in proposal.itinerary_ops {
            match self.apply_itinerary_op(db, trip_id, op).await? {
                ItemChange::Created(id) => outcome.created_item_ids.push(id),
                ItemChange::Updated(id) => outcome.updated_item_ids.push(id),
                ItemChange::Deleted(id) => outcome.deleted_item_ids.push(id),
            }
        }

        let consumed = proposals::Entity::update_many()
            .col_expr(
                proposals::Column::Status,
                Expr::value(ProposalStatus::Applied.as_str()),
            )
            .filter(proposals::Column::Nonce.eq(nonce.to_string()))
            .filter(proposals::Column::Status.eq(ProposalStatus::Proposed.as_str()))
            .exec(db)
            .await?;
        if consumed.rows_affected != 1 {
            return Err(EngineError::AlreadyUsed(format!(
                "nonce {nonce} was already applied"
            )));
        }

        Ok(outcome)
    }

    async fn find_proposal(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
        nonce: &str,
    ) -> ResultEngine<AiProposal> {
        let model = proposals::Entity::find_by_id(nonce.to_string())
            .filter(proposals::Column::TripId.eq(trip_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("nonce not exists".to_string()))?;
        AiProposal::try_from(model)
    }

    async fn supersede_proposal(&self, nonce: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            proposals::Entity::update_many()
                .col_expr(
                    proposals::Column::Status,
                    Expr::value(ProposalStatus::Superseded.as_str()),
                )
                .filter(proposals::Column::Nonce.eq(nonce.to_string()))
                .filter(proposals::Column::Status.eq(ProposalStatus::Proposed.as_str()))
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }
}

/// Generator output must make sense against the snapshot it was given.
fn check_proposed_edits(trip_id: &str, doc: &TripDoc, edits: &ProposedEdits) -> ResultEngine<()> {
    let invalid = |err: EngineError| {
        EngineError::Generator(format!("generator returned invalid edits: {err}"))
    };

    patched_body(doc, &edits.trip_doc_patch).map_err(invalid)?;

    for op in &edits.itinerary_ops {
        match op {
            ItineraryOp::Create { item } => {
                ItineraryItem::build(String::new(), trip_id, item.clone()).map_err(invalid)?;
            }
            ItineraryOp::Update { id, .. } | ItineraryOp::Delete { id } => {
                if id.trim().is_empty() {
                    return Err(invalid(EngineError::Validation(
                        "itinerary op without item id".to_string(),
                    )));
                }
            }
        }
    }
    Ok(())
}
