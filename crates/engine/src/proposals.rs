//! AI edit proposals.
//!
//! A proposal holds the edits an [`EditGenerator`] suggested for a trip and
//! the nonce that authorises applying them once, before `expires_at`.
//!
//! ```text
//! proposed ──apply──▶ applied
//!    │
//!    └──revision moved──▶ superseded
//! ```
//! A proposal past `expires_at` is refused regardless of its status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, ResultEngine, itinerary::ItineraryItem, itinerary::ItineraryOp,
    patch::PatchOp, trip_doc::TripDoc,
};

/// Lifetime of a nonce when the engine is not configured otherwise.
pub const DEFAULT_PROPOSAL_TTL_SECONDS: i64 = 300;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Proposed,
    Applied,
    Superseded,
}

impl ProposalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Applied => "applied",
            Self::Superseded => "superseded",
        }
    }
}

impl TryFrom<&str> for ProposalStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "proposed" => Ok(Self::Proposed),
            "applied" => Ok(Self::Applied),
            "superseded" => Ok(Self::Superseded),
            other => Err(EngineError::Validation(format!(
                "invalid proposal status: {other}"
            ))),
        }
    }
}

/// What the user asked the assistant for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRequest {
    pub user_request: String,
    #[serde(default = "default_true")]
    pub edit_doc: bool,
    #[serde(default = "default_true")]
    pub edit_itinerary: bool,
}

fn default_true() -> bool {
    true
}

/// Edits returned by a generator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposedEdits {
    #[serde(default)]
    pub trip_doc_patch: Vec<PatchOp>,
    #[serde(default)]
    pub itinerary_ops: Vec<ItineraryOp>,
}

impl ProposedEdits {
    /// Drops the kinds of edits the request did not ask for.
    pub fn filtered(mut self, request: &EditRequest) -> Self {
        if !request.edit_doc {
            self.trip_doc_patch.clear();
        }
        if !request.edit_itinerary {
            self.itinerary_ops.clear();
        }
        self
    }
}

/// Source of proposed edits. Treated as a black box that may be slow or
/// fail; it is never called while a trip is locked.
#[async_trait]
pub trait EditGenerator: Send + Sync {
    async fn generate(
        &self,
        request: &EditRequest,
        doc: &TripDoc,
        items: &[ItineraryItem],
    ) -> ResultEngine<ProposedEdits>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AiProposal {
    pub nonce: String,
    pub trip_id: String,
    pub trip_doc_patch: Vec<PatchOp>,
    pub itinerary_ops: Vec<ItineraryOp>,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Result of applying a proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub new_revision: i64,
    pub updated_at: DateTime<Utc>,
    pub created_item_ids: Vec<String>,
    pub updated_item_ids: Vec<String>,
    pub deleted_item_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "ai_proposals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub nonce: String,
    pub trip_id: String,
    pub trip_doc_patch: Json,
    pub itinerary_ops: Json,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub expires_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::trips::Entity",
        from = "Column::TripId",
        to = "super::trips::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Trips,
}

impl Related<super::trips::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trips.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for AiProposal {
    type Error = EngineError;

    fn try_from(value: Model) -> Result<Self, Self::Error> {
        let trip_doc_patch = serde_json::from_value(value.trip_doc_patch)
            .map_err(|err| EngineError::Validation(format!("invalid stored patch: {err}")))?;
        let itinerary_ops = serde_json::from_value(value.itinerary_ops)
            .map_err(|err| EngineError::Validation(format!("invalid stored ops: {err}")))?;
        Ok(Self {
            status: ProposalStatus::try_from(value.status.as_str())?,
            nonce: value.nonce,
            trip_id: value.trip_id,
            trip_doc_patch,
            itinerary_ops,
            created_at: value.created_at,
            expires_at: value.expires_at,
        })
    }
}

impl TryFrom<&AiProposal> for ActiveModel {
    type Error = EngineError;

    fn try_from(value: &AiProposal) -> Result<Self, Self::Error> {
        let encode = |err: serde_json::Error| EngineError::Validation(err.to_string());
        Ok(Self {
            nonce: ActiveValue::Set(value.nonce.clone()),
            trip_id: ActiveValue::Set(value.trip_id.clone()),
            trip_doc_patch: ActiveValue::Set(
                serde_json::to_value(&value.trip_doc_patch).map_err(encode)?,
            ),
            itinerary_ops: ActiveValue::Set(
                serde_json::to_value(&value.itinerary_ops).map_err(encode)?,
            ),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            created_at: ActiveValue::Set(value.created_at),
            expires_at: ActiveValue::Set(value.expires_at),
        })
    }
}
