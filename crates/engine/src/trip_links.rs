//! Share links of a trip.
//!
//! Each trip has at most one link. Rotating replaces the token, revoking
//! keeps the row but refuses the token.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripLink {
    pub trip_id: String,
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl TripLink {
    pub fn new(trip_id: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            trip_id: trip_id.to_string(),
            token: new_token(),
            expires_at: None,
            revoked: false,
            created_at,
        }
    }

    /// A token grants access when it is not revoked and not past expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at.is_none_or(|at| now <= at)
    }
}

/// Two v4 UUIDs (244 random bits), URL-safe.
pub(crate) fn new_token() -> String {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(Uuid::new_v4().as_bytes());
    bytes[16..].copy_from_slice(Uuid::new_v4().as_bytes());
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "trip_links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub trip_id: String,
    #[sea_orm(unique)]
    pub token: String,
    pub expires_at: Option<DateTimeUtc>,
    pub revoked: bool,
    pub created_at: DateTimeUtc,
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

impl From<Model> for TripLink {
    fn from(value: Model) -> Self {
        Self {
            trip_id: value.trip_id,
            token: value.token,
            expires_at: value.expires_at,
            revoked: value.revoked,
            created_at: value.created_at,
        }
    }
}

impl From<&TripLink> for ActiveModel {
    fn from(value: &TripLink) -> Self {
        Self {
            trip_id: ActiveValue::Set(value.trip_id.clone()),
            token: ActiveValue::Set(value.token.clone()),
            expires_at: ActiveValue::Set(value.expires_at),
            revoked: ActiveValue::Set(value.revoked),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}
