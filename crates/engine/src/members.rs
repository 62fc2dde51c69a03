//! Trip members.
//!
//! A member slot is created either for the trip owner or as an unlinked
//! placeholder. An authenticated account can claim a placeholder exactly once,
//! after which the slot is `linked`.

use sea_orm::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub member_id: String,
    pub display_name: String,
    /// Username of the account that claimed this slot.
    pub user_id: Option<String>,
}

impl Member {
    pub fn new(display_name: String, user_id: Option<String>) -> Self {
        Self {
            member_id: Uuid::new_v4().to_string(),
            display_name,
            user_id,
        }
    }

    pub fn linked(&self) -> bool {
        self.user_id.is_some()
    }
}

impl From<Model> for Member {
    fn from(value: Model) -> Self {
        Self {
            member_id: value.id,
            display_name: value.display_name,
            user_id: value.user_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "trip_members")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub trip_id: String,
    pub display_name: String,
    pub user_id: Option<String>,
    pub position: i32,
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

impl ActiveModel {
    pub(crate) fn from_member(member: &Member, trip_id: &str, position: i32) -> Self {
        Self {
            id: ActiveValue::Set(member.member_id.clone()),
            trip_id: ActiveValue::Set(trip_id.to_string()),
            display_name: ActiveValue::Set(member.display_name.clone()),
            user_id: ActiveValue::Set(member.user_id.clone()),
            position: ActiveValue::Set(position),
        }
    }
}
