//! Settlements record an out-of-band payment from a payer to a payee that
//! reduces the payer's debt.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine, members::Member, util::double_option};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementMode {
    Cash,
    Upi,
    Card,
}

impl SettlementMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Upi => "upi",
            Self::Card => "card",
        }
    }
}

impl TryFrom<&str> for SettlementMode {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "cash" => Ok(Self::Cash),
            "upi" => Ok(Self::Upi),
            "card" => Ok(Self::Card),
            other => Err(EngineError::Validation(format!(
                "invalid settlement mode: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: String,
    pub trip_id: String,
    pub payer_member_id: String,
    pub payee_member_id: String,
    pub amount: f64,
    pub mode: SettlementMode,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SettlementNew {
    pub payer_member_id: String,
    pub payee_member_id: String,
    pub amount: f64,
    pub mode: SettlementMode,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SettlementUpdate {
    #[serde(default)]
    pub payer_member_id: Option<String>,
    #[serde(default)]
    pub payee_member_id: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub mode: Option<SettlementMode>,
    #[serde(default, deserialize_with = "double_option")]
    pub note: Option<Option<String>>,
}

impl Settlement {
    pub fn build(
        id: String,
        trip_id: &str,
        new: SettlementNew,
        members: &[Member],
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        crate::util::validate_amount(new.amount)?;
        for (label, member_id) in [
            ("payer_member_id", &new.payer_member_id),
            ("payee_member_id", &new.payee_member_id),
        ] {
            if !members.iter().any(|m| &m.member_id == member_id) {
                return Err(EngineError::Validation(format!(
                    "{label} {member_id} is not a member of the trip"
                )));
            }
        }
        if new.payer_member_id == new.payee_member_id {
            return Err(EngineError::Validation(
                "payer and payee must be different members".to_string(),
            ));
        }
        Ok(Self {
            id,
            trip_id: trip_id.to_string(),
            payer_member_id: new.payer_member_id,
            payee_member_id: new.payee_member_id,
            amount: new.amount,
            mode: new.mode,
            note: new
                .note
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            created_at,
        })
    }

    pub fn merged(&self, update: SettlementUpdate, members: &[Member]) -> ResultEngine<Self> {
        let draft = SettlementNew {
            payer_member_id: update
                .payer_member_id
                .unwrap_or_else(|| self.payer_member_id.clone()),
            payee_member_id: update
                .payee_member_id
                .unwrap_or_else(|| self.payee_member_id.clone()),
            amount: update.amount.unwrap_or(self.amount),
            mode: update.mode.unwrap_or(self.mode),
            note: update.note.unwrap_or_else(|| self.note.clone()),
        };
        Self::build(
            self.id.clone(),
            &self.trip_id,
            draft,
            members,
            self.created_at,
        )
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "settlements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub trip_id: String,
    pub payer_member_id: String,
    pub payee_member_id: String,
    pub amount: f64,
    pub mode: String,
    pub note: Option<String>,
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

impl TryFrom<Model> for Settlement {
    type Error = EngineError;

    fn try_from(value: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            mode: SettlementMode::try_from(value.mode.as_str())?,
            id: value.id,
            trip_id: value.trip_id,
            payer_member_id: value.payer_member_id,
            payee_member_id: value.payee_member_id,
            amount: value.amount,
            note: value.note,
            created_at: value.created_at,
        })
    }
}

impl From<&Settlement> for ActiveModel {
    fn from(value: &Settlement) -> Self {
        Self {
            id: ActiveValue::Set(value.id.clone()),
            trip_id: ActiveValue::Set(value.trip_id.clone()),
            payer_member_id: ActiveValue::Set(value.payer_member_id.clone()),
            payee_member_id: ActiveValue::Set(value.payee_member_id.clone()),
            amount: ActiveValue::Set(value.amount),
            mode: ActiveValue::Set(value.mode.as_str().to_string()),
            note: ActiveValue::Set(value.note.clone()),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}
