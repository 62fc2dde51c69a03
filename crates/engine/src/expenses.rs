//! Expenses record one payment made by a member on behalf of a group of
//! members. The amount is split equally among `split_with_member_ids`.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine, members::Member, util::double_option};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub trip_id: String,
    pub description: String,
    pub amount: f64,
    pub paid_by_member_id: String,
    pub split_with_member_ids: Vec<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseNew {
    pub description: String,
    pub amount: f64,
    pub paid_by_member_id: String,
    pub split_with_member_ids: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseUpdate {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub paid_by_member_id: Option<String>,
    #[serde(default)]
    pub split_with_member_ids: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
}

impl Expense {
    /// Validates an expense against the trip's members.
    pub fn build(
        id: String,
        trip_id: &str,
        new: ExpenseNew,
        members: &[Member],
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        let description = new.description.trim();
        if description.is_empty() {
            return Err(EngineError::Validation(
                "expense description must not be empty".to_string(),
            ));
        }
        crate::util::validate_amount(new.amount)?;
        if !members.iter().any(|m| m.member_id == new.paid_by_member_id) {
            return Err(EngineError::Validation(format!(
                "paid_by_member_id {} is not a member of the trip",
                new.paid_by_member_id
            )));
        }

        let mut split: Vec<String> = Vec::with_capacity(new.split_with_member_ids.len());
        for member_id in new.split_with_member_ids {
            if !members.iter().any(|m| m.member_id == member_id) {
                return Err(EngineError::Validation(format!(
                    "split member {member_id} is not a member of the trip"
                )));
            }
            if !split.contains(&member_id) {
                split.push(member_id);
            }
        }
        if split.is_empty() {
            return Err(EngineError::Validation(
                "split_with_member_ids must not be empty".to_string(),
            ));
        }

        Ok(Self {
            id,
            trip_id: trip_id.to_string(),
            description: description.to_string(),
            amount: new.amount,
            paid_by_member_id: new.paid_by_member_id,
            split_with_member_ids: split,
            category: new
                .category
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            created_at,
        })
    }

    pub fn merged(&self, update: ExpenseUpdate, members: &[Member]) -> ResultEngine<Self> {
        let draft = ExpenseNew {
            description: update
                .description
                .unwrap_or_else(|| self.description.clone()),
            amount: update.amount.unwrap_or(self.amount),
            paid_by_member_id: update
                .paid_by_member_id
                .unwrap_or_else(|| self.paid_by_member_id.clone()),
            split_with_member_ids: update
                .split_with_member_ids
                .unwrap_or_else(|| self.split_with_member_ids.clone()),
            category: update.category.unwrap_or_else(|| self.category.clone()),
        };
        Self::build(
            self.id.clone(),
            &self.trip_id,
            draft,
            members,
            self.created_at,
        )
    }

    /// Equal share of one split member.
    pub fn share(&self) -> f64 {
        self.amount / self.split_with_member_ids.len() as f64
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub trip_id: String,
    pub description: String,
    pub amount: f64,
    pub paid_by_member_id: String,
    pub split_with: Json,
    pub category: Option<String>,
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

impl TryFrom<Model> for Expense {
    type Error = EngineError;

    fn try_from(value: Model) -> Result<Self, Self::Error> {
        let split_with_member_ids: Vec<String> = serde_json::from_value(value.split_with)
            .map_err(|err| EngineError::Validation(format!("invalid stored split: {err}")))?;
        Ok(Self {
            id: value.id,
            trip_id: value.trip_id,
            description: value.description,
            amount: value.amount,
            paid_by_member_id: value.paid_by_member_id,
            split_with_member_ids,
            category: value.category,
            created_at: value.created_at,
        })
    }
}

impl From<&Expense> for ActiveModel {
    fn from(value: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(value.id.clone()),
            trip_id: ActiveValue::Set(value.trip_id.clone()),
            description: ActiveValue::Set(value.description.clone()),
            amount: ActiveValue::Set(value.amount),
            paid_by_member_id: ActiveValue::Set(value.paid_by_member_id.clone()),
            split_with: ActiveValue::Set(serde_json::Value::from(
                value.split_with_member_ids.clone(),
            )),
            category: ActiveValue::Set(value.category.clone()),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}
