use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Caller, EngineError, ResultEngine,
    expenses::{self, Expense, ExpenseNew, ExpenseUpdate},
};

use super::{Engine, with_tx};

impl Engine {
    /// Expenses of a trip, oldest first.
    pub async fn list_expenses(&self, trip_id: &str, caller: &Caller) -> ResultEngine<Vec<Expense>> {
        with_tx!(self, |db_tx| {
            self.require_trip_read(&db_tx, trip_id, caller).await?;
            self.trip_expenses(&db_tx, trip_id).await
        })
    }

    pub async fn create_expense(
        &self,
        trip_id: &str,
        new: ExpenseNew,
        caller: &Caller,
    ) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            self.require_trip_write(&db_tx, trip_id, caller).await?;
            let members = self.trip_members(&db_tx, trip_id).await?;
            let expense = Expense::build(
                Uuid::new_v4().to_string(),
                trip_id,
                new,
                &members,
                self.now(),
            )?;
            expenses::ActiveModel::from(&expense).insert(&db_tx).await?;
            tracing::debug!(trip_id, expense_id = %expense.id, amount = expense.amount, "expense created");
            Ok(expense)
        })
    }

    pub async fn update_expense(
        &self,
        trip_id: &str,
        expense_id: &str,
        update: ExpenseUpdate,
        caller: &Caller,
    ) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            self.require_trip_write(&db_tx, trip_id, caller).await?;
            let current = self.find_expense(&db_tx, trip_id, expense_id).await?;
            let members = self.trip_members(&db_tx, trip_id).await?;
            let expense = current.merged(update, &members)?;
            expenses::ActiveModel::from(&expense).update(&db_tx).await?;
            Ok(expense)
        })
    }

    pub async fn delete_expense(
        &self,
        trip_id: &str,
        expense_id: &str,
        caller: &Caller,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_trip_write(&db_tx, trip_id, caller).await?;
            let result = expenses::Entity::delete_many()
                .filter(expenses::Column::Id.eq(expense_id.to_string()))
                .filter(expenses::Column::TripId.eq(trip_id.to_string()))
                .exec(&db_tx)
                .await?;
            if result.rows_affected == 0 {
                return Err(EngineError::KeyNotFound("expense not exists".to_string()));
            }
            Ok(())
        })
    }

    pub(super) async fn trip_expenses(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
    ) -> ResultEngine<Vec<Expense>> {
        expenses::Entity::find()
            .filter(expenses::Column::TripId.eq(trip_id.to_string()))
            .order_by_asc(expenses::Column::CreatedAt)
            .order_by_asc(expenses::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(Expense::try_from)
            .collect()
    }

    async fn find_expense(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
        expense_id: &str,
    ) -> ResultEngine<Expense> {
        let model = expenses::Entity::find_by_id(expense_id.to_string())
            .filter(expenses::Column::TripId.eq(trip_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))?;
        Expense::try_from(model)
    }
}
