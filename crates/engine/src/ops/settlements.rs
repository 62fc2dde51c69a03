use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Caller, EngineError, ResultEngine,
    settlements::{self, Settlement, SettlementNew, SettlementUpdate},
};

use super::{Engine, with_tx};

impl Engine {
    pub async fn list_settlements(
        &self,
        trip_id: &str,
        caller: &Caller,
    ) -> ResultEngine<Vec<Settlement>> {
        with_tx!(self, |db_tx| {
            self.require_trip_read(&db_tx, trip_id, caller).await?;
            self.trip_settlements(&db_tx, trip_id).await
        })
    }

    /// Record a payment between two members.
    pub async fn create_settlement(
        &self,
        trip_id: &str,
        new: SettlementNew,
        caller: &Caller,
    ) -> ResultEngine<Settlement> {
        with_tx!(self, |db_tx| {
            self.require_trip_write(&db_tx, trip_id, caller).await?;
            let members = self.trip_members(&db_tx, trip_id).await?;
            let settlement = Settlement::build(
                Uuid::new_v4().to_string(),
                trip_id,
                new,
                &members,
                self.now(),
            )?;
            settlements::ActiveModel::from(&settlement)
                .insert(&db_tx)
                .await?;
            Ok(settlement)
        })
    }

    pub async fn update_settlement(
        &self,
        trip_id: &str,
        settlement_id: &str,
        update: SettlementUpdate,
        caller: &Caller,
    ) -> ResultEngine<Settlement> {
        with_tx!(self, |db_tx| {
            self.require_trip_write(&db_tx, trip_id, caller).await?;
            let model = settlements::Entity::find_by_id(settlement_id.to_string())
                .filter(settlements::Column::TripId.eq(trip_id.to_string()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("settlement not exists".to_string()))?;
            let members = self.trip_members(&db_tx, trip_id).await?;
            let settlement = Settlement::try_from(model)?.merged(update, &members)?;
            settlements::ActiveModel::from(&settlement)
                .update(&db_tx)
                .await?;
            Ok(settlement)
        })
    }

    pub async fn delete_settlement(
        &self,
        trip_id: &str,
        settlement_id: &str,
        caller: &Caller,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_trip_write(&db_tx, trip_id, caller).await?;
            let result = settlements::Entity::delete_many()
                .filter(settlements::Column::Id.eq(settlement_id.to_string()))
                .filter(settlements::Column::TripId.eq(trip_id.to_string()))
                .exec(&db_tx)
                .await?;
            if result.rows_affected == 0 {
                return Err(EngineError::KeyNotFound(
                    "settlement not exists".to_string(),
                ));
            }
            Ok(())
        })
    }

    pub(super) async fn trip_settlements(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
    ) -> ResultEngine<Vec<Settlement>> {
        settlements::Entity::find()
            .filter(settlements::Column::TripId.eq(trip_id.to_string()))
            .order_by_asc(settlements::Column::CreatedAt)
            .order_by_asc(settlements::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(Settlement::try_from)
            .collect()
    }
}
