use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Caller, EngineError, ResultEngine,
    itinerary::{self, ItineraryItem, ItineraryItemNew, ItineraryItemUpdate, ItineraryOp},
};

use super::{Engine, with_tx};

/// Which item an itinerary op touched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum ItemChange {
    Created(String),
    Updated(String),
    Deleted(String),
}

impl Engine {
    /// Items ordered by start time.
    pub async fn list_itinerary(
        &self,
        trip_id: &str,
        caller: &Caller,
    ) -> ResultEngine<Vec<ItineraryItem>> {
        with_tx!(self, |db_tx| {
            self.require_trip_read(&db_tx, trip_id, caller).await?;
            self.itinerary_items(&db_tx, trip_id).await
        })
    }

    pub async fn create_itinerary_item(
        &self,
        trip_id: &str,
        new: ItineraryItemNew,
        caller: &Caller,
    ) -> ResultEngine<ItineraryItem> {
        with_tx!(self, |db_tx| {
            self.require_trip_write(&db_tx, trip_id, caller).await?;
            self.insert_itinerary_item(&db_tx, trip_id, new).await
        })
    }

    pub async fn update_itinerary_item(
        &self,
        trip_id: &str,
        item_id: &str,
        update: ItineraryItemUpdate,
        caller: &Caller,
    ) -> ResultEngine<ItineraryItem> {
        with_tx!(self, |db_tx| {
            self.require_trip_write(&db_tx, trip_id, caller).await?;
            self.write_itinerary_update(&db_tx, trip_id, item_id, update)
                .await
        })
    }

    pub async fn delete_itinerary_item(
        &self,
        trip_id: &str,
        item_id: &str,
        caller: &Caller,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_trip_write(&db_tx, trip_id, caller).await?;
            self.remove_itinerary_item(&db_tx, trip_id, item_id).await
        })
    }

    pub(super) async fn itinerary_items(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
    ) -> ResultEngine<Vec<ItineraryItem>> {
        let models = itinerary::Entity::find()
            .filter(itinerary::Column::TripId.eq(trip_id.to_string()))
            .order_by_asc(itinerary::Column::StartTime)
            .order_by_asc(itinerary::Column::Id)
            .all(db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    /// Apply one op inside the caller's transaction.
    pub(super) async fn apply_itinerary_op(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
        op: ItineraryOp,
    ) -> ResultEngine<ItemChange> {
        match op {
            ItineraryOp::Create { item } => {
                let created = self.insert_itinerary_item(db, trip_id, item).await?;
                Ok(ItemChange::Created(created.id))
            }
            ItineraryOp::Update { id, patch } => {
                let updated = self.write_itinerary_update(db, trip_id, &id, patch).await?;
                Ok(ItemChange::Updated(updated.id))
            }
            ItineraryOp::Delete { id } => {
                self.remove_itinerary_item(db, trip_id, &id).await?;
                Ok(ItemChange::Deleted(id))
            }
        }
    }

    async fn find_itinerary_item(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
        item_id: &str,
    ) -> ResultEngine<itinerary::Model> {
        itinerary::Entity::find_by_id(item_id.to_string())
            .filter(itinerary::Column::TripId.eq(trip_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("itinerary item not exists".to_string()))
    }

    async fn insert_itinerary_item(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
        new: ItineraryItemNew,
    ) -> ResultEngine<ItineraryItem> {
        let item = ItineraryItem::build(Uuid::new_v4().to_string(), trip_id, new)?;
        itinerary::ActiveModel::from(&item).insert(db).await?;
        Ok(item)
    }

    async fn write_itinerary_update(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
        item_id: &str,
        update: ItineraryItemUpdate,
    ) -> ResultEngine<ItineraryItem> {
        let current: ItineraryItem = self
            .find_itinerary_item(db, trip_id, item_id)
            .await?
            .into();
        if update.is_empty() {
            return Ok(current);
        }
        let item = current.merged(update)?;
        itinerary::ActiveModel::from(&item).update(db).await?;
        Ok(item)
    }

    async fn remove_itinerary_item(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
        item_id: &str,
    ) -> ResultEngine<()> {
        let result = itinerary::Entity::delete_many()
            .filter(itinerary::Column::Id.eq(item_id.to_string()))
            .filter(itinerary::Column::TripId.eq(trip_id.to_string()))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::KeyNotFound(
                "itinerary item not exists".to_string(),
            ));
        }
        Ok(())
    }
}
