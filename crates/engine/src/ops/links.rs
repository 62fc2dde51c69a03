use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};

use crate::{
    EngineError, ResultEngine, Trip, TripLink,
    trip_links::{self, new_token},
};

use super::{Engine, with_tx};

impl Engine {
    /// Share link of a trip, created on first request. Owner only.
    pub async fn trip_link(&self, trip_id: &str, user_id: &str) -> ResultEngine<TripLink> {
        with_tx!(self, |db_tx| {
            self.require_trip_owner(&db_tx, trip_id, user_id).await?;
            self.find_or_create_link(&db_tx, trip_id).await
        })
    }

    /// Replace the token. The old token stops working immediately.
    pub async fn rotate_trip_link(&self, trip_id: &str, user_id: &str) -> ResultEngine<TripLink> {
        with_tx!(self, |db_tx| {
            self.require_trip_owner(&db_tx, trip_id, user_id).await?;
            let link = self.find_or_create_link(&db_tx, trip_id).await?;
            let mut active: trip_links::ActiveModel = (&link).into();
            active.token = ActiveValue::Set(new_token());
            active.revoked = ActiveValue::Set(false);
            let link: TripLink = active.update(&db_tx).await?.into();
            tracing::info!(trip_id, "share link rotated");
            Ok(link)
        })
    }

    pub async fn revoke_trip_link(&self, trip_id: &str, user_id: &str) -> ResultEngine<TripLink> {
        with_tx!(self, |db_tx| {
            self.require_trip_owner(&db_tx, trip_id, user_id).await?;
            let link = self.find_or_create_link(&db_tx, trip_id).await?;
            let mut active: trip_links::ActiveModel = (&link).into();
            active.revoked = ActiveValue::Set(true);
            let link: TripLink = active.update(&db_tx).await?.into();
            tracing::info!(trip_id, "share link revoked");
            Ok(link)
        })
    }

    /// Set or clear the expiry of the share link.
    pub async fn set_trip_link_expiry(
        &self,
        trip_id: &str,
        expires_at: Option<DateTime<Utc>>,
        user_id: &str,
    ) -> ResultEngine<TripLink> {
        if let Some(at) = expires_at
            && at <= self.now()
        {
            return Err(EngineError::Validation(
                "expires_at must be in the future".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            self.require_trip_owner(&db_tx, trip_id, user_id).await?;
            let link = self.find_or_create_link(&db_tx, trip_id).await?;
            let mut active: trip_links::ActiveModel = (&link).into();
            active.expires_at = ActiveValue::Set(expires_at);
            let link: TripLink = active.update(&db_tx).await?.into();
            Ok(link)
        })
    }

    /// The trip a share token opens, without authentication.
    pub async fn preview_trip_by_access(&self, token: &str) -> ResultEngine<Trip> {
        with_tx!(self, |db_tx| {
            let link: TripLink = trip_links::Entity::find()
                .filter(trip_links::Column::Token.eq(token.to_string()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("access link not exists".to_string()))?
                .into();
            if link.revoked {
                return Err(EngineError::KeyNotFound(
                    "access link not exists".to_string(),
                ));
            }
            if !link.is_valid_at(self.now()) {
                return Err(EngineError::Expired("access link expired".to_string()));
            }
            self.load_trip(&db_tx, &link.trip_id).await
        })
    }

    async fn find_or_create_link(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
    ) -> ResultEngine<TripLink> {
        if let Some(model) = trip_links::Entity::find_by_id(trip_id.to_string())
            .one(db)
            .await?
        {
            return Ok(model.into());
        }
        let link = TripLink::new(trip_id, self.now());
        trip_links::ActiveModel::from(&link).insert(db).await?;
        Ok(link)
    }
}
