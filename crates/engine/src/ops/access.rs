use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};

use crate::{
    AccessGate, Caller, Capability, EngineError, ResultEngine, Trip, TripLink,
    members, trip_links, trips,
};

use super::Engine;

/// Default gate: owners and linked members may read and write, share-link
/// holders may read and, with the edit flag, write.
#[derive(Clone, Copy, Debug, Default)]
pub struct TripAccessGate;

impl TripAccessGate {
    async fn resolve(
        db: &DatabaseTransaction,
        trip_id: &str,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> ResultEngine<Option<Capability>> {
        let trip = trips::Entity::find_by_id(trip_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("trip not exists".to_string()))?;

        match caller {
            Caller::User(user_id) => {
                if &trip.owner_id == user_id {
                    return Ok(Some(Capability::Owner {
                        user_id: user_id.clone(),
                    }));
                }
                let linked = members::Entity::find()
                    .filter(members::Column::TripId.eq(trip_id.to_string()))
                    .filter(members::Column::UserId.eq(user_id.clone()))
                    .one(db)
                    .await?
                    .is_some();
                Ok(linked.then(|| Capability::Member {
                    user_id: user_id.clone(),
                }))
            }
            Caller::Link { token, write } => {
                let Some(model) = trip_links::Entity::find_by_id(trip_id.to_string())
                    .one(db)
                    .await?
                else {
                    return Ok(None);
                };
                let link = TripLink::from(model);
                if &link.token != token || !link.is_valid_at(now) {
                    return Ok(None);
                }
                Ok(Some(Capability::Link {
                    token: token.clone(),
                    write: *write,
                }))
            }
        }
    }
}

#[async_trait]
impl AccessGate for TripAccessGate {
    async fn may_read(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> ResultEngine<Capability> {
        Self::resolve(db, trip_id, caller, now)
            .await?
            .ok_or_else(|| EngineError::Forbidden("no access to this trip".to_string()))
    }

    async fn may_mutate(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> ResultEngine<Capability> {
        match Self::resolve(db, trip_id, caller, now).await? {
            Some(capability) if capability.can_mutate() => Ok(capability),
            Some(_) => Err(EngineError::Forbidden(
                "read-only access to this trip".to_string(),
            )),
            None => Err(EngineError::Forbidden("no access to this trip".to_string())),
        }
    }
}

impl Engine {
    pub(super) async fn require_trip_read(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
        caller: &Caller,
    ) -> ResultEngine<Capability> {
        self.gate.may_read(db, trip_id, caller, self.now()).await
    }

    pub(super) async fn require_trip_write(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
        caller: &Caller,
    ) -> ResultEngine<Capability> {
        let capability = self.gate.may_mutate(db, trip_id, caller, self.now()).await;
        if let Err(EngineError::Forbidden(reason)) = &capability {
            tracing::debug!(trip_id, %reason, "mutation refused");
        }
        capability
    }

    /// Owner-only operations (share link management).
    pub(super) async fn require_trip_owner(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
        user_id: &str,
    ) -> ResultEngine<trips::Model> {
        let model = self.find_trip(db, trip_id).await?;
        if model.owner_id != user_id {
            return Err(EngineError::Forbidden(
                "only the trip owner can do this".to_string(),
            ));
        }
        Ok(model)
    }

    pub(super) async fn find_trip(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
    ) -> ResultEngine<trips::Model> {
        trips::Entity::find_by_id(trip_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("trip not exists".to_string()))
    }

    pub(super) async fn trip_members(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
    ) -> ResultEngine<Vec<crate::Member>> {
        let models = members::Entity::find()
            .filter(members::Column::TripId.eq(trip_id.to_string()))
            .order_by_asc(members::Column::Position)
            .all(db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    pub(super) async fn load_trip(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
    ) -> ResultEngine<Trip> {
        let model = self.find_trip(db, trip_id).await?;
        let members = self.trip_members(db, trip_id).await?;
        Ok(Trip::from_model(model, members))
    }
}
