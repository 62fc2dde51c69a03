use sea_orm::{
    ActiveValue, Condition, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
    sea_query::Expr,
};

use crate::{
    Caller, EngineError, Member, ResultEngine, Trip, TripLink, members, trip_links, trips,
    util::{normalize_optional_text, normalize_required_name},
};

use super::{Engine, with_tx};

impl Engine {
    /// Create a trip owned by `user_id`.
    ///
    /// The owner gets a linked member slot, the trip gets its default
    /// document and a share link.
    pub async fn create_trip(
        &self,
        name: &str,
        description: Option<&str>,
        user_id: &str,
    ) -> ResultEngine<Trip> {
        let name = normalize_required_name(name, "trip name")?;
        let now = self.now();
        let mut trip = Trip::new(name, normalize_optional_text(description), user_id, now);
        let owner = Member::new(user_id.to_string(), Some(user_id.to_string()));

        with_tx!(self, |db_tx| {
            trips::ActiveModel::from(&trip).insert(&db_tx).await?;
            members::ActiveModel::from_member(&owner, &trip.id, 0)
                .insert(&db_tx)
                .await?;
            self.insert_default_doc(&db_tx, &trip.id, &trip.name)
                .await?;
            trip_links::ActiveModel::from(&TripLink::new(&trip.id, now))
                .insert(&db_tx)
                .await?;
            Ok::<(), EngineError>(())
        })?;

        tracing::info!(trip_id = %trip.id, owner = user_id, "trip created");
        trip.members.push(owner);
        Ok(trip)
    }

    /// Trips the user owns or is linked to, oldest first.
    pub async fn my_trips(&self, user_id: &str) -> ResultEngine<Vec<Trip>> {
        with_tx!(self, |db_tx| {
            let linked: Vec<String> = members::Entity::find()
                .select_only()
                .column(members::Column::TripId)
                .filter(members::Column::UserId.eq(user_id.to_string()))
                .into_tuple()
                .all(&db_tx)
                .await?;
            let models = trips::Entity::find()
                .filter(
                    Condition::any()
                        .add(trips::Column::OwnerId.eq(user_id.to_string()))
                        .add(trips::Column::Id.is_in(linked)),
                )
                .order_by_asc(trips::Column::CreatedAt)
                .order_by_asc(trips::Column::Id)
                .all(&db_tx)
                .await?;

            let mut out = Vec::with_capacity(models.len());
            for model in models {
                let members = self.trip_members(&db_tx, &model.id).await?;
                out.push(Trip::from_model(model, members));
            }
            Ok(out)
        })
    }

    pub async fn trip(&self, trip_id: &str, caller: &Caller) -> ResultEngine<Trip> {
        with_tx!(self, |db_tx| {
            self.require_trip_read(&db_tx, trip_id, caller).await?;
            self.load_trip(&db_tx, trip_id).await
        })
    }

    /// Add an unlinked placeholder member at the end of the member list.
    pub async fn add_member(
        &self,
        trip_id: &str,
        display_name: &str,
        caller: &Caller,
    ) -> ResultEngine<Trip> {
        let display_name = normalize_required_name(display_name, "member name")?;
        let _guard = self.lock_trip(trip_id).await;
        with_tx!(self, |db_tx| {
            self.require_trip_write(&db_tx, trip_id, caller).await?;
            let count = self.trip_members(&db_tx, trip_id).await?.len();
            let position = i32::try_from(count).map_err(|_| {
                EngineError::Validation("trip has too many members".to_string())
            })?;
            let member = Member::new(display_name, None);
            members::ActiveModel::from_member(&member, trip_id, position)
                .insert(&db_tx)
                .await?;
            self.load_trip(&db_tx, trip_id).await
        })
    }

    /// Claim an unlinked member slot for `user_id`.
    ///
    /// The account needs read access to the trip, either on its own or
    /// through `access_token`. A slot is claimed at most once and an account
    /// holds at most one slot per trip.
    pub async fn link_self(
        &self,
        trip_id: &str,
        member_id: &str,
        user_id: &str,
        access_token: Option<&str>,
    ) -> ResultEngine<Trip> {
        with_tx!(self, |db_tx| {
            match (
                self.require_trip_read(&db_tx, trip_id, &Caller::user(user_id))
                    .await,
                access_token,
            ) {
                (Ok(_), _) => {}
                (Err(EngineError::Forbidden(_)), Some(token)) => {
                    self.require_trip_read(&db_tx, trip_id, &Caller::link(token, false))
                        .await?;
                }
                (Err(err), _) => return Err(err),
            }

            let members = self.trip_members(&db_tx, trip_id).await?;
            let target = members
                .iter()
                .find(|m| m.member_id == member_id)
                .ok_or_else(|| EngineError::KeyNotFound("member not exists".to_string()))?;
            if target.linked() {
                return Err(EngineError::ExistingKey(format!(
                    "member {member_id} is already linked"
                )));
            }
            if members
                .iter()
                .any(|m| m.user_id.as_deref() == Some(user_id))
            {
                return Err(EngineError::ExistingKey(format!(
                    "{user_id} is already linked to a member of this trip"
                )));
            }

            let result = members::Entity::update_many()
                .col_expr(members::Column::UserId, Expr::value(user_id.to_string()))
                .filter(members::Column::Id.eq(member_id.to_string()))
                .filter(members::Column::TripId.eq(trip_id.to_string()))
                .filter(members::Column::UserId.is_null())
                .exec(&db_tx)
                .await?;
            if result.rows_affected != 1 {
                return Err(EngineError::ExistingKey(format!(
                    "member {member_id} is already linked"
                )));
            }
            tracing::info!(trip_id, member_id, user_id, "member linked");
            self.load_trip(&db_tx, trip_id).await
        })
    }

    /// Rename a trip or change its description. Owner only.
    pub async fn update_trip(
        &self,
        trip_id: &str,
        name: Option<&str>,
        description: Option<Option<&str>>,
        user_id: &str,
    ) -> ResultEngine<Trip> {
        let name = name
            .map(|n| normalize_required_name(n, "trip name"))
            .transpose()?;
        with_tx!(self, |db_tx| {
            let model = self.require_trip_owner(&db_tx, trip_id, user_id).await?;
            let mut active: trips::ActiveModel = model.into();
            if let Some(name) = name {
                active.name = ActiveValue::Set(name);
            }
            if let Some(description) = description {
                active.description = ActiveValue::Set(normalize_optional_text(description));
            }
            active.update(&db_tx).await?;
            self.load_trip(&db_tx, trip_id).await
        })
    }
}
