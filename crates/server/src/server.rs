use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, patch, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, Error as AxumError, Header, authorization::Basic},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use std::sync::Arc;

use crate::{ai, docs, expenses, itinerary, settlements, trips, user};
use engine::{Caller, EditGenerator, Engine};

static TRIP_ACCESS_HEADER: HeaderName = HeaderName::from_static("x-trip-access");
static TRIP_EDIT_HEADER: HeaderName = HeaderName::from_static("x-trip-edit");

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub db: DatabaseConnection,
    pub generator: Arc<dyn EditGenerator>,
}

/// `TypedHeader` carrying a share-link token.
///
/// Link holders without an account send "x-trip-access: <token>".
#[derive(Debug)]
pub(crate) struct TripAccess(pub String);

impl Header for TripAccess {
    fn name() -> &'static HeaderName {
        &TRIP_ACCESS_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, AxumError>
    where
        Self: Sized,
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(AxumError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(AxumError::invalid());
        };
        let value = value.trim();
        if value.is_empty() {
            return Err(AxumError::invalid());
        }

        Ok(TripAccess(value.to_string()))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        match HeaderValue::from_str(&self.0) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode x-trip-access header"),
        }
    }
}

/// `TypedHeader` for the edit flag of a link holder: "x-trip-edit: 1".
#[derive(Debug)]
struct TripEdit(bool);

impl Header for TripEdit {
    fn name() -> &'static HeaderName {
        &TRIP_EDIT_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, AxumError>
    where
        Self: Sized,
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(AxumError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(AxumError::invalid());
        };

        Ok(TripEdit(matches!(value.trim(), "1" | "true")))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        let value = if self.0 { "1" } else { "0" };
        values.extend(std::iter::once(HeaderValue::from_static(value)));
    }
}

/// Resolves the request's [`Caller`].
///
/// Basic credentials win when present and must match a user. Otherwise a
/// share-link token is required.
async fn auth(
    auth_header: Option<TypedHeader<Authorization<Basic>>>,
    access_header: Option<TypedHeader<TripAccess>>,
    edit_header: Option<TypedHeader<TripEdit>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let caller = match (auth_header, access_header) {
        (Some(TypedHeader(auth_header)), _) => {
            if auth_header.username().is_empty() || auth_header.password().is_empty() {
                return Err(StatusCode::UNAUTHORIZED);
            }

            let user: Option<user::Model> = user::Entity::find()
                .filter(user::Column::Username.eq(auth_header.username()))
                .filter(user::Column::Password.eq(auth_header.password()))
                .one(&state.db)
                .await
                .map_err(|err| {
                    tracing::error!("failed to look up user: {err}");
                    StatusCode::UNAUTHORIZED
                })?;

            let Some(user) = user else {
                tracing::debug!(username = auth_header.username(), "rejected credentials");
                return Err(StatusCode::UNAUTHORIZED);
            };
            Caller::User(user.username)
        }
        (None, Some(TypedHeader(TripAccess(token)))) => {
            let write = edit_header.is_some_and(|TypedHeader(TripEdit(write))| write);
            Caller::Link { token, write }
        }
        (None, None) => return Err(StatusCode::UNAUTHORIZED),
    };

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/api/tripsync", post(trips::create))
        .route("/api/tripsync/my", get(trips::mine))
        .route("/api/tripsync/{id}", get(trips::get).patch(trips::update))
        .route("/api/tripsync/{id}/members", post(trips::add_member))
        .route("/api/tripsync/{id}/members/link-self", post(trips::link_self))
        .route("/api/tripsync/{id}/link", get(trips::link))
        .route("/api/tripsync/{id}/rotate-link", post(trips::rotate_link))
        .route("/api/tripsync/{id}/revoke-link", post(trips::revoke_link))
        .route("/api/tripsync/{id}/link-expiry", patch(trips::link_expiry))
        .route("/api/tripsync/{id}/doc", get(docs::get).patch(docs::patch))
        .route(
            "/api/tripsync/{id}/itinerary",
            get(itinerary::list).post(itinerary::create),
        )
        .route(
            "/api/tripsync/{id}/itinerary/{item_id}",
            patch(itinerary::update).delete(itinerary::delete),
        )
        .route(
            "/api/tripsync/{id}/expenses",
            get(expenses::list).post(expenses::create),
        )
        .route(
            "/api/tripsync/{id}/expenses/{expense_id}",
            patch(expenses::update).delete(expenses::delete),
        )
        .route("/api/tripsync/{id}/balances", get(expenses::balances))
        .route(
            "/api/tripsync/{id}/settlements",
            get(settlements::list).post(settlements::create),
        )
        .route(
            "/api/tripsync/{id}/settlements/suggested",
            get(settlements::suggested),
        )
        .route(
            "/api/tripsync/{id}/settlements/{settlement_id}",
            patch(settlements::update).delete(settlements::delete),
        )
        .route("/api/tripsync/{id}/ai/propose-edits", post(ai::propose))
        .route("/api/tripsync/{id}/ai/apply-edits", post(ai::apply))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        // Public: the token in the path is the credential.
        .route("/api/tripsync/access/{token}", get(trips::preview))
        .with_state(state)
}

pub async fn run(engine: Engine, db: DatabaseConnection, generator: Arc<dyn EditGenerator>) {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, db, generator, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    db: DatabaseConnection,
    generator: Arc<dyn EditGenerator>,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        engine: Arc::new(engine),
        db,
        generator,
    };

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    db: DatabaseConnection,
    generator: Arc<dyn EditGenerator>,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, db, generator, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
