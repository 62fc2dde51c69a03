//! Trips, members and share links.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::TypedHeader;

use api_types::trip::{LinkExpiry, LinkSelf, MemberNew, TripLinkView, TripNew, TripUpdate};
use engine::{Caller, Trip, TripLink};

use crate::{
    ServerError,
    server::{ServerState, TripAccess},
};

/// Routes managing trips and links need an account, not a link token.
fn account(caller: &Caller) -> Result<&str, ServerError> {
    caller.username().ok_or(ServerError::Unauthorized)
}

fn link_view(link: TripLink) -> TripLinkView {
    TripLinkView {
        token: link.token,
        expires_at: link.expires_at,
        revoked: link.revoked,
    }
}

pub async fn create(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Json(payload): Json<TripNew>,
) -> Result<(StatusCode, Json<Trip>), ServerError> {
    let user_id = account(&caller)?;
    let trip = state
        .engine
        .create_trip(&payload.name, payload.description.as_deref(), user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

pub async fn mine(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<Trip>>, ServerError> {
    let user_id = account(&caller)?;
    Ok(Json(state.engine.my_trips(user_id).await?))
}

pub async fn get(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
) -> Result<Json<Trip>, ServerError> {
    Ok(Json(state.engine.trip(&trip_id, &caller).await?))
}

pub async fn update(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
    Json(payload): Json<TripUpdate>,
) -> Result<Json<Trip>, ServerError> {
    let user_id = account(&caller)?;
    if payload.name.is_none() && payload.description.is_none() {
        return Err(ServerError::Generic(
            "provide at least one of name or description".to_string(),
        ));
    }

    let description = payload
        .description
        .as_ref()
        .map(|description| description.as_deref());
    let trip = state
        .engine
        .update_trip(&trip_id, payload.name.as_deref(), description, user_id)
        .await?;
    Ok(Json(trip))
}

pub async fn add_member(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
    Json(payload): Json<MemberNew>,
) -> Result<(StatusCode, Json<Trip>), ServerError> {
    let trip = state
        .engine
        .add_member(&trip_id, &payload.display_name, &caller)
        .await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

pub async fn link_self(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
    access_header: Option<TypedHeader<TripAccess>>,
    Json(payload): Json<LinkSelf>,
) -> Result<Json<Trip>, ServerError> {
    let user_id = account(&caller)?;
    let token = payload
        .access_token
        .or_else(|| access_header.map(|TypedHeader(TripAccess(token))| token));
    let trip = state
        .engine
        .link_self(&trip_id, &payload.member_id, user_id, token.as_deref())
        .await?;
    Ok(Json(trip))
}

pub async fn link(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
) -> Result<Json<TripLinkView>, ServerError> {
    let user_id = account(&caller)?;
    let link = state.engine.trip_link(&trip_id, user_id).await?;
    Ok(Json(link_view(link)))
}

pub async fn rotate_link(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
) -> Result<Json<TripLinkView>, ServerError> {
    let user_id = account(&caller)?;
    let link = state.engine.rotate_trip_link(&trip_id, user_id).await?;
    Ok(Json(link_view(link)))
}

pub async fn revoke_link(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
) -> Result<Json<TripLinkView>, ServerError> {
    let user_id = account(&caller)?;
    let link = state.engine.revoke_trip_link(&trip_id, user_id).await?;
    Ok(Json(link_view(link)))
}

pub async fn link_expiry(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
    Json(payload): Json<LinkExpiry>,
) -> Result<Json<TripLinkView>, ServerError> {
    let user_id = account(&caller)?;
    let link = state
        .engine
        .set_trip_link_expiry(&trip_id, payload.expires_at, user_id)
        .await?;
    Ok(Json(link_view(link)))
}

/// Public preview of the trip behind a share link.
pub async fn preview(
    State(state): State<ServerState>,
    Path(token): Path<String>,
) -> Result<Json<Trip>, ServerError> {
    Ok(Json(state.engine.preview_trip_by_access(&token).await?))
}
