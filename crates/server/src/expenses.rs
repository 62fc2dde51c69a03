//! Expense endpoints and the derived balances.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use engine::{BalanceEntry, Caller, Expense, ExpenseNew, ExpenseUpdate};

use crate::{ServerError, server::ServerState};

pub async fn list(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
) -> Result<Json<Vec<Expense>>, ServerError> {
    Ok(Json(state.engine.list_expenses(&trip_id, &caller).await?))
}

pub async fn create(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
    Json(payload): Json<ExpenseNew>,
) -> Result<(StatusCode, Json<Expense>), ServerError> {
    let expense = state
        .engine
        .create_expense(&trip_id, payload, &caller)
        .await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn update(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path((trip_id, expense_id)): Path<(String, String)>,
    Json(payload): Json<ExpenseUpdate>,
) -> Result<Json<Expense>, ServerError> {
    let expense = state
        .engine
        .update_expense(&trip_id, &expense_id, payload, &caller)
        .await?;
    Ok(Json(expense))
}

pub async fn delete(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path((trip_id, expense_id)): Path<(String, String)>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_expense(&trip_id, &expense_id, &caller)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn balances(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(trip_id): Path<String>,
) -> Result<Json<Vec<BalanceEntry>>, ServerError> {
    Ok(Json(state.engine.balances(&trip_id, &caller).await?))
}
