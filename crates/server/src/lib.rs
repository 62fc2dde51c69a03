use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use generator::{RemoteEditGenerator, UnconfiguredGenerator};
pub use server::{ServerState, router, run, run_with_listener, spawn_with_listener};

mod ai;
mod docs;
mod expenses;
mod generator;
mod itinerary;
mod server;
mod settlements;
mod trips;
mod user;

pub mod types {
    pub mod trip {
        pub use api_types::trip::{LinkExpiry, LinkSelf, MemberNew, TripLinkView, TripNew, TripUpdate};
        pub use engine::{Member, Trip};
    }

    pub mod doc {
        pub use api_types::doc::{DocCommitted, DocPatch};
        pub use engine::PatchOp;
    }

    pub mod itinerary {
        pub use engine::{ItineraryItem, ItineraryItemNew, ItineraryItemUpdate, ItineraryOp};
    }

    pub mod ledger {
        pub use engine::{
            BalanceEntry, Expense, ExpenseNew, ExpenseUpdate, Settlement, SettlementMode,
            SettlementNew, SettlementSuggestion, SettlementUpdate,
        };
    }

    pub mod ai {
        pub use api_types::ai::{EditsApplied, EditsApply, EditsPropose, EditsProposed};
    }
}

pub enum ServerError {
    Engine(EngineError),
    /// The route needs an authenticated account.
    Unauthorized,
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    code: &'static str,
    error: String,
}

/// Stable machine-readable kind, so clients can tell a stale revision
/// (reload and retry) from a spent nonce (propose again).
fn code_for_engine_error(err: &EngineError) -> &'static str {
    match err {
        EngineError::Validation(_) => "validation",
        EngineError::Conflict(_) => "revision_conflict",
        EngineError::ExistingKey(_) => "already_exists",
        EngineError::AlreadyUsed(_) => "nonce_used",
        EngineError::KeyNotFound(_) => "not_found",
        EngineError::Expired(_) => "expired",
        EngineError::Forbidden(_) => "forbidden",
        EngineError::Generator(_) => "generator_failed",
        EngineError::Database(_) => "internal",
    }
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Conflict(_) | EngineError::ExistingKey(_) | EngineError::AlreadyUsed(_) => {
            StatusCode::CONFLICT
        }
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Expired(_) => StatusCode::GONE,
        EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
        EngineError::Generator(_) => StatusCode::BAD_GATEWAY,
        EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        EngineError::Generator(reason) => {
            tracing::warn!("edit generator failed: {reason}");
            format!("edit generator failed: {reason}")
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, error) = match self {
            ServerError::Engine(err) => (
                status_for_engine_error(&err),
                code_for_engine_error(&err),
                message_for_engine_error(err),
            ),
            ServerError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "this route needs an account".to_string(),
            ),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, "bad_request", err),
        };

        (status, Json(Error { code, error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
