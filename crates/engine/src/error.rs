//! The module contains the errors the engine can throw.
//!
//! The errors are:
//!
//! - [`Validation`] thrown when a field is malformed or out of range. Nothing
//!   is written when it is returned.
//! - [`Conflict`] thrown when the caller's revision is stale. The caller must
//!   re-read and retry.
//! - [`KeyNotFound`] thrown when a trip, member, item or nonce is unknown.
//! - [`Expired`] and [`AlreadyUsed`] thrown by the AI edit protocol.
//! - [`Forbidden`] thrown when the access gate denies the request.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`Conflict`]: EngineError::Conflict
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`Expired`]: EngineError::Expired
//!  [`AlreadyUsed`]: EngineError::AlreadyUsed
//!  [`Forbidden`]: EngineError::Forbidden
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Revision conflict: {0}")]
    Conflict(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Expired: {0}")]
    Expired(String),
    #[error("Already used: {0}")]
    AlreadyUsed(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Edit generator failed: {0}")]
    Generator(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Returns `true` when the caller should reload and retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Expired(a), Self::Expired(b)) => a == b,
            (Self::AlreadyUsed(a), Self::AlreadyUsed(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::Generator(a), Self::Generator(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
