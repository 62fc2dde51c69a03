//! Who is calling and what they may do on a trip.
//!
//! A [`Caller`] is what the transport layer knows about the request: an
//! authenticated account or a share-link token. An [`AccessGate`] turns it
//! into a [`Capability`] on a given trip, or refuses.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseTransaction;

use crate::ResultEngine;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Caller {
    /// An authenticated account, by username.
    User(String),
    /// A share-link holder. `write` is the edit flag the holder asked for.
    Link { token: String, write: bool },
}

impl Caller {
    pub fn user(username: &str) -> Self {
        Self::User(username.to_string())
    }

    pub fn link(token: &str, write: bool) -> Self {
        Self::Link {
            token: token.to_string(),
            write,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Self::User(name) => Some(name),
            Self::Link { .. } => None,
        }
    }
}

/// Resolved right of a caller on one trip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Capability {
    Owner { user_id: String },
    Member { user_id: String },
    Link { token: String, write: bool },
}

impl Capability {
    pub fn can_mutate(&self) -> bool {
        match self {
            Self::Owner { .. } | Self::Member { .. } => true,
            Self::Link { write, .. } => *write,
        }
    }
}

/// Decides read and mutate rights on a trip.
///
/// Both methods return the caller's capability when allowed, `Forbidden`
/// when the trip exists but the caller may not perform the action, and
/// `KeyNotFound` when the trip does not exist. Queries run on the
/// caller's transaction.
#[async_trait]
pub trait AccessGate: Send + Sync + std::fmt::Debug {
    async fn may_read(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> ResultEngine<Capability>;

    async fn may_mutate(
        &self,
        db: &DatabaseTransaction,
        trip_id: &str,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> ResultEngine<Capability>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_write_flag_controls_mutation() {
        let read_only = Capability::Link {
            token: "t".to_string(),
            write: false,
        };
        assert!(!read_only.can_mutate());
        assert!(
            Capability::Link {
                token: "t".to_string(),
                write: true
            }
            .can_mutate()
        );
        assert!(
            Capability::Member {
                user_id: "bob".to_string()
            }
            .can_mutate()
        );
    }

    #[test]
    fn caller_username() {
        assert_eq!(Caller::user("alice").username(), Some("alice"));
        assert_eq!(Caller::link("tok", true).username(), None);
    }
}
