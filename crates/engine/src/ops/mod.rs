use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Duration, Utc};
use sea_orm::DatabaseConnection;
use tokio::sync::{Mutex as TripMutex, OwnedMutexGuard};

use crate::{
    AccessGate, Clock, EngineError, ResultEngine, SystemClock,
    proposals::DEFAULT_PROPOSAL_TTL_SECONDS,
};

mod access;
mod ai;
mod balances;
mod docs;
mod expenses;
mod itinerary;
mod links;
mod settlements;
mod trips;

pub use access::TripAccessGate;
pub use docs::DocCommit;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    gate: Arc<dyn AccessGate>,
    clock: Arc<dyn Clock>,
    proposal_ttl: Duration,
    trip_locks: TripLocks,
}

type TripLocks = Mutex<HashMap<String, Arc<TripMutex<()>>>>;

/// Holds a trip's critical section. The registry entry goes away with the
/// last holder or waiter.
pub(crate) struct TripLockGuard<'a> {
    locks: &'a TripLocks,
    trip_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TripLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.trip_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.trip_id);
        }
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn proposal_ttl(&self) -> Duration {
        self.proposal_ttl
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Enter the critical section of a trip.
    ///
    /// Revision-gated writes hold it around their transaction so two writers
    /// of the same trip never interleave. Different trips never contend.
    async fn lock_trip(&self, trip_id: &str) -> TripLockGuard<'_> {
        let lock = {
            let mut locks = self
                .trip_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            locks.entry(trip_id.to_string()).or_default().clone()
        };
        TripLockGuard {
            locks: &self.trip_locks,
            trip_id: trip_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn locked_trips(&self) -> usize {
        self.trip_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    gate: Option<Arc<dyn AccessGate>>,
    clock: Option<Arc<dyn Clock>>,
    proposal_ttl: Option<Duration>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Replace the default [`TripAccessGate`].
    pub fn gate(mut self, gate: Arc<dyn AccessGate>) -> EngineBuilder {
        self.gate = Some(gate);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> EngineBuilder {
        self.clock = Some(clock);
        self
    }

    /// Lifetime of AI proposal nonces.
    pub fn proposal_ttl(mut self, ttl: Duration) -> EngineBuilder {
        self.proposal_ttl = Some(ttl);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let proposal_ttl = self
            .proposal_ttl
            .unwrap_or_else(|| Duration::seconds(DEFAULT_PROPOSAL_TTL_SECONDS));
        if proposal_ttl <= Duration::zero() {
            return Err(EngineError::Validation(
                "proposal ttl must be positive".to_string(),
            ));
        }
        Ok(Engine {
            database: self.database,
            gate: self.gate.unwrap_or_else(|| Arc::new(TripAccessGate)),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            proposal_ttl,
            trip_locks: Mutex::new(HashMap::new()),
        })
    }
}
