#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{Database, DatabaseConnection};

use engine::{
    Caller, EditGenerator, EditRequest, Engine, EngineError, ItineraryItem,
    ManualClock, ProposedEdits, Trip, TripDoc,
};
use migration::MigratorTrait;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 20, 9, 0, 0).unwrap()
}

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let (engine, db, _clock) = engine_with_clock().await;
    (engine, db)
}

pub async fn engine_with_clock() -> (Engine, DatabaseConnection, Arc<ManualClock>) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let clock = Arc::new(ManualClock::new(start_time()));
    let engine = Engine::builder()
        .database(db.clone())
        .clock(clock.clone())
        .build()
        .await
        .unwrap();
    (engine, db, clock)
}

pub fn alice() -> Caller {
    Caller::user("alice")
}

pub async fn new_trip(engine: &Engine) -> Trip {
    engine
        .create_trip("Lisbon", Some("long weekend"), "alice")
        .await
        .unwrap()
}

/// Returns the same edits on every call.
pub struct FixedGenerator(pub ProposedEdits);

#[async_trait]
impl EditGenerator for FixedGenerator {
    async fn generate(
        &self,
        _request: &EditRequest,
        _doc: &TripDoc,
        _items: &[ItineraryItem],
    ) -> Result<ProposedEdits, EngineError> {
        Ok(self.0.clone())
    }
}

pub struct DownGenerator;

#[async_trait]
impl EditGenerator for DownGenerator {
    async fn generate(
        &self,
        _request: &EditRequest,
        _doc: &TripDoc,
        _items: &[ItineraryItem],
    ) -> Result<ProposedEdits, EngineError> {
        Err(EngineError::Generator("connection refused".to_string()))
    }
}

pub fn request(text: &str) -> EditRequest {
    EditRequest {
        user_request: text.to_string(),
        edit_doc: true,
        edit_itinerary: true,
    }
}
