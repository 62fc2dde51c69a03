mod common;

use chrono::{Duration, NaiveDate};

use common::{alice, engine_with_db, new_trip, start_time};
use engine::{Caller, EngineError, ItineraryItemNew, ItineraryItemUpdate};

fn timed(title: &str, offset_hours: i64) -> ItineraryItemNew {
    ItineraryItemNew {
        title: title.to_string(),
        start_time: Some(start_time() + Duration::hours(offset_hours)),
        ..Default::default()
    }
}

#[tokio::test]
async fn items_are_listed_by_start_time() {
    let (engine, _db) = engine_with_db().await;
    let trip = new_trip(&engine).await;

    for (title, offset) in [("Lunch", 4), ("Breakfast", 0), ("Museum", 2)] {
        engine
            .create_itinerary_item(&trip.id, timed(title, offset), &alice())
            .await
            .unwrap();
    }
    let titles: Vec<String> = engine
        .list_itinerary(&trip.id, &alice())
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.title)
        .collect();
    assert_eq!(titles, vec!["Breakfast", "Museum", "Lunch"]);
}

#[tokio::test]
async fn all_day_items_start_at_midnight_utc() {
    let (engine, _db) = engine_with_db().await;
    let trip = new_trip(&engine).await;

    let item = engine
        .create_itinerary_item(
            &trip.id,
            ItineraryItemNew {
                title: "Sintra day trip".to_string(),
                all_day: true,
                start_date: NaiveDate::from_ymd_opt(2025, 6, 1),
                end_time: Some(start_time()),
                ..Default::default()
            },
            &alice(),
        )
        .await
        .unwrap();
    assert_eq!(
        item.start_time.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        "2025-06-01T00:00:00Z"
    );
    assert_eq!(item.end_time, None);
    assert_eq!(item.item_type, "activity");
}

#[tokio::test]
async fn update_and_delete() {
    let (engine, _db) = engine_with_db().await;
    let trip = new_trip(&engine).await;
    let item = engine
        .create_itinerary_item(
            &trip.id,
            ItineraryItemNew {
                location: Some("Belém".to_string()),
                ..timed("Pastéis", 1)
            },
            &alice(),
        )
        .await
        .unwrap();

    let updated = engine
        .update_itinerary_item(
            &trip.id,
            &item.id,
            ItineraryItemUpdate {
                end_time: Some(Some(start_time() + Duration::hours(2))),
                location: Some(None),
                ..Default::default()
            },
            &alice(),
        )
        .await
        .unwrap();
    assert_eq!(updated.location, None);
    assert_eq!(updated.end_time, Some(start_time() + Duration::hours(2)));
    assert_eq!(updated.title, "Pastéis");

    let backwards = engine
        .update_itinerary_item(
            &trip.id,
            &item.id,
            ItineraryItemUpdate {
                end_time: Some(Some(start_time())),
                ..Default::default()
            },
            &alice(),
        )
        .await;
    assert!(matches!(backwards, Err(EngineError::Validation(_))));

    engine
        .delete_itinerary_item(&trip.id, &item.id, &alice())
        .await
        .unwrap();
    assert!(matches!(
        engine
            .delete_itinerary_item(&trip.id, &item.id, &alice())
            .await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(matches!(
        engine
            .update_itinerary_item(&trip.id, &item.id, ItineraryItemUpdate::default(), &alice())
            .await,
        Err(EngineError::KeyNotFound(_))
    ));
}

#[tokio::test]
async fn items_stay_inside_their_trip() {
    let (engine, _db) = engine_with_db().await;
    let trip = new_trip(&engine).await;
    let other = engine.create_trip("Madrid", None, "bob").await.unwrap();
    let item = engine
        .create_itinerary_item(&trip.id, timed("Fado night", 12), &alice())
        .await
        .unwrap();

    assert!(matches!(
        engine
            .delete_itinerary_item(&other.id, &item.id, &Caller::user("bob"))
            .await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(matches!(
        engine
            .create_itinerary_item(&trip.id, timed("", 1), &alice())
            .await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        engine
            .list_itinerary(&trip.id, &Caller::user("bob"))
            .await,
        Err(EngineError::Forbidden(_))
    ));
}
