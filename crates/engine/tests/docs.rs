mod common;

use serde_json::json;

use common::{alice, engine_with_clock, engine_with_db, new_trip, start_time};
use engine::{Caller, EngineError, INITIAL_REVISION, PatchOp};

fn set_notes(text: &str) -> Vec<PatchOp> {
    vec![PatchOp::Replace {
        path: "/shared_notes".to_string(),
        value: json!(text),
    }]
}

#[tokio::test]
async fn new_trip_has_default_doc() {
    let (engine, _db) = engine_with_db().await;
    let trip = new_trip(&engine).await;

    let doc = engine.trip_doc(&trip.id, &alice()).await.unwrap();
    assert_eq!(doc.revision, INITIAL_REVISION);
    assert_eq!(doc.body["title"], "Lisbon");
    assert_eq!(doc.body["timezone"], "UTC");
    assert_eq!(doc.shared_notes(), Some(""));
    assert_eq!(doc.updated_at, start_time());

    let wire = doc.to_json();
    assert_eq!(wire["revision"], 1);
    assert!(wire.get("updated_at").is_some());
}

#[tokio::test]
async fn patch_bumps_revision_and_stamps_time() {
    let (engine, _db, clock) = engine_with_clock().await;
    let trip = new_trip(&engine).await;
    clock.advance(chrono::Duration::minutes(3));

    let commit = engine
        .patch_trip_doc(&trip.id, 1, &set_notes("bring sunscreen"), &alice())
        .await
        .unwrap();
    assert_eq!(commit.revision, 2);
    assert_eq!(commit.updated_at, start_time() + chrono::Duration::minutes(3));

    let doc = engine.trip_doc(&trip.id, &alice()).await.unwrap();
    assert_eq!(doc.revision, 2);
    assert_eq!(doc.shared_notes(), Some("bring sunscreen"));
    assert_eq!(doc.updated_at, commit.updated_at);
}

#[tokio::test]
async fn second_writer_at_same_revision_conflicts() {
    let (engine, _db) = engine_with_db().await;
    let trip = new_trip(&engine).await;
    for revision in 1..5 {
        engine
            .patch_trip_doc(&trip.id, revision, &set_notes("draft"), &alice())
            .await
            .unwrap();
    }

    let first = engine
        .patch_trip_doc(&trip.id, 5, &set_notes("from A"), &alice())
        .await
        .unwrap();
    assert_eq!(first.revision, 6);

    let second = engine
        .patch_trip_doc(&trip.id, 5, &set_notes("from B"), &alice())
        .await;
    assert!(matches!(second, Err(EngineError::Conflict(_))));

    let doc = engine.trip_doc(&trip.id, &alice()).await.unwrap();
    assert_eq!(doc.revision, 6);
    assert_eq!(doc.shared_notes(), Some("from A"));
}

#[tokio::test]
async fn concurrent_patches_one_wins() {
    let (engine, _db) = engine_with_db().await;
    let trip = new_trip(&engine).await;
    let caller = alice();

    let a = set_notes("A");
    let b = set_notes("B");
    let (left, right) = tokio::join!(
        engine.patch_trip_doc(&trip.id, 1, &a, &caller),
        engine.patch_trip_doc(&trip.id, 1, &b, &caller),
    );

    let wins = [&left, &right].iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert!(left.as_ref().err().is_none_or(EngineError::is_conflict));
    assert!(right.as_ref().err().is_none_or(EngineError::is_conflict));

    let doc = engine.trip_doc(&trip.id, &caller).await.unwrap();
    assert_eq!(doc.revision, 2);
}

#[tokio::test]
async fn failed_test_op_aborts_whole_patch() {
    let (engine, _db) = engine_with_db().await;
    let trip = new_trip(&engine).await;

    let ops = vec![
        PatchOp::Replace {
            path: "/shared_notes".to_string(),
            value: json!("changed"),
        },
        PatchOp::Test {
            path: "/title".to_string(),
            value: json!("Porto"),
        },
    ];
    let err = engine
        .patch_trip_doc(&trip.id, 1, &ops, &alice())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let doc = engine.trip_doc(&trip.id, &alice()).await.unwrap();
    assert_eq!(doc.revision, 1);
    assert_eq!(doc.shared_notes(), Some(""));
}

#[tokio::test]
async fn engine_owned_fields_and_types_are_protected() {
    let (engine, _db) = engine_with_db().await;
    let trip = new_trip(&engine).await;

    let revision = vec![PatchOp::Replace {
        path: "/revision".to_string(),
        value: json!(40),
    }];
    assert!(matches!(
        engine.patch_trip_doc(&trip.id, 1, &revision, &alice()).await,
        Err(EngineError::Validation(_))
    ));

    let wrong_type = vec![PatchOp::Replace {
        path: "/title".to_string(),
        value: json!(["not", "a", "string"]),
    }];
    assert!(matches!(
        engine.patch_trip_doc(&trip.id, 1, &wrong_type, &alice()).await,
        Err(EngineError::Validation(_))
    ));

    let schema = vec![PatchOp::Replace {
        path: "/schema_version".to_string(),
        value: json!(99),
    }];
    assert!(matches!(
        engine.patch_trip_doc(&trip.id, 1, &schema, &alice()).await,
        Err(EngineError::Validation(_))
    ));

    let lodging = vec![PatchOp::Add {
        path: "/lodgings/-".to_string(),
        value: json!({"name": "Casa Azul", "nights": 3}),
    }];
    let commit = engine
        .patch_trip_doc(&trip.id, 1, &lodging, &alice())
        .await
        .unwrap();
    assert_eq!(commit.revision, 2);
    let doc = engine.trip_doc(&trip.id, &alice()).await.unwrap();
    assert_eq!(doc.body["lodgings"][0]["name"], "Casa Azul");
}

#[tokio::test]
async fn test_op_on_revision_guards_the_patch() {
    let (engine, _db) = engine_with_db().await;
    let trip = new_trip(&engine).await;
    let seen = engine.trip_doc(&trip.id, &alice()).await.unwrap().to_json();

    let mut guarded = vec![PatchOp::Test {
        path: "/revision".to_string(),
        value: seen["revision"].clone(),
    }];
    guarded.extend(set_notes("guarded"));
    let commit = engine
        .patch_trip_doc(&trip.id, 1, &guarded, &alice())
        .await
        .unwrap();
    assert_eq!(commit.revision, 2);

    let doc = engine.trip_doc(&trip.id, &alice()).await.unwrap();
    assert_eq!(doc.shared_notes(), Some("guarded"));
    assert!(!doc.body.contains_key("revision"));

    // The guard reads the stored revision, not the one the client sent.
    let mut stale = vec![PatchOp::Test {
        path: "/revision".to_string(),
        value: seen["revision"].clone(),
    }];
    stale.extend(set_notes("too late"));
    assert!(matches!(
        engine.patch_trip_doc(&trip.id, 2, &stale, &alice()).await,
        Err(EngineError::Validation(_))
    ));
}

#[tokio::test]
async fn access_rules_for_doc() {
    let (engine, _db) = engine_with_db().await;
    let trip = new_trip(&engine).await;
    let link = engine.trip_link(&trip.id, "alice").await.unwrap();

    let reader = Caller::link(&link.token, false);
    assert!(engine.trip_doc(&trip.id, &reader).await.is_ok());
    assert!(matches!(
        engine
            .patch_trip_doc(&trip.id, 1, &set_notes("x"), &reader)
            .await,
        Err(EngineError::Forbidden(_))
    ));

    let editor = Caller::link(&link.token, true);
    let commit = engine
        .patch_trip_doc(&trip.id, 1, &set_notes("from the group chat"), &editor)
        .await
        .unwrap();
    assert_eq!(commit.revision, 2);

    let stranger = Caller::user("mallory");
    assert!(matches!(
        engine.trip_doc(&trip.id, &stranger).await,
        Err(EngineError::Forbidden(_))
    ));
    assert!(matches!(
        engine.trip_doc(&trip.id, &Caller::link("guess", true)).await,
        Err(EngineError::Forbidden(_))
    ));
    assert!(matches!(
        engine.trip_doc("no-such-trip", &alice()).await,
        Err(EngineError::KeyNotFound(_))
    ));

    engine.revoke_trip_link(&trip.id, "alice").await.unwrap();
    assert!(matches!(
        engine.trip_doc(&trip.id, &reader).await,
        Err(EngineError::Forbidden(_))
    ));
}
