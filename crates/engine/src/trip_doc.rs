//! The `TripDoc` is the single structured document of a trip.
//!
//! The JSON body holds the narrative fields and is edited with JSON Patch.
//! `revision` and `updated_at` live next to the body, are owned by the
//! engine and are never patchable.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    EngineError, ResultEngine,
    patch::{PatchOp, apply_patch, parse_pointer},
};

pub const SCHEMA_VERSION: i64 = 1;
pub const INITIAL_REVISION: i64 = 1;

/// Top-level keys managed by the engine.
const RESERVED_KEYS: [&str; 2] = ["revision", "updated_at"];
const STRING_KEYS: [&str; 4] = [
    "title",
    "timezone",
    "natural_language_trip_brief",
    "shared_notes",
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TripDoc {
    pub trip_id: String,
    pub revision: i64,
    pub updated_at: DateTime<Utc>,
    pub body: Map<String, Value>,
}

impl TripDoc {
    pub fn shared_notes(&self) -> Option<&str> {
        self.body.get("shared_notes").and_then(Value::as_str)
    }

    /// The document as clients see it: body fields plus `revision` and
    /// `updated_at`.
    pub fn to_json(&self) -> Value {
        let mut out = self.body.clone();
        out.insert("revision".to_string(), json!(self.revision));
        out.insert("updated_at".to_string(), json!(self.updated_at));
        Value::Object(out)
    }
}

/// Body of a freshly created document.
pub fn default_body(title: &str) -> Value {
    json!({
        "schema_version": SCHEMA_VERSION,
        "timezone": "UTC",
        "title": title,
        "start_date": null,
        "end_date": null,
        "members": [],
        "lodgings": [],
        "natural_language_trip_brief": "",
        "shared_notes": "",
    })
}

/// Rejects operations that target the root or an engine-owned key.
fn check_patch_paths(ops: &[PatchOp]) -> ResultEngine<()> {
    for op in ops {
        for path in std::iter::once(op.path()).chain(op.from_path()) {
            let tokens =
                parse_pointer(path).map_err(|err| EngineError::Validation(err.to_string()))?;
            let Some(first) = tokens.first() else {
                return Err(EngineError::Validation(
                    "patch must not target the document root".to_string(),
                ));
            };
            if op.is_mutation() && RESERVED_KEYS.contains(&first.as_str()) {
                return Err(EngineError::Validation(format!(
                    "\"/{first}\" is managed by the server"
                )));
            }
        }
    }
    Ok(())
}

/// Runs `ops` against the document as clients see it and returns the
/// validated body.
///
/// `test` ops may read `revision` and `updated_at`; nothing may write them.
pub(crate) fn patched_body(doc: &TripDoc, ops: &[PatchOp]) -> ResultEngine<Map<String, Value>> {
    check_patch_paths(ops)?;
    let patched =
        apply_patch(&doc.to_json(), ops).map_err(|err| EngineError::Validation(err.to_string()))?;
    let Value::Object(mut map) = patched else {
        return Err(EngineError::Validation(
            "trip doc must be a JSON object".to_string(),
        ));
    };
    for key in RESERVED_KEYS {
        map.remove(key);
    }
    validate_body(Value::Object(map))
}

/// Validates a patched body before it is written.
pub(crate) fn validate_body(body: Value) -> ResultEngine<Map<String, Value>> {
    let Value::Object(map) = body else {
        return Err(EngineError::Validation(
            "trip doc must be a JSON object".to_string(),
        ));
    };
    if map.get("schema_version").and_then(Value::as_i64) != Some(SCHEMA_VERSION) {
        return Err(EngineError::Validation(format!(
            "schema_version must be {SCHEMA_VERSION}"
        )));
    }
    for key in STRING_KEYS {
        if !map.get(key).is_some_and(Value::is_string) {
            return Err(EngineError::Validation(format!("{key} must be a string")));
        }
    }
    let start = optional_date(&map, "start_date")?;
    let end = optional_date(&map, "end_date")?;
    if let (Some(start), Some(end)) = (start, end)
        && end < start
    {
        return Err(EngineError::Validation(
            "end_date must not be before start_date".to_string(),
        ));
    }
    Ok(map)
}

fn optional_date(map: &Map<String, Value>, key: &str) -> ResultEngine<Option<NaiveDate>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| EngineError::Validation(format!("{key} must be a YYYY-MM-DD date"))),
        Some(_) => Err(EngineError::Validation(format!(
            "{key} must be a date string or null"
        ))),
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "trip_docs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub trip_id: String,
    pub body: Json,
    pub revision: i64,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::trips::Entity",
        from = "Column::TripId",
        to = "super::trips::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Trips,
}

impl Related<super::trips::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trips.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for TripDoc {
    type Error = EngineError;

    fn try_from(value: Model) -> Result<Self, Self::Error> {
        let Value::Object(body) = value.body else {
            return Err(EngineError::Validation(
                "stored trip doc is not an object".to_string(),
            ));
        };
        Ok(Self {
            trip_id: value.trip_id,
            revision: value.revision,
            updated_at: value.updated_at,
            body,
        })
    }
}

impl From<&TripDoc> for ActiveModel {
    fn from(value: &TripDoc) -> Self {
        Self {
            trip_id: ActiveValue::Set(value.trip_id.clone()),
            body: ActiveValue::Set(Value::Object(value.body.clone())),
            revision: ActiveValue::Set(value.revision),
            updated_at: ActiveValue::Set(value.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_body_is_valid() {
        let body = validate_body(default_body("Lisbon")).unwrap();
        assert_eq!(body["title"], "Lisbon");
        assert_eq!(body["shared_notes"], "");
    }

    #[test]
    fn reserved_and_root_paths_are_rejected() {
        let revision = vec![PatchOp::Replace {
            path: "/revision".to_string(),
            value: json!(99),
        }];
        assert!(matches!(
            check_patch_paths(&revision),
            Err(EngineError::Validation(_))
        ));

        let root = vec![PatchOp::Replace {
            path: String::new(),
            value: json!({}),
        }];
        assert!(matches!(
            check_patch_paths(&root),
            Err(EngineError::Validation(_))
        ));

        let copy_out = vec![PatchOp::Move {
            from: "/updated_at".to_string(),
            path: "/x".to_string(),
        }];
        assert!(check_patch_paths(&copy_out).is_err());

        let notes = vec![PatchOp::Replace {
            path: "/shared_notes".to_string(),
            value: json!("hi"),
        }];
        assert!(check_patch_paths(&notes).is_ok());
    }

    #[test]
    fn body_type_rules() {
        let mut body = default_body("x");
        body["shared_notes"] = json!(42);
        assert_eq!(
            validate_body(body).unwrap_err(),
            EngineError::Validation("shared_notes must be a string".to_string())
        );

        let mut body = default_body("x");
        body["start_date"] = json!("2025-06-05");
        body["end_date"] = json!("2025-06-01");
        assert!(validate_body(body).is_err());

        let mut body = default_body("x");
        body["lodgings"] = json!({"anything": ["goes", 1]});
        assert!(validate_body(body).is_ok());

        let mut body = default_body("x");
        body["schema_version"] = json!(2);
        assert_eq!(
            validate_body(body).unwrap_err(),
            EngineError::Validation("schema_version must be 1".to_string())
        );
    }

    fn doc_at(revision: i64) -> TripDoc {
        let Value::Object(body) = default_body("Lisbon") else {
            unreachable!()
        };
        TripDoc {
            trip_id: "trip".to_string(),
            revision,
            updated_at: Utc::now(),
            body,
        }
    }

    #[test]
    fn revision_can_guard_a_patch() {
        let doc = doc_at(4);
        let view = doc.to_json();
        let ops = vec![
            PatchOp::Test {
                path: "/revision".to_string(),
                value: view["revision"].clone(),
            },
            PatchOp::Test {
                path: "/updated_at".to_string(),
                value: view["updated_at"].clone(),
            },
            PatchOp::Replace {
                path: "/shared_notes".to_string(),
                value: json!("late checkout"),
            },
        ];

        let body = patched_body(&doc, &ops).unwrap();
        assert_eq!(body["shared_notes"], "late checkout");
        assert!(!body.contains_key("revision"));
        assert!(!body.contains_key("updated_at"));

        let stale = vec![PatchOp::Test {
            path: "/revision".to_string(),
            value: json!(3),
        }];
        assert!(matches!(
            patched_body(&doc, &stale),
            Err(EngineError::Validation(_))
        ));
    }
}
