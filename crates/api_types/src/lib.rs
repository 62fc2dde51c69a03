use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Keeps "absent" and "null" apart: absent is `None`, null is `Some(None)`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub mod trip {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TripNew {
        pub name: String,
        pub description: Option<String>,
    }

    /// Partial update of a trip (owner only).
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TripUpdate {
        pub name: Option<String>,
        /// `null` clears the description.
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            deserialize_with = "double_option"
        )]
        pub description: Option<Option<String>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberNew {
        pub display_name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LinkSelf {
        pub member_id: String,
        /// Share-link token proving read access for accounts that are not
        /// yet part of the trip. The `X-Trip-Access` header works too.
        pub access_token: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LinkExpiry {
        /// `null` removes the expiry.
        pub expires_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TripLinkView {
        pub token: String,
        pub expires_at: Option<DateTime<Utc>>,
        pub revoked: bool,
    }
}

pub mod doc {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DocPatch {
        /// Revision the patch was computed against.
        pub client_revision: i64,
        /// RFC 6902 operations.
        pub patch: Vec<Value>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DocCommitted {
        pub revision: i64,
        pub updated_at: DateTime<Utc>,
    }
}

pub mod ai {
    use super::*;

    fn yes() -> bool {
        true
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EditsPropose {
        pub user_request: String,
        #[serde(default = "yes")]
        pub edit_doc: bool,
        #[serde(default = "yes")]
        pub edit_itinerary: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EditsProposed {
        pub trip_doc_patch: Vec<Value>,
        pub itinerary_ops: Vec<Value>,
        /// Single-use token to pass back to `apply-edits`.
        pub nonce: String,
        pub nonce_expires_at: DateTime<Utc>,
    }

    /// Apply request. The server applies the ops it stored for the nonce;
    /// echoed ops are only compared against them.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct EditsApply {
        pub client_revision: i64,
        pub nonce: String,
        #[serde(default)]
        pub trip_doc_patch: Vec<Value>,
        #[serde(default)]
        pub itinerary_ops: Vec<Value>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EditsApplied {
        pub new_revision: i64,
        pub updated_at: DateTime<Utc>,
        pub created_item_ids: Vec<String>,
        pub updated_item_ids: Vec<String>,
        pub deleted_item_ids: Vec<String>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trip_update_tells_null_from_absent() {
        let absent: trip::TripUpdate = serde_json::from_value(json!({"name": "Porto"})).unwrap();
        assert_eq!(absent.description, None);

        let cleared: trip::TripUpdate =
            serde_json::from_value(json!({"description": null})).unwrap();
        assert_eq!(cleared.description, Some(None));
    }

    #[test]
    fn propose_flags_default_to_true() {
        let req: ai::EditsPropose =
            serde_json::from_value(json!({"user_request": "add a museum"})).unwrap();
        assert!(req.edit_doc);
        assert!(req.edit_itinerary);
    }

    #[test]
    fn apply_without_echoed_ops() {
        let req: ai::EditsApply =
            serde_json::from_value(json!({"client_revision": 3, "nonce": "n"})).unwrap();
        assert!(req.trip_doc_patch.is_empty());
        assert!(req.itinerary_ops.is_empty());
    }
}
