//! Itinerary items.
//!
//! Items are a keyed collection scoped to a trip. They are not part of the
//! `TripDoc` and are not covered by its revision: every create, update and
//! delete is its own atomic write, last write wins per item.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine, util::double_option};

pub const DEFAULT_ITEM_TYPE: &str = "activity";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItineraryItem {
    pub id: String,
    pub trip_id: String,
    pub title: String,
    pub item_type: String,
    pub all_day: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub day_index: Option<i32>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Fields of a new item as submitted by a client or an edit proposal.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItineraryItemNew {
    pub title: String,
    #[serde(default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub all_day: bool,
    /// Date of an all-day item.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub day_index: Option<i32>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

/// Partial update. For nullable fields `None` keeps the current value and
/// `Some(None)` clears it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItineraryItemUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<Option<DateTime<Utc>>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub location: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub notes: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub day_index: Option<Option<i32>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub lat: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub lng: Option<Option<f64>>,
}

impl ItineraryItemUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One create/update/delete instruction against the itinerary collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ItineraryOp {
    Create { item: ItineraryItemNew },
    Update { id: String, patch: ItineraryItemUpdate },
    Delete { id: String },
}

impl ItineraryItem {
    /// Validates and normalizes a new item.
    ///
    /// All-day items are pinned to midnight UTC of their date and lose their
    /// end time.
    pub fn build(id: String, trip_id: &str, new: ItineraryItemNew) -> ResultEngine<Self> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(EngineError::Validation(
                "itinerary title must not be empty".to_string(),
            ));
        }
        let item_type = new
            .item_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_ITEM_TYPE)
            .to_string();

        let (start_time, end_time) = if new.all_day {
            let date = new
                .start_date
                .or_else(|| new.start_time.map(|t| t.date_naive()))
                .ok_or_else(|| {
                    EngineError::Validation("start_date is required for all-day items".to_string())
                })?;
            (midnight_utc(date), None)
        } else {
            let start = new.start_time.ok_or_else(|| {
                EngineError::Validation("start_time is required unless all_day".to_string())
            })?;
            if let Some(end) = new.end_time
                && end < start
            {
                return Err(EngineError::Validation(
                    "end_time must not be before start_time".to_string(),
                ));
            }
            (start, new.end_time)
        };

        if let Some(day) = new.day_index
            && day < 1
        {
            return Err(EngineError::Validation(
                "day_index must be >= 1".to_string(),
            ));
        }
        validate_coordinates(new.lat, new.lng)?;

        Ok(Self {
            id,
            trip_id: trip_id.to_string(),
            title: title.to_string(),
            item_type,
            all_day: new.all_day,
            start_time,
            end_time,
            location: trim_optional(new.location),
            notes: trim_optional(new.notes),
            day_index: new.day_index,
            lat: new.lat,
            lng: new.lng,
        })
    }

    /// Merges a partial update and re-validates the whole item.
    pub fn merged(&self, update: ItineraryItemUpdate) -> ResultEngine<Self> {
        let mut draft = self.to_draft();
        if let Some(title) = update.title {
            draft.title = title;
        }
        if let Some(item_type) = update.item_type {
            draft.item_type = Some(item_type);
        }
        if let Some(all_day) = update.all_day {
            draft.all_day = all_day;
        }
        if let Some(start_date) = update.start_date {
            draft.start_date = Some(start_date);
        }
        if let Some(start_time) = update.start_time {
            draft.start_time = Some(start_time);
            if update.start_date.is_none() {
                draft.start_date = Some(start_time.date_naive());
            }
        }
        if let Some(end_time) = update.end_time {
            draft.end_time = end_time;
        }
        if let Some(location) = update.location {
            draft.location = location;
        }
        if let Some(notes) = update.notes {
            draft.notes = notes;
        }
        if let Some(day_index) = update.day_index {
            draft.day_index = day_index;
        }
        if let Some(lat) = update.lat {
            draft.lat = lat;
        }
        if let Some(lng) = update.lng {
            draft.lng = lng;
        }
        Self::build(self.id.clone(), &self.trip_id, draft)
    }

    fn to_draft(&self) -> ItineraryItemNew {
        ItineraryItemNew {
            title: self.title.clone(),
            item_type: Some(self.item_type.clone()),
            all_day: self.all_day,
            start_date: Some(self.start_time.date_naive()),
            start_time: Some(self.start_time),
            end_time: self.end_time,
            location: self.location.clone(),
            notes: self.notes.clone(),
            day_index: self.day_index,
            lat: self.lat,
            lng: self.lng,
        }
    }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn trim_optional(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn validate_coordinates(lat: Option<f64>, lng: Option<f64>) -> ResultEngine<()> {
    match (lat, lng) {
        (None, None) => Ok(()),
        (Some(lat), Some(lng)) => {
            if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                return Err(EngineError::Validation(
                    "lat must be within [-90, 90]".to_string(),
                ));
            }
            if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
                return Err(EngineError::Validation(
                    "lng must be within [-180, 180]".to_string(),
                ));
            }
            Ok(())
        }
        _ => Err(EngineError::Validation(
            "lat and lng must be both present or both absent".to_string(),
        )),
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "itinerary_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub trip_id: String,
    pub title: String,
    pub item_type: String,
    pub all_day: bool,
    pub start_time: DateTimeUtc,
    pub end_time: Option<DateTimeUtc>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub day_index: Option<i32>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
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

impl From<Model> for ItineraryItem {
    fn from(value: Model) -> Self {
        Self {
            id: value.id,
            trip_id: value.trip_id,
            title: value.title,
            item_type: value.item_type,
            all_day: value.all_day,
            start_time: value.start_time,
            end_time: value.end_time,
            location: value.location,
            notes: value.notes,
            day_index: value.day_index,
            lat: value.lat,
            lng: value.lng,
        }
    }
}

impl From<&ItineraryItem> for ActiveModel {
    fn from(value: &ItineraryItem) -> Self {
        Self {
            id: ActiveValue::Set(value.id.clone()),
            trip_id: ActiveValue::Set(value.trip_id.clone()),
            title: ActiveValue::Set(value.title.clone()),
            item_type: ActiveValue::Set(value.item_type.clone()),
            all_day: ActiveValue::Set(value.all_day),
            start_time: ActiveValue::Set(value.start_time),
            end_time: ActiveValue::Set(value.end_time),
            location: ActiveValue::Set(value.location.clone()),
            notes: ActiveValue::Set(value.notes.clone()),
            day_index: ActiveValue::Set(value.day_index),
            lat: ActiveValue::Set(value.lat),
            lng: ActiveValue::Set(value.lng),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn timed(start: DateTime<Utc>) -> ItineraryItemNew {
        ItineraryItemNew {
            title: "Museum".to_string(),
            start_time: Some(start),
            ..Default::default()
        }
    }

    #[test]
    fn all_day_normalizes_to_midnight_utc() {
        let item = ItineraryItem::build(
            "i1".to_string(),
            "t1",
            ItineraryItemNew {
                title: "Beach day".to_string(),
                all_day: true,
                start_date: NaiveDate::from_ymd_opt(2025, 6, 1),
                end_time: Some(Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(item.start_time.to_rfc3339(), "2025-06-01T00:00:00+00:00");
        assert_eq!(
            serde_json::to_value(item.start_time).unwrap(),
            json!("2025-06-01T00:00:00Z")
        );
        assert_eq!(item.end_time, None);
        assert_eq!(item.item_type, DEFAULT_ITEM_TYPE);
    }

    #[test]
    fn start_time_required_unless_all_day() {
        let err = ItineraryItem::build(
            "i1".to_string(),
            "t1",
            ItineraryItemNew {
                title: "Dinner".to_string(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::Validation("start_time is required unless all_day".to_string())
        );
    }

    #[test]
    fn end_before_start_is_rejected() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let mut new = timed(start);
        new.end_time = Some(start - chrono::TimeDelta::minutes(5));
        assert!(ItineraryItem::build("i".to_string(), "t", new).is_err());
    }

    #[test]
    fn coordinates_and_day_index_rules() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();

        let mut only_lat = timed(start);
        only_lat.lat = Some(48.858);
        assert!(ItineraryItem::build("i".to_string(), "t", only_lat).is_err());

        let mut both = timed(start);
        both.lat = Some(48.858);
        both.lng = Some(2.294);
        assert!(ItineraryItem::build("i".to_string(), "t", both).is_ok());

        let mut day_zero = timed(start);
        day_zero.day_index = Some(0);
        assert!(ItineraryItem::build("i".to_string(), "t", day_zero).is_err());
    }

    #[test]
    fn merge_revalidates_and_clears() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let mut new = timed(start);
        new.location = Some("Louvre".to_string());
        new.end_time = Some(start + chrono::TimeDelta::hours(2));
        let item = ItineraryItem::build("i".to_string(), "t", new).unwrap();

        let cleared = item
            .merged(ItineraryItemUpdate {
                location: Some(None),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(cleared.location, None);
        assert_eq!(cleared.end_time, item.end_time);

        let bad = item.merged(ItineraryItemUpdate {
            start_time: Some(start + chrono::TimeDelta::hours(3)),
            ..Default::default()
        });
        assert!(bad.is_err());

        let all_day = item
            .merged(ItineraryItemUpdate {
                all_day: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(all_day.start_time.to_rfc3339(), "2025-06-01T00:00:00+00:00");
        assert_eq!(all_day.end_time, None);
    }

    #[test]
    fn update_distinguishes_null_from_absent() {
        let update: ItineraryItemUpdate =
            serde_json::from_value(json!({"notes": null, "title": "New"})).unwrap();
        assert_eq!(update.notes, Some(None));
        assert_eq!(update.location, None);
        assert_eq!(update.title.as_deref(), Some("New"));
    }

    #[test]
    fn ops_use_tagged_wire_format() {
        let op: ItineraryOp =
            serde_json::from_value(json!({"op": "delete", "id": "abc"})).unwrap();
        assert_eq!(
            op,
            ItineraryOp::Delete {
                id: "abc".to_string()
            }
        );
        let op: ItineraryOp = serde_json::from_value(json!({
            "op": "create",
            "item": {"title": "Hike", "all_day": true, "start_date": "2025-06-02"}
        }))
        .unwrap();
        assert!(matches!(op, ItineraryOp::Create { .. }));
    }
}
