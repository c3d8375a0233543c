//! Document Types
//!
//! Records, find options, proximity query types and write acknowledgments.

use crate::error::{Error, Result};
use mongodb::bson::{doc, Bson, Document};
use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

/// One stored document
pub type Record = Document;

/// Filter used to select records
pub type Criteria = Document;

/// Sort direction for `find_all`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(into = "String")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Native direction value: `1` ascending, `-1` descending
    pub fn direction(&self) -> i32 {
        match self {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        }
    }
}

/// Only `desc` sorts descending; any other value falls back to ascending.
impl From<&str> for SortOrder {
    fn from(value: &str) -> Self {
        if value == "desc" {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }
}

impl From<String> for SortOrder {
    fn from(value: String) -> Self {
        SortOrder::from(value.as_str())
    }
}

impl From<SortOrder> for String {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => "asc".to_string(),
            SortOrder::Desc => "desc".to_string(),
        }
    }
}

/// Accepts any value: a non-string order (`-1`, `null`, ...) is ascending.
impl<'de> Deserialize<'de> for SortOrder {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawOrder {
            Text(String),
            Other(IgnoredAny),
        }

        Ok(match RawOrder::deserialize(deserializer)? {
            RawOrder::Text(value) => SortOrder::from(value),
            RawOrder::Other(_) => SortOrder::Asc,
        })
    }
}

/// Single-key ordering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub key: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl OrderBy {
    pub fn asc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            order: SortOrder::Desc,
        }
    }
}

/// Options accepted by `find_all`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindOptions {
    #[serde(default)]
    pub order_by: Option<OrderBy>,
}

impl FindOptions {
    pub fn order_by(order_by: OrderBy) -> Self {
        Self {
            order_by: Some(order_by),
        }
    }

    /// Native sort document, or `None` when no ordering applies
    pub fn sort_document(&self) -> Option<Document> {
        let order_by = self.order_by.as_ref()?;
        if order_by.key.is_empty() {
            return None;
        }
        let mut sort = Document::new();
        sort.insert(order_by.key.clone(), order_by.order.direction());
        Some(sort)
    }
}

/// Point used by proximity queries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    pub longitude: f64,
    pub latitude: f64,
}

impl Geolocation {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// GeoJSON point, coordinates in `[longitude, latitude]` order
    pub fn to_geojson(&self) -> Document {
        doc! {
            "type": "Point",
            "coordinates": [self.longitude, self.latitude],
        }
    }
}

/// Store-specific proximity options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoNearOptions {
    /// Maximum distance from the point
    pub max_distance: Option<f64>,
    /// Minimum distance from the point
    pub min_distance: Option<f64>,
    /// Use spherical geometry
    #[serde(default)]
    pub spherical: bool,
    /// Maximum number of results
    pub limit: Option<i64>,
    /// Additional native filter on candidate documents
    pub query: Option<Document>,
    /// Factor applied to every reported distance
    pub distance_multiplier: Option<f64>,
}

impl GeoNearOptions {
    pub fn with_max_distance(mut self, max_distance: f64) -> Self {
        self.max_distance = Some(max_distance);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn spherical(mut self) -> Self {
        self.spherical = true;
        self
    }
}

/// One raw proximity match as reported by the store
#[derive(Debug, Clone, PartialEq)]
pub struct GeoNearResult {
    /// Distance from the query point
    pub dis: f64,
    /// Matched document in native form
    pub obj: Document,
}

/// Raw proximity response, nearest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoNearResponse {
    pub results: Vec<GeoNearResult>,
}

/// Proximity match returned to callers
#[derive(Debug, Clone, PartialEq)]
pub struct GeoNearHit {
    pub distance: f64,
    pub document: Record,
}

/// Insert acknowledgment
#[derive(Debug, Clone, PartialEq)]
pub struct InsertAck {
    /// Identity of the inserted record, supplied or assigned
    pub inserted_id: Bson,
}

/// Insert-many acknowledgment, ids in input order
#[derive(Debug, Clone, PartialEq)]
pub struct InsertManyAck {
    pub inserted_ids: Vec<Bson>,
}

/// Update/replace acknowledgment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateAck {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Bson>,
}

/// Delete acknowledgment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteAck {
    pub deleted_count: u64,
}

/// Options for update and replace operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Insert when nothing matches
    #[serde(default)]
    pub upsert: bool,
}

impl WriteOptions {
    pub fn upsert() -> Self {
        Self { upsert: true }
    }
}

/// Convert a JSON object into a BSON document
pub fn document_from_json(json: JsonValue) -> Result<Document> {
    let bson = Bson::try_from(json)
        .map_err(|e| Error::Conversion(format!("JSON to BSON error: {}", e)))?;

    if let Bson::Document(doc) = bson {
        Ok(doc)
    } else {
        Err(Error::Conversion("Expected a JSON object".to_string()))
    }
}

/// Convert a BSON document into relaxed extended JSON
pub fn document_to_json(document: Document) -> JsonValue {
    Bson::Document(document).into_relaxed_extjson()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sort_order_parsing() {
        assert_eq!(SortOrder::from("desc"), SortOrder::Desc);
        assert_eq!(SortOrder::from("asc"), SortOrder::Asc);
        assert_eq!(SortOrder::from("DESC"), SortOrder::Asc);
        assert_eq!(SortOrder::from("sideways"), SortOrder::Asc);
    }

    #[test]
    fn test_sort_document_descending() {
        let options: FindOptions =
            serde_json::from_value(json!({"orderBy": {"key": "age", "order": "desc"}})).unwrap();
        assert_eq!(options.sort_document(), Some(doc! {"age": -1}));
    }

    #[test]
    fn test_sort_document_defaults_to_ascending() {
        let options: FindOptions =
            serde_json::from_value(json!({"orderBy": {"key": "age"}})).unwrap();
        assert_eq!(options.sort_document(), Some(doc! {"age": 1}));

        let options: FindOptions =
            serde_json::from_value(json!({"orderBy": {"key": "age", "order": "random"}}))
                .unwrap();
        assert_eq!(options.sort_document(), Some(doc! {"age": 1}));
    }

    #[test]
    fn test_non_string_order_sorts_ascending() {
        let options: FindOptions =
            serde_json::from_value(json!({"orderBy": {"key": "age", "order": -1}})).unwrap();
        assert_eq!(options.sort_document(), Some(doc! {"age": 1}));

        let options: FindOptions =
            serde_json::from_value(json!({"orderBy": {"key": "age", "order": null}})).unwrap();
        assert_eq!(options.sort_document(), Some(doc! {"age": 1}));

        assert_eq!(serde_json::to_value(SortOrder::Desc).unwrap(), json!("desc"));
    }

    #[test]
    fn test_empty_options_apply_no_sort() {
        assert_eq!(FindOptions::default().sort_document(), None);
        let options: FindOptions = serde_json::from_value(json!({})).unwrap();
        assert_eq!(options.sort_document(), None);
        assert_eq!(FindOptions::order_by(OrderBy::asc("")).sort_document(), None);
    }

    #[test]
    fn test_geojson_coordinates_order() {
        let point = Geolocation::new(10.0, 20.0).to_geojson();
        assert_eq!(point, doc! {"type": "Point", "coordinates": [10.0, 20.0]});
    }

    #[test]
    fn test_json_conversion() {
        let doc = document_from_json(json!({"id": "u1", "age": 30})).unwrap();
        assert_eq!(doc.get_str("id").unwrap(), "u1");
        assert!(document_from_json(json!([1, 2])).is_err());

        let json = document_to_json(doc! {"name": "Ann", "age": 30});
        assert_eq!(json, json!({"name": "Ann", "age": 30}));
    }
}
