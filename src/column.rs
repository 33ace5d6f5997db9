//! Column layout normalization.
//!
//! Column layouts arrive as JSON in one of three shapes: a plain array, an
//! object wrapping the array under `default`, or an array-like object with a
//! numeric `length` and integer keys. All of them normalize to the same
//! ordered `Vec<ColumnDescriptor>`; anything else normalizes to nothing.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Rendering and binding options carried under a column's `data` key.
///
/// Options of the wrong JSON type read as unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnData {
    #[serde(default, deserialize_with = "string_list", skip_serializing_if = "Option::is_none")]
    pub join_values_from_these_fields: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub entity_linking: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub url_link_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    #[serde(default, deserialize_with = "lenient_string")]
    pub key: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub field_name: String,
    #[serde(rename = "name", default, deserialize_with = "lenient_string")]
    pub display_name: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub min_width: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub max_width: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub data: Option<ColumnData>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient::<D, String>(deserializer)?.unwrap_or_default())
}

/// Non-string members of the list are dropped.
fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<String>>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_array().map(|fields| {
        fields
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    }))
}

impl ColumnDescriptor {
    pub fn new(key: impl Into<String>, field_name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            field_name: field_name.into(),
            display_name: display_name.into(),
            min_width: None,
            max_width: None,
            data: None,
        }
    }

    pub fn with_data(mut self, data: ColumnData) -> Self {
        self.data = Some(data);
        self
    }

    /// Read one layout entry. `key` and `fieldName` stand in for each other;
    /// an entry with neither is not a column.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object()?;
        let mut column = Self::deserialize(value).ok()?;
        match (column.key.is_empty(), column.field_name.is_empty()) {
            (true, true) => return None,
            (true, false) => column.key = column.field_name.clone(),
            (false, true) => column.field_name = column.key.clone(),
            (false, false) => {}
        }
        Some(column)
    }

    pub fn join_fields(&self) -> Option<&[String]> {
        self.data.as_ref()?.join_values_from_these_fields.as_deref()
    }

    /// Date pattern; an empty string counts as unset.
    pub fn date_format(&self) -> Option<&str> {
        self.data
            .as_ref()?
            .date_format
            .as_deref()
            .filter(|f| !f.is_empty())
    }

    pub fn entity_linking(&self) -> bool {
        self.data
            .as_ref()
            .and_then(|d| d.entity_linking)
            .unwrap_or(false)
    }

    /// URL mode; an empty string counts as unset.
    pub fn url(&self) -> Option<&str> {
        self.data.as_ref()?.url.as_deref().filter(|u| !u.is_empty())
    }

    pub fn url_link_text(&self) -> Option<&str> {
        self.data.as_ref()?.url_link_text.as_deref()
    }
}

/// Whether a field name already follows the Web API lookup convention
/// `_<name>_value`.
pub fn is_lookup_field_name(field_name: &str) -> bool {
    field_name.starts_with('_') && field_name.ends_with("_value")
}

/// Wrap a lookup field name in the `_<name>_value` convention unless it
/// already follows it.
pub fn lookup_field_name(field_name: &str) -> String {
    if is_lookup_field_name(field_name) {
        field_name.to_string()
    } else {
        format!("_{field_name}_value")
    }
}

/// Normalize a raw column layout into an ordered list of descriptors.
pub fn normalize_columns(raw: &Value) -> Vec<ColumnDescriptor> {
    let entries: Vec<&Value> = match raw {
        Value::Array(items) => items.iter().collect(),
        Value::Object(obj) => match obj.get("default") {
            Some(Value::Array(items)) => items.iter().collect(),
            _ => array_like_entries(obj),
        },
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(|entry| {
            let column = ColumnDescriptor::from_value(entry);
            if column.is_none() && !entry.is_null() {
                warn!(entry = %entry, "skipping column entry without key or fieldName");
            }
            column
        })
        .map(|mut column| {
            if column.entity_linking() {
                column.field_name = lookup_field_name(&column.field_name);
            }
            column
        })
        .collect()
}

/// Parse a JSON layout string and normalize it. Unparsable text yields no
/// columns.
pub fn normalize_columns_str(source: &str) -> Vec<ColumnDescriptor> {
    match serde_json::from_str::<Value>(source) {
        Ok(value) => normalize_columns(&value),
        Err(err) => {
            warn!(error = %err, "column layout is not valid JSON");
            Vec::new()
        }
    }
}

/// Entries `"0"..length` of an array-like object, in index order, skipping
/// holes.
fn array_like_entries(obj: &Map<String, Value>) -> Vec<&Value> {
    let length = match obj.get("length").and_then(Value::as_f64) {
        Some(len) if len.is_finite() && len > 0.0 => len,
        _ => return Vec::new(),
    };

    let mut indexed: Vec<(u64, &Value)> = obj
        .iter()
        .filter_map(|(k, v)| {
            let index: u64 = k.parse().ok()?;
            // "01" is not an array index
            (index.to_string() == *k && (index as f64) < length).then_some((index, v))
        })
        .filter(|(_, v)| crate::record::is_truthy(Some(v)))
        .collect();
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, v)| v).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn owner_column(field_name: &str) -> Value {
        json!({
            "key": "owner",
            "fieldName": field_name,
            "name": "Owner",
            "data": { "entityLinking": true }
        })
    }

    #[test]
    fn test_plain_array() {
        let cols = normalize_columns(&json!([
            { "key": "name", "fieldName": "name", "name": "Name", "minWidth": 100, "maxWidth": 200 },
            { "key": "city", "fieldName": "address1_city", "name": "City" }
        ]));
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].display_name, "Name");
        assert_eq!(cols[0].min_width, Some(100.0));
        assert_eq!(cols[1].field_name, "address1_city");
    }

    #[test]
    fn test_default_wrapper() {
        let cols = normalize_columns(&json!({
            "default": [{ "key": "name", "fieldName": "name", "name": "Name" }]
        }));
        assert_eq!(cols.len(), 1);
        assert_eq!(cols[0].key, "name");
    }

    #[test]
    fn test_array_like_object_skips_holes() {
        let cols = normalize_columns(&json!({
            "length": 4,
            "2": { "key": "c", "fieldName": "c", "name": "C" },
            "0": { "key": "a", "fieldName": "a", "name": "A" },
            "1": null,
            "7": { "key": "z", "fieldName": "z", "name": "Z" }
        }));
        let keys: Vec<&str> = cols.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn test_unrecognized_shapes_are_empty() {
        assert!(normalize_columns(&json!(null)).is_empty());
        assert!(normalize_columns(&json!("columns")).is_empty());
        assert!(normalize_columns(&json!({ "columns": [] })).is_empty());
        assert!(normalize_columns(&json!({ "length": "3" })).is_empty());
        assert!(normalize_columns_str("{ not json").is_empty());
    }

    #[test]
    fn test_entries_without_identity_are_skipped() {
        let cols = normalize_columns(&json!([
            { "name": "Nameless" },
            42,
            { "fieldName": "email", "name": "Email" }
        ]));
        assert_eq!(cols.len(), 1);
        assert_eq!(cols[0].key, "email");
    }

    #[test]
    fn test_entity_link_rewrite() {
        let cols = normalize_columns(&json!([owner_column("owner")]));
        assert_eq!(cols[0].field_name, "_owner_value");

        let cols = normalize_columns(&json!([owner_column("_owner_value")]));
        assert_eq!(cols[0].field_name, "_owner_value");
    }

    #[test]
    fn test_partial_lookup_convention_is_wrapped() {
        let cols = normalize_columns(&json!([owner_column("_owner")]));
        assert_eq!(cols[0].field_name, "__owner_value");
    }

    #[test]
    fn test_rewrite_requires_literal_true() {
        let cols = normalize_columns(&json!([{
            "key": "owner", "fieldName": "owner", "name": "Owner",
            "data": { "entityLinking": "true" }
        }]));
        assert_eq!(cols[0].field_name, "owner");
        assert!(!cols[0].entity_linking());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = json!({
            "default": [
                owner_column("owner"),
                {
                    "key": "full", "fieldName": "firstname", "name": "Full name",
                    "data": { "joinValuesFromTheseFields": ["lastname"], "dateFormat": "" }
                },
                { "key": "site", "fieldName": "websiteurl", "name": "Site",
                  "data": { "url": "[USE_VALUE]", "urlLinkText": "Visit" } }
            ]
        });
        let once = normalize_columns(&raw);
        let reparsed = serde_json::to_value(&once).unwrap();
        let twice = normalize_columns(&reparsed);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_does_not_mutate_input() {
        let raw = json!([owner_column("owner")]);
        let before = raw.clone();
        let _ = normalize_columns(&raw);
        assert_eq!(raw, before);
    }

    #[test]
    fn test_mistyped_options_read_as_unset() {
        let cols = normalize_columns(&json!([{
            "key": "k", "fieldName": 7, "name": null, "minWidth": "wide", "maxWidth": 300,
            "data": { "dateFormat": 5, "url": ["x"], "joinValuesFromTheseFields": ["a", 1, "b"] }
        }]));
        assert_eq!(cols.len(), 1);
        assert_eq!(cols[0].field_name, "k");
        assert_eq!(cols[0].display_name, "");
        assert_eq!(cols[0].min_width, None);
        assert_eq!(cols[0].max_width, Some(300.0));
        assert_eq!(cols[0].date_format(), None);
        assert_eq!(cols[0].url(), None);
        assert_eq!(cols[0].join_fields(), Some(&["a".to_string(), "b".to_string()][..]));
    }

    #[test]
    fn test_option_accessors() {
        let col = ColumnDescriptor::new("k", "f", "F").with_data(ColumnData {
            date_format: Some(String::new()),
            url: Some(String::new()),
            join_values_from_these_fields: Some(vec![]),
            ..Default::default()
        });
        assert_eq!(col.date_format(), None);
        assert_eq!(col.url(), None);
        assert_eq!(col.join_fields(), Some(&[][..]));
        assert!(!col.entity_linking());
    }
}
