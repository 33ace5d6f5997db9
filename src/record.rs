//! Records returned by the query API and their companion attributes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Suffix of the sibling attribute holding a display-friendly rendering.
pub const FORMATTED_VALUE_SUFFIX: &str = "@OData.Community.Display.V1.FormattedValue";
/// Suffix of the sibling attribute naming a lookup's target entity.
pub const LOOKUP_LOGICAL_NAME_SUFFIX: &str = "@Microsoft.Dynamics.CRM.lookuplogicalname";

/// Attribute injected by hosts that tag rows with a synthetic identity.
pub const ROW_ID_ATTRIBUTE: &str = "__rowId";

/// One row as returned by the query API: attribute name to JSON value.
///
/// Records are read-only for the whole crate; every derived value is computed
/// on the fly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self(attributes)
    }

    /// Build a record from a JSON value, rejecting anything but an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Attribute value, with JSON `null` folded into "absent".
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    /// Whether the attribute key exists at all, even when its value is `null`.
    pub fn has(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Raw formatted companion lookup; `Some(Value::Null)` when the key is
    /// present with a null value.
    pub fn formatted_entry(&self, name: &str) -> Option<&Value> {
        self.0.get(&format!("{name}{FORMATTED_VALUE_SUFFIX}"))
    }

    /// Formatted companion of `name`, only when it is truthy.
    pub fn formatted(&self, name: &str) -> Option<&Value> {
        self.formatted_entry(name).filter(|v| is_truthy(Some(v)))
    }

    /// Target entity type of the lookup stored in `field`, only when truthy.
    pub fn lookup_logical_name(&self, field: &str) -> Option<&Value> {
        self.0
            .get(&format!("{field}{LOOKUP_LOGICAL_NAME_SUFFIX}"))
            .filter(|v| is_truthy(Some(v)))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Parse a JSON array of objects into records. Non-object entries are dropped.
pub fn records_from_json(source: &str) -> Result<Vec<Record>, serde_json::Error> {
    let value: Value = serde_json::from_str(source)?;
    let rows = match value {
        Value::Array(items) => items.into_iter().filter_map(Record::from_value).collect(),
        // Query API envelope: { "entities": [...] } or { "value": [...] }
        Value::Object(mut map) => match map.remove("entities").or_else(|| map.remove("value")) {
            Some(Value::Array(items)) => items.into_iter().filter_map(Record::from_value).collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    Ok(rows)
}

/// Companion and internal attributes that never carry user data.
pub fn is_metadata_key(key: &str) -> bool {
    key.contains('@') || key == ROW_ID_ATTRIBUTE
}

/// JavaScript truthiness of an optional JSON value.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Text form of a value as the grid displays it. `null` renders as nothing.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_text(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

fn number_text(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        // f64 Display already drops a trailing ".0"
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

#[cfg(test)]
pub(crate) fn record(value: Value) -> Record {
    Record::from_value(value).expect("test record must be an object")
}
