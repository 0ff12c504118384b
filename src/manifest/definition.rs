//! Definition records and hash-keyed tables.
//!
//! Upstream definitions vary by table and by entry, so a [`Definition`]
//! only names the fields the loader itself reads (display properties and
//! the category tags used for chunking) and keeps everything else in
//! `extra`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::{CryptarchError, Result};

/// Name, description and icon shared by most definition types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayProperties {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub has_icon: bool,
}

/// A loosely typed definition record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    #[serde(default)]
    pub hash: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_properties: DisplayProperties,
    /// Numeric item type (items only).
    #[serde(default)]
    pub item_type: Option<i64>,
    /// Item category tags (items only).
    #[serde(default, deserialize_with = "null_as_default")]
    pub item_category_hashes: Vec<u32>,
    /// Every other field, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Definition {
    pub fn name(&self) -> Option<&str> {
        self.display_properties.name.as_deref()
    }
}

/// Immutable hash → definition mapping for one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefinitionTable {
    name: String,
    entries: HashMap<u32, Arc<Definition>>,
}

impl DefinitionTable {
    pub fn new(name: impl Into<String>, entries: HashMap<u32, Arc<Definition>>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    /// An empty table, the stand-in for one that failed to load.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, HashMap::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, hash: u32) -> Option<&Arc<Definition>> {
        self.entries.get(&hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &Arc<Definition>)> {
        self.entries.iter()
    }
}

/// Parse a table payload into a [`DefinitionTable`].
///
/// The payload is either the bare hash map or the upstream envelope
/// carrying it under `Response`. Keys are decimal hashes. Some tables key
/// by the signed reinterpretation of the hash, so negative keys are mapped
/// back to `u32`. Keys that are not numbers, and entries that do not
/// decode, are skipped without failing the rest of the table.
pub fn parse_table(name: &str, json: &str) -> Result<DefinitionTable> {
    let raw = match serde_json::from_str::<Value>(json)? {
        Value::Object(mut payload) => match payload.remove("Response") {
            Some(Value::Object(response)) => response,
            Some(other) => {
                return Err(CryptarchError::Decode(format!(
                    "table {name}: `Response` is {}, expected an object",
                    kind(&other)
                )));
            }
            None => payload,
        },
        other => {
            return Err(CryptarchError::Decode(format!(
                "table {name}: payload is {}, expected an object",
                kind(&other)
            )));
        }
    };

    let mut entries = HashMap::with_capacity(raw.len());
    for (key, value) in raw {
        let Some(hash) = parse_hash(&key) else {
            warn!(table = name, key = %key, "skipping non-numeric definition key");
            continue;
        };
        match serde_json::from_value::<Definition>(value) {
            Ok(definition) => {
                entries.insert(hash, Arc::new(definition));
            }
            Err(e) => warn!(table = name, key = %key, error = %e, "skipping malformed definition"),
        }
    }
    Ok(DefinitionTable::new(name, entries))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_hash(key: &str) -> Option<u32> {
    key.parse::<u32>()
        .ok()
        .or_else(|| key.parse::<i32>().ok().map(|signed| signed as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_table() {
        let json = r#"{
            "1498876634": {"hash": 1498876634, "displayProperties": {"name": "Stability", "hasIcon": false}},
            "4284893193": {"displayProperties": {"name": "Rounds Per Minute"}}
        }"#;
        let table = parse_table("DestinyStatDefinition", json).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1_498_876_634).unwrap().name(), Some("Stability"));
        assert_eq!(table.name(), "DestinyStatDefinition");
    }

    #[test]
    fn parses_wrapped_table() {
        let json = r#"{"Response": {"3": {"displayProperties": {"name": "Solar"}}}, "ErrorCode": 1}"#;
        let table = parse_table("DestinyDamageTypeDefinition", json).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(3).unwrap().name(), Some("Solar"));
    }

    #[test]
    fn negative_keys_map_to_unsigned() {
        let table = parse_table("t", r#"{"-1": {}}"#).unwrap();
        assert!(table.get(u32::MAX).is_some());
    }

    #[test]
    fn non_numeric_keys_skipped() {
        let table = parse_table("t", r#"{"abc": {}, "7": {}}"#).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.get(7).is_some());
    }

    #[test]
    fn unknown_fields_preserved() {
        let table = parse_table(
            "t",
            r#"{"9": {"itemType": 3, "itemCategoryHashes": [1, 2], "inventory": {"tierType": 6}}}"#,
        )
        .unwrap();
        let def = table.get(9).unwrap();
        assert_eq!(def.item_type, Some(3));
        assert_eq!(def.item_category_hashes, vec![1, 2]);
        assert_eq!(def.extra["inventory"]["tierType"], 6);
    }

    #[test]
    fn invalid_payload_is_error() {
        assert!(parse_table("t", "[1, 2, 3]").is_err());
        assert!(parse_table("t", "not json").is_err());
    }

    #[test]
    fn null_known_fields_fall_back_to_defaults() {
        let table = parse_table(
            "t",
            r#"{"1": {"itemType": 3, "itemCategoryHashes": [1]},
                "2": {"itemType": 2, "itemCategoryHashes": null, "displayProperties": null}}"#,
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1).unwrap().item_category_hashes, vec![1]);
        let second = table.get(2).unwrap();
        assert!(second.item_category_hashes.is_empty());
        assert_eq!(second.name(), None);
    }

    #[test]
    fn malformed_entry_skipped_rest_kept() {
        let table = parse_table(
            "t",
            r#"{"1": {"itemType": 3}, "2": {"itemType": "three"}, "3": 42, "4": {"hash": -5}}"#,
        )
        .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(1).unwrap().item_type, Some(3));
    }

    #[test]
    fn payload_errors_name_the_problem() {
        let err = parse_table("DestinyStatDefinition", r#"{"Response": [1]}"#).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("DestinyStatDefinition"), "{message}");
        assert!(message.contains("Response"), "{message}");
        assert!(message.contains("an array"), "{message}");

        let err = parse_table("t", "{\"1\": ").unwrap_err();
        assert!(matches!(err, CryptarchError::Decode(_)));
    }
}
