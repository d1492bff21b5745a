use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Characters that would corrupt a topic if they appeared inside an id part.
const RESERVED_CHARS: [char; 3] = ['/', '+', '#'];

/// Attribute values are heterogeneous, so they are carried as raw JSON.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// A validated entity id of the form `<category>.<object_id>`.
///
/// The id is split on the first `.` only, so `sensor.outdoor.temp` has the
/// category `sensor` and the object id `outdoor.temp`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    category: String,
    object_id: String,
}

impl EntityId {
    /// Parse and validate an entity id.
    ///
    /// # Example
    /// ```
    /// use entity_bridge_common::EntityId;
    ///
    /// let id = EntityId::parse("light.kitchen").unwrap();
    /// assert_eq!(id.category(), "light");
    /// assert_eq!(id.object_id(), "kitchen");
    /// ```
    pub fn parse(raw: &str) -> Result<Self> {
        let (category, object_id) = raw
            .split_once('.')
            .ok_or_else(|| Error::InvalidEntityId(raw.to_string()))?;

        let valid = |part: &str| !part.is_empty() && !part.contains(RESERVED_CHARS);
        if !valid(category) || !valid(object_id) {
            return Err(Error::InvalidEntityId(raw.to_string()));
        }

        Ok(Self {
            category: category.to_string(),
            object_id: object_id.to_string(),
        })
    }

    /// Build an id from already separated parts.
    pub fn from_parts(category: &str, object_id: &str) -> Result<Self> {
        Self::parse(&format!("{}.{}", category, object_id))
    }

    /// The category (type prefix), e.g. `light`.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// The object id, e.g. `kitchen`.
    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.category, self.object_id)
    }
}

impl FromStr for EntityId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Point-in-time capture of one entity's state.
///
/// Serializes to the state topic payload:
/// `{entity_id, state, attributes, last_changed, last_updated}` with
/// timestamps in ISO-8601 or `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Full entity id (`category.object_id`).
    pub entity_id: String,

    /// Primary state value (e.g. "on", "21.5", "locked").
    pub state: String,

    /// Attribute mapping.
    #[serde(default)]
    pub attributes: Attributes,

    /// When the primary state last changed.
    #[serde(default)]
    pub last_changed: Option<DateTime<Utc>>,

    /// When the snapshot was last refreshed (state or attributes).
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl EntitySnapshot {
    /// Create a snapshot with no attributes and no timestamps.
    pub fn new(entity_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
            attributes: Attributes::new(),
            last_changed: None,
            last_updated: None,
        }
    }

    /// Add an attribute to this snapshot.
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set both timestamps.
    pub fn with_timestamps(mut self, last_changed: DateTime<Utc>, last_updated: DateTime<Utc>) -> Self {
        self.last_changed = Some(last_changed);
        self.last_updated = Some(last_updated);
        self
    }

    /// Parse the entity id of this snapshot.
    pub fn id(&self) -> Result<EntityId> {
        EntityId::parse(&self.entity_id)
    }

    /// Look up a string attribute.
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    /// Whether an attribute is present (any value, including null).
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_entity_id() {
        let id = EntityId::parse("switch.fan").unwrap();
        assert_eq!(id.category(), "switch");
        assert_eq!(id.object_id(), "fan");
        assert_eq!(id.to_string(), "switch.fan");
    }

    #[test]
    fn test_parse_splits_on_first_separator() {
        let id = EntityId::parse("sensor.outdoor.temp").unwrap();
        assert_eq!(id.category(), "sensor");
        assert_eq!(id.object_id(), "outdoor.temp");
    }

    #[test]
    fn test_parse_invalid_entity_ids() {
        for raw in ["", "light", ".kitchen", "light.", "light.kit/chen", "li+ght.x", "a.#"] {
            assert!(
                matches!(EntityId::parse(raw), Err(Error::InvalidEntityId(_))),
                "expected '{}' to be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_snapshot_serialization() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let snapshot = EntitySnapshot::new("light.kitchen", "on")
            .with_attribute("brightness", 120)
            .with_timestamps(ts, ts);

        let json: serde_json::Value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["entity_id"], "light.kitchen");
        assert_eq!(json["state"], "on");
        assert_eq!(json["attributes"]["brightness"], 120);
        assert_eq!(json["last_changed"], "2024-05-01T12:00:00Z");
        assert_eq!(json["last_updated"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_snapshot_missing_timestamps_are_null() {
        let snapshot = EntitySnapshot::new("switch.fan", "off");
        let json: serde_json::Value = serde_json::to_value(&snapshot).unwrap();

        assert!(json["last_changed"].is_null());
        assert!(json["last_updated"].is_null());
        assert!(json["attributes"].as_object().unwrap().is_empty());
    }
}
