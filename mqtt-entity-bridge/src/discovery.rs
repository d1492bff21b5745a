//! Discovery descriptor synthesis.
//!
//! A descriptor tells consumers how to read an entity's state topic and where
//! to send commands. It is rebuilt from the snapshot on every publish.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use entity_bridge_common::{EntityId, EntitySnapshot, TopicBuilder};

use crate::category::Category;

/// Template extracting the primary state from the state payload.
pub const STATE_TEMPLATE: &str = "{{ value_json.state }}";

/// Template extracting the attribute map from the state payload.
pub const ATTRIBUTES_TEMPLATE: &str = "{{ value_json.attributes | tojson }}";

const LOCK_STATE_TEMPLATE: &str =
    "{{ 'locked' if value_json.state == 'locked' else 'unlocked' }}";
const CURRENT_TEMPERATURE_TEMPLATE: &str = "{{ value_json.attributes.current_temperature }}";
const TARGET_TEMPERATURE_TEMPLATE: &str = "{{ value_json.attributes.temperature }}";
const HVAC_ACTION_TEMPLATE: &str = "{{ value_json.attributes.hvac_action }}";

const DEFAULT_CLIMATE_MODES: [&str; 3] = ["heat", "cool", "off"];

/// Category-specific discovery metadata.
///
/// Never contains a key whose value is `null` or an empty string. Keys are
/// kept sorted so identical snapshots serialize to identical bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DiscoveryDescriptor(BTreeMap<String, Value>);

impl DiscoveryDescriptor {
    /// Look up a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether a field is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterate over the fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the descriptor has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Accumulates fields, then drops the empty ones on [`build`](Self::build).
#[derive(Debug, Default)]
struct DescriptorBuilder {
    fields: BTreeMap<String, Value>,
}

impl DescriptorBuilder {
    fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    fn set_attribute(&mut self, key: &str, snapshot: &EntitySnapshot, attribute: &str) -> &mut Self {
        let value = snapshot.attributes.get(attribute).cloned().unwrap_or(Value::Null);
        self.set(key, value)
    }

    fn build(self) -> DiscoveryDescriptor {
        let fields = self
            .fields
            .into_iter()
            .filter(|(_, value)| !is_blank(value))
            .collect();
        DiscoveryDescriptor(fields)
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Build the discovery descriptor for an entity.
///
/// Pure and deterministic: the same inputs always give the same descriptor.
pub fn synthesize(
    topics: &TopicBuilder,
    id: &EntityId,
    snapshot: &EntitySnapshot,
) -> DiscoveryDescriptor {
    let state_topic = topics.state_topic(id);
    let mut builder = DescriptorBuilder::default();

    builder
        .set("name", display_name(id, snapshot))
        .set("unique_id", unique_id(topics, id))
        .set("state_topic", state_topic.as_str())
        .set("json_attributes_topic", state_topic.as_str())
        .set("json_attributes_template", ATTRIBUTES_TEMPLATE)
        .set("value_template", STATE_TEMPLATE)
        .set_attribute("icon", snapshot, "icon")
        .set_attribute("device_class", snapshot, "device_class");

    Category::from(id).layer_discovery(&mut builder, topics, id, snapshot);

    builder.build()
}

impl Category {
    fn layer_discovery(
        &self,
        builder: &mut DescriptorBuilder,
        topics: &TopicBuilder,
        id: &EntityId,
        snapshot: &EntitySnapshot,
    ) {
        let state_topic = topics.state_topic(id);

        match self {
            Category::Light => {
                builder
                    .set("command_topic", topics.command_topic(id))
                    .set("payload_on", "on")
                    .set("payload_off", "off")
                    .set("brightness", snapshot.has_attribute("brightness"))
                    .set("color_temp", snapshot.has_attribute("color_temp"))
                    .set("color_mode", snapshot.has_attribute("color_mode"));
            }
            Category::Switch => {
                builder
                    .set("command_topic", topics.command_topic(id))
                    .set("payload_on", "on")
                    .set("payload_off", "off");
            }
            Category::Climate => {
                builder
                    .set("command_topic", topics.command_topic(id))
                    .set("current_temperature_topic", state_topic.as_str())
                    .set("current_temperature_template", CURRENT_TEMPERATURE_TEMPLATE)
                    .set("temperature_state_topic", state_topic.as_str())
                    .set("temperature_state_template", TARGET_TEMPERATURE_TEMPLATE)
                    .set("mode_state_topic", state_topic.as_str())
                    .set("mode_state_template", STATE_TEMPLATE)
                    .set("modes", climate_modes(snapshot))
                    .set("action_topic", state_topic.as_str())
                    .set("action_template", HVAC_ACTION_TEMPLATE);
            }
            Category::Lock => {
                builder
                    .set("command_topic", topics.command_topic(id))
                    .set("payload_lock", "lock")
                    .set("payload_unlock", "unlock")
                    .set("state_locked", "locked")
                    .set("state_unlocked", "unlocked")
                    .set("value_template", LOCK_STATE_TEMPLATE);
            }
            Category::Sensor => {
                // Read-only: no command topic
                builder
                    .set_attribute("unit_of_measurement", snapshot, "unit_of_measurement")
                    .set_attribute("state_class", snapshot, "state_class")
                    .set("value_template", STATE_TEMPLATE);
            }
            Category::Cover => {
                builder
                    .set("command_topic", topics.command_topic(id))
                    .set("payload_open", "open")
                    .set("payload_close", "close")
                    .set("payload_stop", "stop");
            }
            Category::Other(_) => {}
        }
    }
}

/// The `friendly_name` attribute, or a name derived from the object id.
fn display_name(id: &EntityId, snapshot: &EntitySnapshot) -> String {
    match snapshot.attribute_str("friendly_name") {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => derive_display_name(id.object_id()),
    }
}

/// Turn an object id into a title-cased name: `living_room-lamp` -> `Living Room Lamp`.
pub fn derive_display_name(object_id: &str) -> String {
    object_id
        .split(['_', '-', '.'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn unique_id(topics: &TopicBuilder, id: &EntityId) -> String {
    format!(
        "{}_{}_{}",
        topics.prefix().replace('/', "_"),
        id.category(),
        id.object_id()
    )
}

fn climate_modes(snapshot: &EntitySnapshot) -> Value {
    let modes: Vec<&str> = snapshot
        .attributes
        .get("hvac_modes")
        .and_then(Value::as_array)
        .map(|modes| modes.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if modes.is_empty() {
        DEFAULT_CLIMATE_MODES.to_vec().into()
    } else {
        modes.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn describe(prefix: &str, snapshot: &EntitySnapshot) -> DiscoveryDescriptor {
        let id = snapshot.id().unwrap();
        synthesize(&TopicBuilder::new(prefix), &id, snapshot)
    }

    #[test]
    fn test_light_descriptor() {
        let snapshot = EntitySnapshot::new("light.kitchen", "on")
            .with_attribute("friendly_name", "Kitchen")
            .with_attribute("brightness", 120);
        let descriptor = describe("home", &snapshot);

        assert_eq!(descriptor.get("name").unwrap(), "Kitchen");
        assert_eq!(descriptor.get("unique_id").unwrap(), "home_light_kitchen");
        assert_eq!(descriptor.get("state_topic").unwrap(), "home/light/kitchen/state");
        assert_eq!(
            descriptor.get("command_topic").unwrap(),
            "home/control/light/kitchen/set"
        );
        assert_eq!(descriptor.get("payload_on").unwrap(), "on");
        assert_eq!(descriptor.get("payload_off").unwrap(), "off");
        assert_eq!(descriptor.get("brightness").unwrap(), true);
        assert_eq!(descriptor.get("color_temp").unwrap(), false);
        assert_eq!(descriptor.get("color_mode").unwrap(), false);
    }

    #[test]
    fn test_light_capabilities_follow_attributes() {
        let snapshot = EntitySnapshot::new("light.desk", "off")
            .with_attribute("color_temp", 370)
            .with_attribute("color_mode", "color_temp");
        let descriptor = describe("home", &snapshot);

        assert_eq!(descriptor.get("brightness").unwrap(), false);
        assert_eq!(descriptor.get("color_temp").unwrap(), true);
        assert_eq!(descriptor.get("color_mode").unwrap(), true);
    }

    #[test]
    fn test_switch_descriptor() {
        let descriptor = describe("home", &EntitySnapshot::new("switch.fan", "off"));

        assert_eq!(descriptor.get("command_topic").unwrap(), "home/control/switch/fan/set");
        assert_eq!(descriptor.get("payload_on").unwrap(), "on");
        assert!(!descriptor.contains_key("brightness"));
    }

    #[test]
    fn test_climate_default_modes() {
        let snapshot = EntitySnapshot::new("climate.hall", "heat")
            .with_attribute("current_temperature", 19.5)
            .with_attribute("temperature", 21);
        let descriptor = describe("home", &snapshot);

        assert_eq!(
            descriptor.get("modes").unwrap(),
            &serde_json::json!(["heat", "cool", "off"])
        );
        assert_eq!(
            descriptor.get("current_temperature_topic").unwrap(),
            "home/climate/hall/state"
        );
        assert_eq!(
            descriptor.get("current_temperature_template").unwrap(),
            CURRENT_TEMPERATURE_TEMPLATE
        );
        assert_eq!(descriptor.get("action_template").unwrap(), HVAC_ACTION_TEMPLATE);
        assert!(descriptor.contains_key("command_topic"));
    }

    #[test]
    fn test_climate_modes_from_attributes() {
        let snapshot = EntitySnapshot::new("climate.hall", "auto")
            .with_attribute("hvac_modes", serde_json::json!(["auto", "off"]));
        let descriptor = describe("home", &snapshot);

        assert_eq!(descriptor.get("modes").unwrap(), &serde_json::json!(["auto", "off"]));
    }

    #[test]
    fn test_lock_descriptor() {
        let descriptor = describe("home", &EntitySnapshot::new("lock.front_door", "locked"));

        assert_eq!(descriptor.get("payload_lock").unwrap(), "lock");
        assert_eq!(descriptor.get("payload_unlock").unwrap(), "unlock");
        assert_eq!(descriptor.get("value_template").unwrap(), LOCK_STATE_TEMPLATE);
        assert_eq!(descriptor.get("name").unwrap(), "Front Door");
    }

    #[test]
    fn test_sensor_is_read_only() {
        let snapshot = EntitySnapshot::new("sensor.outdoor_temp", "21.5")
            .with_attribute("unit_of_measurement", "°C")
            .with_attribute("device_class", "temperature");
        let descriptor = describe("home", &snapshot);

        assert!(!descriptor.contains_key("command_topic"));
        assert_eq!(descriptor.get("unit_of_measurement").unwrap(), "°C");
        assert_eq!(descriptor.get("device_class").unwrap(), "temperature");
        assert_eq!(descriptor.get("value_template").unwrap(), STATE_TEMPLATE);
    }

    #[test]
    fn test_cover_descriptor() {
        let descriptor = describe("home", &EntitySnapshot::new("cover.garage", "closed"));

        assert_eq!(descriptor.get("payload_open").unwrap(), "open");
        assert_eq!(descriptor.get("payload_close").unwrap(), "close");
        assert_eq!(descriptor.get("payload_stop").unwrap(), "stop");
    }

    #[test]
    fn test_other_category_has_base_fields_only() {
        let descriptor = describe("home", &EntitySnapshot::new("vacuum.robot", "docked"));

        assert!(!descriptor.contains_key("command_topic"));
        assert_eq!(descriptor.get("name").unwrap(), "Robot");
        assert_eq!(descriptor.len(), 6);
    }

    #[test]
    fn test_blank_values_are_stripped() {
        let snapshot = EntitySnapshot::new("sensor.power", "12")
            .with_attribute("friendly_name", "")
            .with_attribute("icon", serde_json::Value::Null)
            .with_attribute("unit_of_measurement", "");
        let descriptor = describe("home", &snapshot);

        assert!(!descriptor.contains_key("icon"));
        assert!(!descriptor.contains_key("device_class"));
        assert!(!descriptor.contains_key("unit_of_measurement"));
        assert_eq!(descriptor.get("name").unwrap(), "Power");
        assert!(descriptor.iter().all(|(_, v)| !is_blank(v)));
    }

    #[test]
    fn test_derive_display_name() {
        assert_eq!(derive_display_name("kitchen"), "Kitchen");
        assert_eq!(derive_display_name("living_room-lamp"), "Living Room Lamp");
        assert_eq!(derive_display_name("TV__backlight"), "Tv Backlight");
    }

    #[test]
    fn test_unique_id_flattens_nested_prefix() {
        let descriptor = describe("site/a", &EntitySnapshot::new("switch.pump", "on"));
        assert_eq!(descriptor.get("unique_id").unwrap(), "site_a_switch_pump");
    }
}
