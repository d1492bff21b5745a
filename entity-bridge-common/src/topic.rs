use crate::entity::EntityId;

/// Default topic prefix, matching the discovery prefix most consumers listen on.
pub const DEFAULT_PREFIX: &str = "homeassistant";

/// Segment that marks the inbound command namespace.
pub const CONTROL_SEGMENT: &str = "control";

/// Segment that marks the inbound request namespace.
pub const REQUEST_SEGMENT: &str = "request";

/// Verb appended to command topics advertised in discovery descriptors.
pub const SET_COMMAND: &str = "set";

/// Builder for the bridge's MQTT topics.
///
/// Outbound topics follow `<prefix>/<category>/<object_id>/<suffix>` and inbound
/// command topics follow `<prefix>/control/<category>/<object_id>/<command>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBuilder {
    prefix: String,
}

impl TopicBuilder {
    /// Create a builder with the given prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The topic prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Discovery descriptor topic for an entity.
    ///
    /// # Example
    /// ```
    /// use entity_bridge_common::{EntityId, TopicBuilder};
    ///
    /// let topics = TopicBuilder::new("home");
    /// let id = EntityId::parse("light.kitchen").unwrap();
    /// assert_eq!(topics.config_topic(&id), "home/light/kitchen/config");
    /// ```
    pub fn config_topic(&self, id: &EntityId) -> String {
        self.entity_topic(id, "config")
    }

    /// State topic for an entity.
    ///
    /// # Example
    /// ```
    /// use entity_bridge_common::{EntityId, TopicBuilder};
    ///
    /// let topics = TopicBuilder::new("home");
    /// let id = EntityId::parse("light.kitchen").unwrap();
    /// assert_eq!(topics.state_topic(&id), "home/light/kitchen/state");
    /// ```
    pub fn state_topic(&self, id: &EntityId) -> String {
        self.entity_topic(id, "state")
    }

    /// Command topic advertised to consumers for an entity.
    pub fn command_topic(&self, id: &EntityId) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.prefix,
            CONTROL_SEGMENT,
            id.category(),
            id.object_id(),
            SET_COMMAND
        )
    }

    /// Wildcard subscription for every inbound command.
    pub fn control_wildcard(&self) -> String {
        format!("{}/{}/#", self.prefix, CONTROL_SEGMENT)
    }

    /// Wildcard subscription for every inbound request.
    pub fn request_wildcard(&self) -> String {
        format!("{}/{}/#", self.prefix, REQUEST_SEGMENT)
    }

    /// All subscriptions the bridge holds while connected.
    pub fn subscriptions(&self) -> [String; 2] {
        [self.control_wildcard(), self.request_wildcard()]
    }

    /// Parse an inbound command topic.
    ///
    /// Returns `None` unless the topic is
    /// `<prefix>/control/<category>/<object_id>/<command>`. Object ids that
    /// would themselves span several segments are not supported.
    pub fn parse_control_topic<'a>(&self, topic: &'a str) -> Option<ControlTopic<'a>> {
        let rest = topic.strip_prefix(self.prefix.as_str())?.strip_prefix('/')?;
        let parts: Vec<&str> = rest.split('/').collect();

        if parts.len() < 3 || parts[0] != CONTROL_SEGMENT {
            return None;
        }

        // control / <middle segments> / command
        let middle = &parts[1..parts.len() - 1];
        if middle.len() != 2 {
            return None;
        }

        let entity_id = EntityId::parse(&middle.join(".")).ok()?;
        let command = parts[parts.len() - 1];
        if command.is_empty() {
            return None;
        }

        Some(ControlTopic { entity_id, command })
    }

    fn entity_topic(&self, id: &EntityId, suffix: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.prefix,
            id.category(),
            id.object_id(),
            suffix
        )
    }
}

impl Default for TopicBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

/// Parsed components of an inbound command topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlTopic<'a> {
    pub entity_id: EntityId,
    pub command: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> EntityId {
        EntityId::parse(raw).unwrap()
    }

    #[test]
    fn test_outbound_topics() {
        let topics = TopicBuilder::new("home");
        let light = id("light.kitchen");

        assert_eq!(topics.config_topic(&light), "home/light/kitchen/config");
        assert_eq!(topics.state_topic(&light), "home/light/kitchen/state");
        assert_eq!(
            topics.command_topic(&light),
            "home/control/light/kitchen/set"
        );
    }

    #[test]
    fn test_subscriptions() {
        let topics = TopicBuilder::new("home");
        assert_eq!(
            topics.subscriptions(),
            ["home/control/#".to_string(), "home/request/#".to_string()]
        );
    }

    #[test]
    fn test_default_prefix() {
        assert_eq!(TopicBuilder::default().prefix(), "homeassistant");
    }

    #[test]
    fn test_parse_control_topic() {
        let topics = TopicBuilder::new("home");
        let parsed = topics
            .parse_control_topic("home/control/switch/fan/set")
            .unwrap();

        assert_eq!(parsed.entity_id, id("switch.fan"));
        assert_eq!(parsed.command, "set");
    }

    #[test]
    fn test_parse_control_topic_with_nested_prefix() {
        let topics = TopicBuilder::new("site/a");
        let parsed = topics
            .parse_control_topic("site/a/control/light/porch/set")
            .unwrap();
        assert_eq!(parsed.entity_id, id("light.porch"));
    }

    #[test]
    fn test_parse_rejects_other_topics() {
        let topics = TopicBuilder::new("home");

        assert!(topics.parse_control_topic("home/light/kitchen/state").is_none());
        assert!(topics.parse_control_topic("home/request/light/kitchen/get").is_none());
        assert!(topics.parse_control_topic("other/control/light/kitchen/set").is_none());
        assert!(topics.parse_control_topic("homeX/control/light/kitchen/set").is_none());
        assert!(topics.parse_control_topic("home/control/set").is_none());
        assert!(topics.parse_control_topic("home/control/light/set").is_none());
        assert!(topics.parse_control_topic("home/control/light/kitchen/").is_none());
    }

    #[test]
    fn test_parse_rejects_multi_segment_object_id() {
        let topics = TopicBuilder::new("home");
        assert!(
            topics
                .parse_control_topic("home/control/light/kitchen/ceiling/set")
                .is_none()
        );
    }
}
