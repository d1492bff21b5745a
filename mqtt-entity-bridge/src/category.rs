//! Entity categories and the actions they translate commands into.
//!
//! Every category-specific behaviour hangs off [`Category`]: the discovery
//! fields it layers on the base descriptor live in [`crate::discovery`], its
//! command translator in [`crate::commands`]. Supporting a new category means
//! adding a variant here and handling it in both matches.

use std::fmt;

use entity_bridge_common::EntityId;

/// Entity category (the type prefix of an entity id).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    Light,
    Switch,
    Climate,
    Lock,
    Sensor,
    Cover,
    /// Any category without dedicated handling.
    Other(String),
}

impl Category {
    /// Parse a category name. Unknown names map to [`Category::Other`].
    pub fn parse(name: &str) -> Self {
        match name {
            "light" => Category::Light,
            "switch" => Category::Switch,
            "climate" => Category::Climate,
            "lock" => Category::Lock,
            "sensor" => Category::Sensor,
            "cover" => Category::Cover,
            other => Category::Other(other.to_string()),
        }
    }

    /// Get the category name as used in entity ids and topics.
    pub fn as_str(&self) -> &str {
        match self {
            Category::Light => "light",
            Category::Switch => "switch",
            Category::Climate => "climate",
            Category::Lock => "lock",
            Category::Sensor => "sensor",
            Category::Cover => "cover",
            Category::Other(name) => name,
        }
    }
}

impl From<&EntityId> for Category {
    fn from(id: &EntityId) -> Self {
        Category::parse(id.category())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Action requested from the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    TurnOn,
    TurnOff,
}

impl Action {
    /// Action name as understood by the host's action-invocation API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::TurnOn => "turn_on",
            Action::TurnOff => "turn_off",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
