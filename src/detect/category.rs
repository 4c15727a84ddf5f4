use std::fmt;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Label map shipped with the camera-trap detector.
pub const DEFAULT_LABEL_MAP: &[(u32, &str)] = &[(1, "animal"), (2, "person"), (3, "vehicle")];

/// Detected object category.
///
/// Serialized as the decimal class id string (`"1"`), which is what the
/// detector's output format uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    Animal,
    Person,
    Vehicle,
    Other(u32),
}

impl Category {
    pub fn from_id(id: u32) -> Self {
        match id {
            1 => Category::Animal,
            2 => Category::Person,
            3 => Category::Vehicle,
            other => Category::Other(other),
        }
    }

    pub fn id(self) -> u32 {
        match self {
            Category::Animal => 1,
            Category::Person => 2,
            Category::Vehicle => 3,
            Category::Other(id) => id,
        }
    }

    /// Human-readable label from [`DEFAULT_LABEL_MAP`], `"unknown"` otherwise.
    pub fn label(self) -> &'static str {
        DEFAULT_LABEL_MAP
            .iter()
            .find(|(id, _)| *id == self.id())
            .map(|(_, label)| *label)
            .unwrap_or("unknown")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.to_string()
    }
}

impl TryFrom<String> for Category {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        let id: u32 = value
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid category id: {:?}", value))?;
        Ok(Category::from_id(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_enum() {
        for id in 0..6 {
            assert_eq!(Category::from_id(id).id(), id);
        }
        assert_eq!(Category::from_id(1), Category::Animal);
        assert_eq!(Category::from_id(7), Category::Other(7));
    }

    #[test]
    fn labels_follow_default_map() {
        assert_eq!(Category::Animal.label(), "animal");
        assert_eq!(Category::Person.label(), "person");
        assert_eq!(Category::Vehicle.label(), "vehicle");
        assert_eq!(Category::Other(9).label(), "unknown");
    }

    #[test]
    fn serializes_as_id_string() -> Result<()> {
        assert_eq!(serde_json::to_string(&Category::Animal)?, "\"1\"");
        let parsed: Category = serde_json::from_str("\"2\"")?;
        assert_eq!(parsed, Category::Person);
        assert!(serde_json::from_str::<Category>("\"moose\"").is_err());
        Ok(())
    }
}
