//! Level context delivered by the content store.
//!
//! Levels arrive as JSON. Stores are inconsistent about structured fields:
//! some return them parsed, others as JSON-encoded strings. Every structured
//! field here goes through [`json_or_string`], so both forms load the same.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::analysis::ComplexityClass;
use crate::error::CoreError;
use crate::victory::{SecondaryObjective, VictoryConditionSpec};

/// A node of the level's world graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelNode {
    pub id: String,
    /// Item lying on this node at the start, if any.
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// An edge of the level's world graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelEdge {
    pub from: String,
    pub to: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub directed: bool,
}

fn default_weight() -> f64 {
    1.0
}

fn default_lives() -> u32 {
    3
}

/// Everything the core needs to know about the level being played.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelContext {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "json_or_string")]
    pub nodes: Vec<LevelNode>,
    #[serde(default, deserialize_with = "json_or_string")]
    pub edges: Vec<LevelEdge>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default = "default_lives")]
    pub lives: u32,
    /// Block kinds the editor offers on this level (informational).
    #[serde(default, deserialize_with = "json_or_string")]
    pub enabled_blocks: Vec<String>,
    /// Per-algorithm inputs: capacity/weights/values for knapsack tasks,
    /// adjacency for search tasks, and so on.
    #[serde(default, deserialize_with = "json_or_string")]
    pub payload: BTreeMap<String, serde_json::Value>,
    #[serde(default, deserialize_with = "json_or_string")]
    pub victory_conditions: Vec<VictoryConditionSpec>,
    #[serde(default, deserialize_with = "json_or_string")]
    pub secondary_objectives: Vec<SecondaryObjective>,
    #[serde(default)]
    pub target_complexity: Option<ComplexityClass>,
}

impl LevelContext {
    /// Parses a level from JSON text, accepting a double-encoded document.
    pub fn from_json_str(text: &str) -> Result<Self, CoreError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let value = decode_json_value(value)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Looks up an algorithm input. Exact key first, then case-insensitive,
    /// then the derived `graph` adjacency when the payload has none.
    pub fn input(&self, key: &str) -> Option<serde_json::Value> {
        if let Some(v) = self.payload.get(key) {
            return Some(v.clone());
        }
        if let Some((_, v)) = self
            .payload
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            return Some(v.clone());
        }
        match key.to_ascii_lowercase().as_str() {
            "graph" | "adjacency" if !self.edges.is_empty() => Some(self.adjacency_json()),
            "start" => self.start.clone().map(serde_json::Value::String),
            "goal" => self.goal.clone().map(serde_json::Value::String),
            _ => None,
        }
    }

    /// Neighbours of `node` in edge declaration order.
    pub fn neighbors(&self, node: &str) -> Vec<String> {
        let mut out = Vec::new();
        for edge in &self.edges {
            if edge.from == node && !out.contains(&edge.to) {
                out.push(edge.to.clone());
            } else if !edge.directed && edge.to == node && !out.contains(&edge.from) {
                out.push(edge.from.clone());
            }
        }
        out
    }

    /// Adjacency map `{node: [neighbours]}` over every declared node.
    pub fn adjacency_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for node in &self.nodes {
            let list = self
                .neighbors(&node.id)
                .into_iter()
                .map(serde_json::Value::String)
                .collect();
            map.insert(node.id.clone(), serde_json::Value::Array(list));
        }
        serde_json::Value::Object(map)
    }
}

// ---------------------------------------------------------------------------
// Lenient decoding
// ---------------------------------------------------------------------------

/// Unwraps a JSON-encoded string into the value it encodes. Other values
/// pass through unchanged; an empty string decodes to `null`.
pub fn decode_json_value(value: serde_json::Value) -> Result<serde_json::Value, CoreError> {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(serde_json::Value::Null);
            }
            Ok(serde_json::from_str(trimmed)?)
        }
        other => Ok(other),
    }
}

/// Serde adapter accepting a field either parsed or as a JSON string.
/// `null` and `""` produce `T::default()`.
pub fn json_or_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    let decoded = decode_json_value(raw).map_err(serde::de::Error::custom)?;
    if decoded.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(decoded).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "name": "Forest",
            "nodes": [{"id": "A"}, {"id": "B", "item": "gem"}, {"id": "C"}],
            "edges": [{"from": "A", "to": "B"}, {"from": "B", "to": "C", "weight": 2}],
            "start": "A",
            "goal": "C",
            "payload": {"capacity": 10, "Weights": [1, 2]}
        })
    }

    #[test]
    fn parsed_and_string_encoded_fields_load_the_same() {
        let parsed: LevelContext = serde_json::from_value(sample()).unwrap();

        let mut encoded = sample();
        encoded["nodes"] = json!(encoded["nodes"].to_string());
        encoded["payload"] = json!(encoded["payload"].to_string());
        let from_strings: LevelContext = serde_json::from_value(encoded).unwrap();

        assert_eq!(parsed, from_strings);
        assert_eq!(parsed.lives, 3);
        assert_eq!(parsed.nodes[1].item.as_deref(), Some("gem"));
    }

    #[test]
    fn empty_string_field_defaults() {
        let mut value = sample();
        value["edges"] = json!("");
        let level: LevelContext = serde_json::from_value(value).unwrap();
        assert!(level.edges.is_empty());
    }

    #[test]
    fn input_lookup_falls_back() {
        let level: LevelContext = serde_json::from_value(sample()).unwrap();
        assert_eq!(level.input("capacity"), Some(json!(10)));
        assert_eq!(level.input("weights"), Some(json!([1, 2])));
        assert_eq!(level.input("graph"), Some(json!({"A": ["B"], "B": ["A", "C"], "C": ["B"]})));
        assert_eq!(level.input("start"), Some(json!("A")));
        assert_eq!(level.input("missing"), None);
    }

    #[test]
    fn whole_level_may_be_double_encoded() {
        let text = serde_json::to_string(&sample().to_string()).unwrap();
        let level = LevelContext::from_json_str(&text).unwrap();
        assert_eq!(level.name, "Forest");
    }
}
