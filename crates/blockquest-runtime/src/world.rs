//! Simulated level world: an agent walking the level graph.

use std::collections::BTreeMap;

use blockquest_core::node::Sensor;
use blockquest_core::LevelContext;
use serde::{Deserialize, Serialize};

/// Result of one move request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveOutcome {
    Moved,
    /// Not adjacent, unknown node, or no agent position; costs a life.
    Invalid,
    /// The invalid move took the last life.
    Defeated,
}

/// Final state of the world after a run, as handed to the outcome layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub agent_node: Option<String>,
    pub lives: u32,
    pub moves: u32,
    pub collected: Vec<String>,
    /// Items still lying on the map, by node.
    pub remaining_items: BTreeMap<String, String>,
    pub visited: Vec<String>,
}

impl WorldState {
    pub fn is_defeated(&self) -> bool {
        self.lives == 0
    }
}

/// Mutable world for one run.
#[derive(Debug, Clone)]
pub struct World {
    level: LevelContext,
    state: WorldState,
}

impl World {
    pub fn new(level: LevelContext) -> Self {
        let remaining_items = level
            .nodes
            .iter()
            .filter_map(|node| node.item.clone().map(|item| (node.id.clone(), item)))
            .collect();
        let agent_node = level
            .start
            .clone()
            .or_else(|| level.nodes.first().map(|n| n.id.clone()));
        let state = WorldState {
            visited: agent_node.iter().cloned().collect(),
            agent_node,
            lives: level.lives,
            moves: 0,
            collected: Vec::new(),
            remaining_items,
        };
        World { level, state }
    }

    pub fn level(&self) -> &LevelContext {
        &self.level
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn into_state(self) -> WorldState {
        self.state
    }

    fn knows(&self, node: &str) -> bool {
        self.level.nodes.iter().any(|n| n.id == node)
    }

    /// Moves the agent along an edge to `node`.
    pub fn move_to(&mut self, node: &str) -> MoveOutcome {
        if self.state.is_defeated() {
            return MoveOutcome::Defeated;
        }
        let adjacent = match &self.state.agent_node {
            Some(current) => current == node || self.level.neighbors(current).iter().any(|n| n == node),
            None => false,
        };
        if adjacent && self.knows(node) {
            self.state.agent_node = Some(node.to_string());
            self.state.moves += 1;
            self.state.visited.push(node.to_string());
            return MoveOutcome::Moved;
        }
        self.state.lives = self.state.lives.saturating_sub(1);
        if self.state.is_defeated() {
            MoveOutcome::Defeated
        } else {
            MoveOutcome::Invalid
        }
    }

    /// Picks up the item on the agent's node, if any.
    pub fn collect(&mut self) -> Option<String> {
        let node = self.state.agent_node.clone()?;
        let item = self.state.remaining_items.remove(&node)?;
        self.state.collected.push(item.clone());
        Some(item)
    }

    pub fn sense(&self, sensor: Sensor) -> serde_json::Value {
        let here = self.state.agent_node.as_deref();
        match sensor {
            Sensor::ItemHere => {
                serde_json::Value::Bool(here.is_some_and(|n| self.state.remaining_items.contains_key(n)))
            }
            Sensor::AtGoal => {
                serde_json::Value::Bool(here.is_some() && here == self.level.goal.as_deref())
            }
            Sensor::CurrentNode => here.map_or(serde_json::Value::Null, |n| serde_json::Value::String(n.to_string())),
            Sensor::Neighbors => serde_json::Value::Array(
                here.map(|n| self.level.neighbors(n))
                    .unwrap_or_default()
                    .into_iter()
                    .map(serde_json::Value::String)
                    .collect(),
            ),
        }
    }
}
