//! The boundary between a running program and the world it acts on.
//!
//! Emitted code reaches outside the interpreter only through `input(..)`
//! and the `api.*` / `viz.*` receivers. The interpreter turns each of those
//! into a [`HostCall`] and hands it to its [`RuntimeHost`].

use std::fmt;

use blockquest_core::node::Sensor;
use blockquest_core::LevelContext;

use crate::error::RuntimeError;
use crate::value::Value;

/// A domain or visualization operation requested by the program.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    MoveTo { node: Value },
    Collect,
    Sense { sensor: Option<Sensor>, raw: String },
    TableSet { row: Value, col: Value, value: Value },
    FrontierPush { node: Value, priority: Value },
    FrontierSelect { node: Value },
}

const SENSORS: [Sensor; 4] = [Sensor::ItemHere, Sensor::AtGoal, Sensor::CurrentNode, Sensor::Neighbors];

impl HostCall {
    /// Decodes `receiver.method(args)`, or `None` for an unknown pair.
    pub fn decode(receiver: &str, method: &str, mut args: Vec<Value>) -> Option<HostCall> {
        args.resize(3, Value::Null);
        let mut args = args.into_iter();
        let mut next = move || args.next().unwrap_or_default();
        let call = match (receiver, method) {
            ("api", "moveTo") => HostCall::MoveTo { node: next() },
            ("api", "collect") => HostCall::Collect,
            ("api", "sense") => {
                let raw = next().to_string();
                let sensor = SENSORS.into_iter().find(|s| s.wire_name() == raw);
                HostCall::Sense { sensor, raw }
            }
            ("viz", "tableSet") => HostCall::TableSet {
                row: next(),
                col: next(),
                value: next(),
            },
            ("viz", "frontierPush") => HostCall::FrontierPush {
                node: next(),
                priority: next(),
            },
            ("viz", "frontierSelect") => HostCall::FrontierSelect { node: next() },
            _ => return None,
        };
        Some(call)
    }

    /// Whether the call feeds a visualization rather than the world.
    pub fn is_visualization(&self) -> bool {
        matches!(
            self,
            HostCall::TableSet { .. } | HostCall::FrontierPush { .. } | HostCall::FrontierSelect { .. }
        )
    }
}

impl fmt::Display for HostCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostCall::MoveTo { node } => write!(f, "api.moveTo({node})"),
            HostCall::Collect => write!(f, "api.collect()"),
            HostCall::Sense { raw, .. } => write!(f, "api.sense({raw})"),
            HostCall::TableSet { row, col, value } => write!(f, "viz.tableSet({row}, {col}, {value})"),
            HostCall::FrontierPush { node, priority } => write!(f, "viz.frontierPush({node}, {priority})"),
            HostCall::FrontierSelect { node } => write!(f, "viz.frontierSelect({node})"),
        }
    }
}

/// What the interpreter needs from its surroundings.
#[allow(async_fn_in_trait)]
pub trait RuntimeHost {
    /// Value of `input(key)`; `null` when the level has no such input.
    fn input(&self, key: &str) -> Value;

    /// Performs a domain or visualization operation. Implementations that
    /// animate suspend here; these are the only suspension points of a run.
    async fn perform(&mut self, call: HostCall) -> Result<Value, RuntimeError>;

    /// Checked before every statement.
    fn is_stopped(&self) -> bool {
        false
    }
}

/// Host for Pure evaluation: level inputs only, no world, never suspends.
#[derive(Debug, Clone, Copy, Default)]
pub struct PureHost<'l> {
    level: Option<&'l LevelContext>,
}

impl<'l> PureHost<'l> {
    pub fn new(level: Option<&'l LevelContext>) -> Self {
        PureHost { level }
    }
}

impl RuntimeHost for PureHost<'_> {
    fn input(&self, key: &str) -> Value {
        self.level
            .and_then(|level| level.input(key))
            .map_or(Value::Null, |json| Value::from_json(&json))
    }

    async fn perform(&mut self, call: HostCall) -> Result<Value, RuntimeError> {
        Err(RuntimeError::HostUnavailable {
            call: call.to_string(),
            reason: "pure evaluation has no world".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_calls() {
        let call = HostCall::decode("viz", "tableSet", vec![Value::Number(1.0), Value::Number(2.0)]).unwrap();
        assert_eq!(
            call,
            HostCall::TableSet {
                row: Value::Number(1.0),
                col: Value::Number(2.0),
                value: Value::Null,
            }
        );
        assert!(call.is_visualization());

        let sense = HostCall::decode("api", "sense", vec![Value::text("AT_GOAL")]).unwrap();
        assert!(matches!(sense, HostCall::Sense { sensor: Some(Sensor::AtGoal), .. }));
        assert!(HostCall::decode("api", "teleport", vec![]).is_none());
    }

    #[test]
    fn pure_host_reads_level_inputs() {
        let level: LevelContext = serde_json::from_value(serde_json::json!({
            "payload": {"capacity": 7}
        }))
        .unwrap();
        let host = PureHost::new(Some(&level));
        assert_eq!(host.input("capacity"), Value::Number(7.0));
        assert_eq!(host.input("missing"), Value::Null);
    }
}
