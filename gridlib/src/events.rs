//! Typed simulation events.
//!
//! On the wire an event is `{type, payload, severity, createdAt}` with a free-form payload. It is
//! decoded once, when it enters the engine, into an [`EventKind`] variant carrying typed fields.
use crate::graph::NetworkNode;
use crate::types::{Load, Severity, Utilization, MAX_SEVERITY};
use crate::{GridError, Result};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Element of the network that an event acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Node(String),
    Edge(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Sets the demand of a node.
    DemandChange { node_id: String, demand: Load },
    /// Marks a node inactive.
    NodeFailure { node_id: String },
    /// Marks a node active.
    NodeRecovery { node_id: String },
    /// Multiplies a node's demand or an edge's flow.
    Overload {
        target: Target,
        multiplier: Option<f64>,
    },
    /// Sets the capacity of a node or an edge.
    CapacityChange { target: Target, capacity: Load },
    CriticalOverload {
        node_id: String,
        utilization: Utilization,
        demand: Load,
        capacity: Load,
    },
    CriticalEdgeOverload {
        edge_id: String,
        utilization: Utilization,
        current_flow: Load,
        capacity: Load,
    },
    CriticalNodeFailure {
        inactive_count: usize,
        inactive_nodes: Vec<String>,
    },
    /// An event type the engine does not know. Kept so that it can be reported and re-encoded.
    Unknown {
        type_name: String,
        payload: Map<String, Value>,
    },
}

impl EventKind {
    /// Wire name of the event type.
    pub fn type_name(&self) -> &str {
        match self {
            EventKind::DemandChange { .. } => "demand_change",
            EventKind::NodeFailure { .. } => "node_failure",
            EventKind::NodeRecovery { .. } => "node_recovery",
            EventKind::Overload { .. } => "overload",
            EventKind::CapacityChange { .. } => "capacity_change",
            EventKind::CriticalOverload { .. } => "critical_overload",
            EventKind::CriticalEdgeOverload { .. } => "critical_edge_overload",
            EventKind::CriticalNodeFailure { .. } => "critical_node_failure",
            EventKind::Unknown { type_name, .. } => type_name,
        }
    }

    fn decode(type_name: String, payload: Map<String, Value>) -> Result<EventKind> {
        let p = Payload {
            type_name: &type_name,
            map: &payload,
        };
        let kind = match type_name.as_str() {
            "demand_change" => EventKind::DemandChange {
                node_id: p.string("nodeId")?,
                demand: p.number("demand")?,
            },
            "node_failure" => EventKind::NodeFailure {
                node_id: p.string("nodeId")?,
            },
            "node_recovery" => EventKind::NodeRecovery {
                node_id: p.string("nodeId")?,
            },
            "overload" => EventKind::Overload {
                target: p.target()?,
                multiplier: p.optional_number("multiplier")?,
            },
            "capacity_change" => EventKind::CapacityChange {
                target: p.target()?,
                capacity: p.number("capacity")?,
            },
            "critical_overload" => EventKind::CriticalOverload {
                node_id: p.string("nodeId")?,
                utilization: p.number("utilization")?,
                demand: p.number("demand")?,
                capacity: p.number("capacity")?,
            },
            "critical_edge_overload" => EventKind::CriticalEdgeOverload {
                edge_id: p.string("edgeId")?,
                utilization: p.number("utilization")?,
                current_flow: p.number("currentFlow")?,
                capacity: p.number("capacity")?,
            },
            "critical_node_failure" => {
                let inactive_nodes: Vec<String> = match payload.get("inactiveNodes") {
                    Some(value) => serde_json::from_value(value.clone())
                        .map_err(|_| p.invalid("inactiveNodes"))?,
                    None => Vec::new(),
                };
                let inactive_count = match payload.get("inactiveCount") {
                    Some(value) => value.as_u64().ok_or_else(|| p.invalid("inactiveCount"))?
                        as usize,
                    None => inactive_nodes.len(),
                };
                EventKind::CriticalNodeFailure {
                    inactive_count,
                    inactive_nodes,
                }
            }
            _ => {
                return Ok(EventKind::Unknown {
                    type_name,
                    payload,
                })
            }
        };
        Ok(kind)
    }

    fn encode(self) -> (String, Map<String, Value>) {
        let type_name = self.type_name().to_string();
        let payload = match self {
            EventKind::DemandChange { node_id, demand } => {
                json!({ "nodeId": node_id, "demand": demand })
            }
            EventKind::NodeFailure { node_id } | EventKind::NodeRecovery { node_id } => {
                json!({ "nodeId": node_id })
            }
            EventKind::Overload { target, multiplier } => {
                let mut value = target_json(target);
                if let Some(multiplier) = multiplier {
                    value["multiplier"] = json!(multiplier);
                }
                value
            }
            EventKind::CapacityChange { target, capacity } => {
                let mut value = target_json(target);
                value["capacity"] = json!(capacity);
                value
            }
            EventKind::CriticalOverload {
                node_id,
                utilization,
                demand,
                capacity,
            } => json!({
                "nodeId": node_id,
                "utilization": utilization,
                "demand": demand,
                "capacity": capacity,
            }),
            EventKind::CriticalEdgeOverload {
                edge_id,
                utilization,
                current_flow,
                capacity,
            } => json!({
                "edgeId": edge_id,
                "utilization": utilization,
                "currentFlow": current_flow,
                "capacity": capacity,
            }),
            EventKind::CriticalNodeFailure {
                inactive_count,
                inactive_nodes,
            } => json!({
                "inactiveCount": inactive_count,
                "inactiveNodes": inactive_nodes,
            }),
            EventKind::Unknown { payload, .. } => Value::Object(payload),
        };
        let payload = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        (type_name, payload)
    }
}

fn target_json(target: Target) -> Value {
    match target {
        Target::Node(id) => json!({ "nodeId": id }),
        Target::Edge(id) => json!({ "edgeId": id }),
    }
}

/// Typed accessors over a raw payload, producing `InvalidEvent` errors that name the field.
struct Payload<'a> {
    type_name: &'a str,
    map: &'a Map<String, Value>,
}

impl Payload<'_> {
    fn invalid(&self, field: &str) -> GridError {
        GridError::InvalidEvent(format!(
            "{} event has a missing or invalid `{}`",
            self.type_name, field
        ))
    }

    fn string(&self, field: &str) -> Result<String> {
        match self.map.get(field) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            _ => Err(self.invalid(field)),
        }
    }

    fn number(&self, field: &str) -> Result<f64> {
        self.map
            .get(field)
            .and_then(Value::as_f64)
            .ok_or_else(|| self.invalid(field))
    }

    fn optional_number(&self, field: &str) -> Result<Option<f64>> {
        match self.map.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value.as_f64().map(Some).ok_or_else(|| self.invalid(field)),
        }
    }

    /// A node target wins when the payload names both.
    fn target(&self) -> Result<Target> {
        if self.map.contains_key("nodeId") {
            self.string("nodeId").map(Target::Node)
        } else if self.map.contains_key("edgeId") {
            self.string("edgeId").map(Target::Edge)
        } else {
            Err(self.invalid("nodeId"))
        }
    }
}

/// Wire representation of an event.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    payload: Map<String, Value>,
    severity: i64,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// An event waiting in the queues. Immutable once created.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "RawEvent", into = "RawEvent")]
pub struct Event {
    pub kind: EventKind,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Creates an event stamped with the current time.
    pub fn new(kind: EventKind, severity: Severity) -> Result<Event> {
        if severity > MAX_SEVERITY {
            return Err(GridError::InvalidEvent(format!(
                "severity must be between 0 and {}, got {}",
                MAX_SEVERITY, severity
            )));
        }
        Ok(Event {
            kind,
            severity,
            created_at: Utc::now(),
        })
    }

    pub fn type_name(&self) -> &str {
        self.kind.type_name()
    }
}

impl TryFrom<RawEvent> for Event {
    type Error = GridError;

    fn try_from(raw: RawEvent) -> Result<Event> {
        if raw.type_name.is_empty() {
            return Err(GridError::InvalidEvent("event type is empty".into()));
        }
        if !(0..=MAX_SEVERITY as i64).contains(&raw.severity) {
            return Err(GridError::InvalidEvent(format!(
                "severity must be between 0 and {}, got {}",
                MAX_SEVERITY, raw.severity
            )));
        }
        Ok(Event {
            kind: EventKind::decode(raw.type_name, raw.payload)?,
            severity: raw.severity as Severity,
            created_at: raw.created_at.unwrap_or_else(Utc::now),
        })
    }
}

impl From<Event> for RawEvent {
    fn from(event: Event) -> RawEvent {
        let (type_name, payload) = event.kind.encode();
        RawEvent {
            type_name,
            payload,
            severity: event.severity as i64,
            created_at: Some(event.created_at),
        }
    }
}

/// Generates between one and three random events targeting random nodes, used to keep a
/// demonstration running when no events were submitted.
pub fn demo_events<R: Rng + ?Sized>(rng: &mut R, nodes: &[NetworkNode]) -> Vec<Event> {
    if nodes.is_empty() {
        return Vec::new();
    }
    let count = (nodes.len() / 2).clamp(1, 3);
    let mut events = Vec::with_capacity(count);
    for _ in 0..count {
        let node = match nodes.choose(rng) {
            Some(node) => node,
            None => break,
        };
        let (kind, severity) = match rng.gen_range(0..3) {
            0 => (
                EventKind::DemandChange {
                    node_id: node.id.clone(),
                    demand: (node.demand * rng.gen_range(0.8..1.2)).max(0.0),
                },
                2,
            ),
            1 => (
                EventKind::Overload {
                    target: Target::Node(node.id.clone()),
                    multiplier: Some(rng.gen_range(1.2..1.5)),
                },
                1,
            ),
            _ => (
                EventKind::CapacityChange {
                    target: Target::Node(node.id.clone()),
                    capacity: (node.capacity * rng.gen_range(0.9..1.1)).max(1.0),
                },
                2,
            ),
        };
        events.push(Event {
            kind,
            severity,
            created_at: Utc::now(),
        });
    }
    events
}
