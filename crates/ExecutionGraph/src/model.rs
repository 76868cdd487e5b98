//! # Graph Model
//!
//! This module defines the renderable execution graph: typed nodes with
//! world-space positions and flat edges carrying style hints.
//!
//! Nodes are discriminated by their `type` tag and carry a `data` payload that
//! projects the source record. Only `execution_step` nodes take part in playback.

use chrono::{DateTime, Utc};
use glam::{Vec2, Vec4};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::records::{ComplianceResult, GateStatus, RiskLevel, StepStatus};

/// Playback-facing status of a step node, as opposed to the backend status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisualStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    Hidden,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GateNodeData {
    pub label: String,
    pub gate_type: Option<String>,
    pub status: GateStatus,
    pub block_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComplianceNodeData {
    pub label: String,
    pub overall_result: ComplianceResult,
    pub failed_rules: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepNodeData {
    pub step_id: Option<String>,
    /// Resolved sequence position; falls back to the record's array index.
    pub order: i64,
    pub name: String,
    pub status: Option<StepStatus>,
    pub failure_reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub step_data: Option<Value>,
    /// Filled in by the playback projection, never by the builder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_status: Option<VisualStatus>,
    /// Filled in by the playback projection, never by the builder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_status: Option<StepStatus>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogisticsNodeData {
    pub event_id: Option<String>,
    pub event_type: String,
    pub status: Option<String>,
    pub risk_level: RiskLevel,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CounterfactualNodeData {
    pub label: String,
    pub roi_delta: f64,
    pub risk_delta: f64,
    pub opportunity_cost: f64,
}

/// The polymorphic payload of a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NodeKind {
    ExecutionGate(GateNodeData),
    ComplianceGate(ComplianceNodeData),
    ExecutionStep(StepNodeData),
    LogisticsEvent(LogisticsNodeData),
    CounterfactualNode(CounterfactualNodeData),
}

impl NodeKind {
    /// Returns the wire tag for this node kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::ExecutionGate(_) => "execution_gate",
            NodeKind::ComplianceGate(_) => "compliance_gate",
            NodeKind::ExecutionStep(_) => "execution_step",
            NodeKind::LogisticsEvent(_) => "logistics_event",
            NodeKind::CounterfactualNode(_) => "counterfactual_node",
        }
    }
}

/// Visual style hint for a Node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeStyle {
    /// Fill color of the node.
    pub color: Vec4,
    /// Border color of the node.
    pub border_color: Vec4,
}

/// A Node in the execution graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    /// World-space position of the top-left corner.
    #[serde(with = "position_serde")]
    pub position: Vec2,
    #[serde(flatten)]
    pub kind: NodeKind,
    pub style: NodeStyle,
}

impl GraphNode {
    /// Returns the step payload if this is an `execution_step` node.
    pub fn as_step(&self) -> Option<&StepNodeData> {
        match &self.kind {
            NodeKind::ExecutionStep(step) => Some(step),
            _ => None,
        }
    }

    pub fn is_step(&self) -> bool {
        self.as_step().is_some()
    }
}

/// Visual style of an edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeStyle {
    /// Stroke color of the wire.
    pub stroke: Vec4,
    /// Width of the wire in screen pixels.
    pub width: f32,
    pub dashed: bool,
    pub animated: bool,
}

use bitflags::bitflags;

bitflags! {
    /// Playback activity flags of an edge, recomputed from adjacent node status.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct EdgeFlags: u8 {
        /// Flow is currently entering the target.
        const ACTIVE = 1 << 0;
        /// Flow has traversed this edge successfully.
        const SUCCESS = 1 << 1;
        /// The source failed.
        const FAILED = 1 << 2;
    }
}

/// Wire form of `EdgeFlags`, the `{isActive, isSuccess, isFailed}` bundle.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EdgeFlagBundle {
    #[serde(default)]
    is_active: bool,
    #[serde(default)]
    is_success: bool,
    #[serde(default)]
    is_failed: bool,
}

impl Serialize for EdgeFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        EdgeFlagBundle {
            is_active: self.contains(EdgeFlags::ACTIVE),
            is_success: self.contains(EdgeFlags::SUCCESS),
            is_failed: self.contains(EdgeFlags::FAILED),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EdgeFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bundle = EdgeFlagBundle::deserialize(deserializer)?;
        let mut flags = EdgeFlags::empty();
        flags.set(EdgeFlags::ACTIVE, bundle.is_active);
        flags.set(EdgeFlags::SUCCESS, bundle.is_success);
        flags.set(EdgeFlags::FAILED, bundle.is_failed);
        Ok(flags)
    }
}

/// A directed connection between two node ids.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub style: EdgeStyle,
    #[serde(default)]
    pub data: EdgeFlags,
}

/// The entire execution graph.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl ExecutionGraph {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Step nodes in playback order (sorted by `order`, ties by position in the list).
    pub fn step_nodes(&self) -> Vec<&GraphNode> {
        let mut steps: Vec<&GraphNode> = self.nodes.iter().filter(|n| n.is_step()).collect();
        steps.sort_by_key(|n| n.as_step().map_or(0, |s| s.order));
        steps
    }

    pub fn edge_between(&self, source: &str, target: &str) -> Option<&GraphEdge> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
    }
}

/// Serializes a `Vec2` as `{ "x": .., "y": .. }`.
mod position_serde {
    use glam::Vec2;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Position {
        x: f32,
        y: f32,
    }

    pub fn serialize<S: Serializer>(pos: &Vec2, serializer: S) -> Result<S::Ok, S::Error> {
        Position { x: pos.x, y: pos.y }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec2, D::Error> {
        let p = Position::deserialize(deserializer)?;
        Ok(Vec2::new(p.x, p.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_flags_wire_shape() {
        let flags = EdgeFlags::ACTIVE | EdgeFlags::FAILED;
        let json = serde_json::to_value(flags).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"isActive": true, "isSuccess": false, "isFailed": true})
        );
    }

    #[test]
    fn test_node_is_tagged_by_type() {
        let node = GraphNode {
            id: "counterfactual".to_string(),
            position: Vec2::new(450.0, 300.0),
            kind: NodeKind::CounterfactualNode(CounterfactualNodeData {
                label: "No action".to_string(),
                roi_delta: 1.5,
                risk_delta: -0.2,
                opportunity_cost: 120.0,
            }),
            style: NodeStyle {
                color: Vec4::ONE,
                border_color: Vec4::ONE,
            },
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "counterfactual_node");
        assert_eq!(json["position"]["x"], 450.0);
        assert_eq!(json["data"]["roi_delta"], 1.5);
    }
}
