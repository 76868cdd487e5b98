//! # Projection
//!
//! Derives the playback-synchronized view of a graph. The input graph is never
//! touched: every call recomputes node `visual_status` and edge flags from the
//! machine's current state.

use execution_graph::{EdgeFlags, ExecutionGraph, GraphEdge, GraphNode, NodeKind, VisualStatus};
use std::collections::HashMap;

use crate::machine::PlaybackMachine;

/// Returns a copy of `graph` with step statuses and edge flags filled in.
pub fn project(graph: &ExecutionGraph, machine: &PlaybackMachine) -> ExecutionGraph {
    let nodes: Vec<GraphNode> = graph
        .nodes
        .iter()
        .map(|node| project_node(node, machine))
        .collect();

    let progress: HashMap<&str, VisualStatus> = nodes
        .iter()
        .filter_map(|n| {
            n.as_step()
                .and_then(|s| s.visual_status)
                .map(|v| (n.id.as_str(), v))
        })
        .collect();

    let edges = graph
        .edges
        .iter()
        .map(|edge| project_edge(edge, &progress))
        .collect();

    ExecutionGraph { nodes, edges }
}

/// Visual status of a single step node, or `None` for non-step nodes.
pub fn visual_status_of(node: &GraphNode, machine: &PlaybackMachine) -> Option<VisualStatus> {
    node.as_step()?;
    Some(
        machine
            .step_index_of(&node.id)
            .map_or(VisualStatus::Hidden, |i| machine.visual_status(i)),
    )
}

fn project_node(node: &GraphNode, machine: &PlaybackMachine) -> GraphNode {
    let mut projected = node.clone();
    let visual = visual_status_of(node, machine);
    if let NodeKind::ExecutionStep(step) = &mut projected.kind {
        step.original_status = step.status;
        step.visual_status = visual;
    }
    projected
}

fn project_edge(edge: &GraphEdge, progress: &HashMap<&str, VisualStatus>) -> GraphEdge {
    let source = progress.get(edge.source.as_str()).copied();
    let target = progress.get(edge.target.as_str()).copied();

    let mut projected = edge.clone();
    projected.data = edge_flags(source, target);
    if projected.data.contains(EdgeFlags::ACTIVE) {
        projected.style.animated = true;
    }
    projected
}

/// Flags for an edge given the visual status of its endpoints. `None` marks a
/// non-step endpoint, which counts as already settled.
fn edge_flags(source: Option<VisualStatus>, target: Option<VisualStatus>) -> EdgeFlags {
    let mut flags = EdgeFlags::empty();

    if source == Some(VisualStatus::Failed) {
        flags |= EdgeFlags::FAILED;
    }
    if target == Some(VisualStatus::InProgress) {
        flags |= EdgeFlags::ACTIVE;
    }

    let source_settled = matches!(source, None | Some(VisualStatus::Success));
    let reached = match (source, target) {
        // Neither end is a step: playback says nothing about this edge.
        (None, None) => false,
        (_, Some(t)) => !matches!(t, VisualStatus::Pending | VisualStatus::Hidden),
        (Some(_), None) => true,
    };
    if source_settled && reached {
        flags |= EdgeFlags::SUCCESS;
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_flags_table() {
        use VisualStatus::*;

        assert_eq!(edge_flags(None, None), EdgeFlags::empty());
        assert_eq!(edge_flags(None, Some(Pending)), EdgeFlags::empty());
        assert_eq!(
            edge_flags(None, Some(InProgress)),
            EdgeFlags::ACTIVE | EdgeFlags::SUCCESS
        );
        assert_eq!(
            edge_flags(Some(Success), Some(InProgress)),
            EdgeFlags::ACTIVE | EdgeFlags::SUCCESS
        );
        assert_eq!(edge_flags(Some(Success), Some(Success)), EdgeFlags::SUCCESS);
        assert_eq!(edge_flags(Some(Failed), Some(Pending)), EdgeFlags::FAILED);
        assert_eq!(edge_flags(Some(Success), None), EdgeFlags::SUCCESS);
        assert_eq!(edge_flags(Some(InProgress), Some(Pending)), EdgeFlags::empty());
    }
}
