use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::GraphError;
use crate::model::{ExecutionGraph, GraphEdge, GraphNode};

/// Current on-disk format version.
pub const SAVED_GRAPH_VERSION: u32 = 1;

/// A serializable snapshot of an execution graph.
///
/// Playback-owned fields (`visual_status`, edge flags) are saved as they are,
/// so a projected graph can be stored and reloaded for offline inspection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SavedGraph {
    pub version: u32,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl ExecutionGraph {
    /// Serializes the graph into a `SavedGraph` payload.
    pub fn save(&self) -> SavedGraph {
        SavedGraph {
            version: SAVED_GRAPH_VERSION,
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    /// Restores a graph from a `SavedGraph` payload.
    ///
    /// Unlike the builder, loading is strict: node ids must be unique and every
    /// edge must point at a known node.
    pub fn load(saved: SavedGraph) -> Result<Self, GraphError> {
        if saved.version != SAVED_GRAPH_VERSION {
            return Err(GraphError::UnsupportedVersion(saved.version));
        }

        let mut ids = HashSet::new();
        for node in &saved.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }

        for edge in &saved.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !ids.contains(endpoint.as_str()) {
                    return Err(GraphError::DanglingEdge {
                        edge: edge.id.clone(),
                        node: endpoint.clone(),
                    });
                }
            }
        }

        Ok(Self {
            nodes: saved.nodes,
            edges: saved.edges,
        })
    }

    pub fn to_json(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string_pretty(&self.save())?)
    }

    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let saved: SavedGraph = serde_json::from_str(json)?;
        Self::load(saved)
    }
}
