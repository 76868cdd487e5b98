//! # Playback State
//!
//! State owned by the playback machine and the read-only views it publishes.

use execution_graph::{GraphNode, StepStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Lifecycle of a playback session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    #[default]
    Idle,
    ExecutionStarted,
    StepRunning,
    StepCompleted,
    ExecutionFinished,
}

/// Derived per-step state read by the presentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepVisualState {
    Hidden,
    Pending,
    Running,
    Completed,
}

/// The mutable playback position. Only `PlaybackMachine` writes it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub execution_state: ExecutionState,
    /// `None` means playback has not started.
    pub current_step_index: Option<usize>,
    pub is_playing: bool,
    /// Indices marked done, failed steps included.
    pub completed_steps: BTreeSet<usize>,
}

/// One entry of the playback sequence, taken from an `execution_step` node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepEntry {
    pub node_id: String,
    pub order: i64,
    pub name: String,
    pub original_status: Option<StepStatus>,
    pub failure_reason: Option<String>,
}

impl StepEntry {
    /// Extracts the playback sequence from a node list: step nodes only,
    /// sorted by `order` with ties kept in list order.
    pub fn sequence_from_nodes(nodes: &[GraphNode]) -> Vec<StepEntry> {
        let mut steps: Vec<StepEntry> = nodes
            .iter()
            .filter_map(|node| {
                node.as_step().map(|step| StepEntry {
                    node_id: node.id.clone(),
                    order: step.order,
                    name: step.name.clone(),
                    original_status: step.status,
                    failure_reason: step.failure_reason.clone(),
                })
            })
            .collect();
        steps.sort_by_key(|s| s.order);
        steps
    }

    pub fn is_failed(&self) -> bool {
        self.original_status == Some(StepStatus::Failed)
    }
}

/// Read-only snapshot of the machine, safe to hand across threads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub execution_state: ExecutionState,
    /// Serialized as `-1` when playback has not started.
    #[serde(with = "step_index_serde")]
    pub current_step_index: Option<usize>,
    pub is_playing: bool,
    pub completed_steps: Vec<usize>,
    pub total_steps: usize,
}

/// Observable playback transitions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PlaybackEvent {
    StateChanged {
        from: ExecutionState,
        to: ExecutionState,
        step_index: Option<usize>,
    },
    StepCompleted {
        index: usize,
        failed: bool,
    },
    /// A failed step stopped the replay.
    Halted {
        index: usize,
        failure_reason: Option<String>,
    },
    Resumed,
    Paused,
    Reset,
}

mod step_index_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        index: &Option<usize>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match index {
            Some(i) => serializer.serialize_i64(*i as i64),
            None => serializer.serialize_i64(-1),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<usize>, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Ok(usize::try_from(raw).ok())
    }
}
