use execution_graph::records::ExecutionStepRecord;
use execution_graph::{ExecutionGraph, ExecutionRecords, StepStatus, build_execution_graph};

/// Builds a graph with one step per status, in order.
pub fn graph_with(statuses: &[StepStatus]) -> ExecutionGraph {
    let records = ExecutionRecords {
        steps: Some(
            statuses
                .iter()
                .enumerate()
                .map(|(i, status)| ExecutionStepRecord {
                    id: Some(format!("s{i}")),
                    order: Some(i as i64 + 1),
                    name: Some(format!("Step {}", i + 1)),
                    status: Some(*status),
                    failure_reason: (*status == StepStatus::Failed)
                        .then(|| "Counterparty rejected".to_string()),
                    ..Default::default()
                })
                .collect(),
        ),
        ..Default::default()
    };
    build_execution_graph(&records)
}
