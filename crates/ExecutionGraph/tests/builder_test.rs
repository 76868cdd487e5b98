use execution_graph::{
    ExecutionRecords, GraphBuilder, GraphStyle, LayoutConfig, NodeKind, StepStatus,
    build_execution_graph,
    records::{
        ComplianceRecord, ComplianceResult, CounterfactualRecord, ExecutionStepRecord,
        GateEvaluation, GateRecord, GateStatus, LogisticsEventRecord, LogisticsTimeline,
        RiskLevel,
    },
};
use std::collections::HashSet;

fn gate(gate_type: &str, status: GateStatus) -> GateRecord {
    GateRecord {
        gate_type: Some(gate_type.to_string()),
        status,
        block_reason: None,
    }
}

fn step(id: &str, order: i64, status: StepStatus) -> ExecutionStepRecord {
    ExecutionStepRecord {
        id: Some(id.to_string()),
        order: Some(order),
        name: Some(format!("Step {order}")),
        status: Some(status),
        ..Default::default()
    }
}

fn scenario_d() -> ExecutionRecords {
    ExecutionRecords {
        gates: Some(GateEvaluation {
            gates: vec![
                gate("FUNDS", GateStatus::Passed),
                gate("MARKET", GateStatus::Blocked),
            ],
        }),
        compliance: Some(ComplianceRecord {
            overall_result: ComplianceResult::Fail,
            failed_rules: vec![serde_json::json!("KYC_EXPIRED")],
        }),
        steps: Some(vec![
            step("c", 3, StepStatus::Pending),
            step("a", 1, StepStatus::Success),
            step("b", 2, StepStatus::Success),
        ]),
        logistics: None,
        counterfactual: None,
    }
}

#[test]
fn test_gates_compliance_and_reordered_steps() {
    let graph = build_execution_graph(&scenario_d());

    // 2 gates + 1 compliance + 3 steps
    assert_eq!(graph.nodes.len(), 6);

    // Steps re-sorted to 1 -> 2 -> 3
    assert!(graph.edge_between("step-a", "step-b").is_some());
    assert!(graph.edge_between("step-b", "step-c").is_some());
    assert!(graph.edge_between("step-c", "step-a").is_none());

    // Compliance feeds the first step in order, not the first in the array.
    assert!(graph.edge_between("compliance", "step-a").is_some());
    assert!(graph.edge_between("gate-MARKET", "compliance").is_some());

    // The gate edge takes the style of its source gate (PASSED).
    let style = GraphStyle::default();
    let gate_edge = graph.edge_between("gate-FUNDS", "gate-MARKET").unwrap();
    assert!(!gate_edge.style.dashed);
    assert!(gate_edge.style.animated);
    assert_eq!(gate_edge.style.stroke, style.success_color);

    // The upstream of compliance is the BLOCKED gate.
    let blocked_edge = graph.edge_between("gate-MARKET", "compliance").unwrap();
    assert!(blocked_edge.style.dashed);
    assert_eq!(blocked_edge.style.stroke, style.failure_color);

    // FAIL compliance feeds the steps with a dashed red edge.
    let compliance_edge = graph.edge_between("compliance", "step-a").unwrap();
    assert!(compliance_edge.style.dashed);
}

#[test]
fn test_blocked_source_gate_dashes_edge() {
    let records = ExecutionRecords {
        gates: Some(GateEvaluation {
            gates: vec![
                gate("FUNDS", GateStatus::Blocked),
                gate("MARKET", GateStatus::Passed),
            ],
        }),
        ..Default::default()
    };
    let graph = build_execution_graph(&records);
    let edge = graph.edge_between("gate-FUNDS", "gate-MARKET").unwrap();
    assert!(edge.style.dashed);
    assert!(!edge.style.animated);
    assert_eq!(edge.style.stroke, GraphStyle::default().failure_color);
}

#[test]
fn test_last_gate_connects_to_first_step_without_compliance() {
    let records = ExecutionRecords {
        gates: Some(GateEvaluation {
            gates: vec![gate("FUNDS", GateStatus::Passed)],
        }),
        steps: Some(vec![step("a", 1, StepStatus::Pending)]),
        ..Default::default()
    };
    let graph = build_execution_graph(&records);
    assert!(graph.edge_between("gate-FUNDS", "step-a").is_some());
    assert_eq!(graph.edges.len(), 1);
}

#[test]
fn test_in_progress_step_edge_is_animated_blue() {
    let records = ExecutionRecords {
        steps: Some(vec![
            step("a", 1, StepStatus::InProgress),
            step("b", 2, StepStatus::Pending),
            step("c", 3, StepStatus::Pending),
        ]),
        ..Default::default()
    };
    let graph = build_execution_graph(&records);
    let style = GraphStyle::default();

    let active = graph.edge_between("step-a", "step-b").unwrap();
    assert!(active.style.animated);
    assert_eq!(active.style.stroke, style.active_color);

    let idle = graph.edge_between("step-b", "step-c").unwrap();
    assert!(!idle.style.animated);
    assert_eq!(idle.style.stroke, style.neutral_color);
}

#[test]
fn test_logistics_follow_steps() {
    let records = ExecutionRecords {
        steps: Some(vec![step("a", 1, StepStatus::Success)]),
        logistics: Some(LogisticsTimeline {
            events: vec![
                LogisticsEventRecord {
                    id: Some("pickup".to_string()),
                    event_type: Some("PICKUP".to_string()),
                    status: Some("COMPLETED".to_string()),
                    risk_level: RiskLevel::Low,
                },
                LogisticsEventRecord {
                    id: Some("transit".to_string()),
                    event_type: Some("TRANSIT".to_string()),
                    status: Some("IN_TRANSIT".to_string()),
                    risk_level: RiskLevel::High,
                },
            ],
        }),
        ..Default::default()
    };
    let graph = build_execution_graph(&records);

    assert!(graph.edge_between("step-a", "logistics-pickup").is_some());
    let transit = graph
        .edge_between("logistics-pickup", "logistics-transit")
        .unwrap();
    assert!(transit.style.animated);
    assert!(transit.style.dashed);

    let step_y = graph.node("step-a").unwrap().position.y;
    let pickup_y = graph.node("logistics-pickup").unwrap().position.y;
    assert!(pickup_y > step_y);
}

#[test]
fn test_logistics_without_steps_are_unconnected_chain() {
    let records = ExecutionRecords {
        logistics: Some(LogisticsTimeline {
            events: vec![LogisticsEventRecord::default(), LogisticsEventRecord::default()],
        }),
        ..Default::default()
    };
    let graph = build_execution_graph(&records);
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.edges.len(), 1);
    assert!(graph.edge_between("logistics-0", "logistics-1").is_some());
}

#[test]
fn test_counterfactual_shadow_lane() {
    let records = ExecutionRecords {
        steps: Some(vec![
            step("a", 1, StepStatus::Success),
            step("b", 2, StepStatus::Success),
        ]),
        counterfactual: Some(CounterfactualRecord {
            roi_delta: Some(2.5),
            risk_delta: None,
            opportunity_cost: Some(1200.0),
        }),
        ..Default::default()
    };
    let graph = build_execution_graph(&records);
    let edge = graph.edge_between("step-a", "counterfactual").unwrap();
    assert!(edge.style.dashed);
    assert!(!edge.style.animated);
    assert_eq!(edge.style.stroke, GraphStyle::default().shadow_color);

    let node = graph.node("counterfactual").unwrap();
    match &node.kind {
        NodeKind::CounterfactualNode(cf) => {
            assert_eq!(cf.roi_delta, 2.5);
            assert_eq!(cf.risk_delta, 0.0);
        }
        other => panic!("Expected counterfactual node, got {:?}", other),
    }

    // Not part of the playback sequence.
    assert_eq!(graph.step_nodes().len(), 2);
}

#[test]
fn test_gate_without_type_uses_index_id() {
    let records = ExecutionRecords {
        gates: Some(GateEvaluation {
            gates: vec![GateRecord::default(), GateRecord::default()],
        }),
        ..Default::default()
    };
    let graph = build_execution_graph(&records);
    assert!(graph.node("gate-0").is_some());
    assert!(graph.node("gate-1").is_some());
}

#[test]
fn test_positions_never_collide() {
    let mut records = scenario_d();
    records.steps = Some(
        (0..40)
            .map(|i| step(&format!("s{i}"), i, StepStatus::Success))
            .collect(),
    );
    records.gates = Some(GateEvaluation {
        gates: (0..12)
            .map(|i| gate(&format!("G{i}"), GateStatus::Passed))
            .collect(),
    });
    records.logistics = Some(LogisticsTimeline {
        events: (0..10).map(|_| LogisticsEventRecord::default()).collect(),
    });
    records.counterfactual = Some(CounterfactualRecord::default());

    let graph = build_execution_graph(&records);
    let layout = LayoutConfig::default();

    for (i, a) in graph.nodes.iter().enumerate() {
        for b in graph.nodes.iter().skip(i + 1) {
            let overlap_x = (a.position.x - b.position.x).abs() < layout.node_width;
            let overlap_y = (a.position.y - b.position.y).abs() < layout.node_height;
            assert!(
                !(overlap_x && overlap_y),
                "{} overlaps {}",
                a.id,
                b.id
            );
        }
    }

    let ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids.len(), graph.nodes.len());
}

#[test]
fn test_builder_rejects_cramped_layout() {
    let layout = LayoutConfig {
        gate_spacing_x: 10.0,
        ..Default::default()
    };
    assert!(GraphBuilder::with_config(layout, GraphStyle::default()).is_err());
}

#[test]
fn test_build_from_backend_json() {
    let json = r#"{
        "steps": [
            {"id": "9d1c", "step_order": 1, "step_name": "Lock price", "status": "SUCCESS",
             "started_at": "2026-03-01T10:00:00Z", "completed_at": "2026-03-01T10:00:02Z"},
            {"id": "9d1d", "step_order": 2, "step_name": "Settle", "status": "FAILED",
             "failure_reason": "Counterparty timeout", "step_data": {"tracking": "TRK-1"}}
        ],
        "compliance": {"overall_result": "CONDITIONAL", "failed_rules": []}
    }"#;
    let records = ExecutionRecords::from_json(json).unwrap();
    let graph = build_execution_graph(&records);

    let settle = graph.node("step-9d1d").and_then(|n| n.as_step()).unwrap();
    assert_eq!(settle.status, Some(StepStatus::Failed));
    assert_eq!(settle.failure_reason.as_deref(), Some("Counterparty timeout"));
    assert!(settle.visual_status.is_none());
    assert!(graph.node("step-9d1c").unwrap().as_step().unwrap().started_at.is_some());
}
