//! # Graph Builder
//!
//! Turns a bag of execution records into an `ExecutionGraph` with a
//! deterministic layout. The builder is a pure transformation: it never fails,
//! and missing collections simply contribute nothing.

use glam::{Vec2, Vec4};
use std::collections::HashSet;

use crate::config::{GraphStyle, LayoutConfig};
use crate::error::GraphError;
use crate::model::{
    ComplianceNodeData, CounterfactualNodeData, EdgeFlags, EdgeStyle, ExecutionGraph,
    GateNodeData, GraphEdge, GraphNode, LogisticsNodeData, NodeKind, NodeStyle, StepNodeData,
};
use crate::records::{
    ComplianceRecord, ComplianceResult, CounterfactualRecord, ExecutionRecords,
    ExecutionStepRecord, GateRecord, GateStatus, LogisticsEventRecord, RiskLevel, StepStatus,
};

/// Builds execution graphs with a fixed layout and palette.
#[derive(Clone, Debug, Default)]
pub struct GraphBuilder {
    layout: LayoutConfig,
    style: GraphStyle,
}

impl GraphBuilder {
    /// Creates a builder after checking the layout is collision free.
    pub fn with_config(layout: LayoutConfig, style: GraphStyle) -> Result<Self, GraphError> {
        layout.validate()?;
        Ok(Self { layout, style })
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Builds the graph for one snapshot of execution records.
    #[tracing::instrument(skip_all)]
    pub fn build(&self, records: &ExecutionRecords) -> ExecutionGraph {
        let mut pass = BuildPass::new(self);

        let last_gate = records
            .gates
            .as_ref()
            .and_then(|g| pass.add_gates(&g.gates));

        let compliance = records
            .compliance
            .as_ref()
            .map(|c| pass.add_compliance(c, last_gate.as_ref()));

        let steps = records.steps.as_deref().unwrap_or_default();
        let (first_step, last_step) =
            pass.add_steps(steps, compliance.as_ref(), last_gate.as_ref());

        if let Some(timeline) = &records.logistics {
            pass.add_logistics(&timeline.events, last_step.as_deref(), steps.len());
        }

        if let Some(cf) = &records.counterfactual {
            pass.add_counterfactual(cf, first_step.as_deref());
        }

        let graph = pass.finish();
        tracing::debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Execution graph built"
        );
        graph
    }
}

/// Builds a graph with the default layout and palette.
pub fn build_execution_graph(records: &ExecutionRecords) -> ExecutionGraph {
    GraphBuilder::default().build(records)
}

/// Most recent node in a chain and the style of the edge leaving it.
struct Tail {
    id: String,
    edge: EdgeStyle,
}

struct BuildPass<'a> {
    layout: &'a LayoutConfig,
    style: &'a GraphStyle,
    graph: ExecutionGraph,
    used_ids: HashSet<String>,
}

impl<'a> BuildPass<'a> {
    fn new(builder: &'a GraphBuilder) -> Self {
        Self {
            layout: &builder.layout,
            style: &builder.style,
            graph: ExecutionGraph::default(),
            used_ids: HashSet::new(),
        }
    }

    fn finish(self) -> ExecutionGraph {
        self.graph
    }

    /// Reserves a unique node id, falling back when the preferred one is
    /// missing or already taken.
    fn claim_id(&mut self, preferred: Option<String>, fallback: String) -> String {
        let mut id = match preferred {
            Some(p) if !self.used_ids.contains(&p) => p,
            _ => fallback,
        };
        let base = id.clone();
        let mut n = 1;
        while self.used_ids.contains(&id) {
            id = format!("{base}-{n}");
            n += 1;
        }
        self.used_ids.insert(id.clone());
        id
    }

    fn push_node(&mut self, id: String, position: Vec2, kind: NodeKind, color: Vec4) {
        self.graph.nodes.push(GraphNode {
            id,
            position,
            kind,
            style: NodeStyle {
                color: self.style.node_fill,
                border_color: color,
            },
        });
    }

    fn push_edge(&mut self, source: &str, target: &str, style: EdgeStyle) {
        self.graph.edges.push(GraphEdge {
            id: format!("e-{source}-{target}"),
            source: source.to_string(),
            target: target.to_string(),
            style,
            data: EdgeFlags::empty(),
        });
    }

    fn edge_style(&self, stroke: Vec4, dashed: bool, animated: bool) -> EdgeStyle {
        EdgeStyle {
            stroke,
            width: self.style.edge_width,
            dashed,
            animated,
        }
    }

    fn gate_edge(&self, status: GateStatus) -> EdgeStyle {
        match status {
            GateStatus::Blocked => self.edge_style(self.style.failure_color, true, false),
            GateStatus::Passed => self.edge_style(self.style.success_color, false, true),
            GateStatus::Pending | GateStatus::Unknown => {
                self.edge_style(self.style.neutral_color, false, false)
            }
        }
    }

    fn step_edge(&self, status: Option<StepStatus>) -> EdgeStyle {
        match status {
            Some(StepStatus::Failed) => self.edge_style(self.style.failure_color, true, false),
            Some(StepStatus::InProgress | StepStatus::Success) => {
                self.edge_style(self.style.active_color, false, true)
            }
            _ => self.edge_style(self.style.neutral_color, false, false),
        }
    }

    fn compliance_edge(&self, result: ComplianceResult) -> EdgeStyle {
        match result {
            ComplianceResult::Pass => self.edge_style(self.style.success_color, false, true),
            ComplianceResult::Fail => self.edge_style(self.style.failure_color, true, false),
            ComplianceResult::Conditional => {
                self.edge_style(self.style.warning_color, false, false)
            }
            ComplianceResult::Unknown => self.edge_style(self.style.neutral_color, false, false),
        }
    }

    fn risk_color(&self, risk: RiskLevel) -> Vec4 {
        match risk {
            RiskLevel::Low => self.style.success_color,
            RiskLevel::Medium => self.style.warning_color,
            RiskLevel::High => self.style.failure_color,
            RiskLevel::Unknown => self.style.neutral_color,
        }
    }

    fn add_gates(&mut self, gates: &[GateRecord]) -> Option<Tail> {
        let mut tail: Option<Tail> = None;

        for (index, gate) in gates.iter().enumerate() {
            if gate.gate_type.is_none() {
                tracing::warn!(index, "Gate without gate_type, using index-based id");
            }
            let id = self.claim_id(
                gate.gate_type.as_ref().map(|t| format!("gate-{t}")),
                format!("gate-{index}"),
            );
            let position = Vec2::new(
                index as f32 * self.layout.gate_spacing_x,
                self.layout.gate_row_y,
            );
            let color = match gate.status {
                GateStatus::Passed => self.style.success_color,
                GateStatus::Blocked => self.style.failure_color,
                _ => self.style.neutral_color,
            };
            let label = gate
                .gate_type
                .clone()
                .unwrap_or_else(|| format!("Gate {}", index + 1));

            self.push_node(
                id.clone(),
                position,
                NodeKind::ExecutionGate(GateNodeData {
                    label,
                    gate_type: gate.gate_type.clone(),
                    status: gate.status,
                    block_reason: gate.block_reason.clone(),
                }),
                color,
            );

            if let Some(prev) = tail.take() {
                self.push_edge(&prev.id, &id, prev.edge);
            }
            tail = Some(Tail {
                edge: self.gate_edge(gate.status),
                id,
            });
        }

        tail
    }

    fn add_compliance(&mut self, compliance: &ComplianceRecord, last_gate: Option<&Tail>) -> Tail {
        let id = self.claim_id(None, "compliance".to_string());
        let color = match compliance.overall_result {
            ComplianceResult::Pass => self.style.success_color,
            ComplianceResult::Fail => self.style.failure_color,
            ComplianceResult::Conditional => self.style.warning_color,
            ComplianceResult::Unknown => self.style.neutral_color,
        };

        self.push_node(
            id.clone(),
            Vec2::new(self.layout.step_column_x, self.layout.compliance_y),
            NodeKind::ComplianceGate(ComplianceNodeData {
                label: "Compliance".to_string(),
                overall_result: compliance.overall_result,
                failed_rules: compliance.failed_rules.clone(),
            }),
            color,
        );

        if let Some(gate) = last_gate {
            self.push_edge(&gate.id, &id, gate.edge.clone());
        }

        Tail {
            edge: self.compliance_edge(compliance.overall_result),
            id,
        }
    }

    /// Lays out steps sorted by `order`. Returns the first and last step ids.
    fn add_steps(
        &mut self,
        steps: &[ExecutionStepRecord],
        compliance: Option<&Tail>,
        last_gate: Option<&Tail>,
    ) -> (Option<String>, Option<String>) {
        let mut ordered: Vec<(usize, &ExecutionStepRecord)> = steps.iter().enumerate().collect();
        // Stable: equal orders keep their array order.
        ordered.sort_by_key(|(index, step)| step.order.unwrap_or(*index as i64));

        let mut first: Option<String> = None;
        let mut tail: Option<Tail> = compliance
            .or(last_gate)
            .map(|t| Tail {
                id: t.id.clone(),
                edge: t.edge.clone(),
            });

        for (row, (index, step)) in ordered.into_iter().enumerate() {
            let id = self.claim_id(
                step.id.as_ref().map(|s| format!("step-{s}")),
                format!("step-{index}"),
            );
            let position = Vec2::new(
                self.layout.step_column_x,
                self.layout.step_origin_y + row as f32 * self.layout.step_spacing_y,
            );
            let color = match step.status {
                Some(StepStatus::Success) => self.style.success_color,
                Some(StepStatus::Failed) => self.style.failure_color,
                Some(StepStatus::InProgress) => self.style.active_color,
                Some(StepStatus::Compensated) => self.style.warning_color,
                _ => self.style.neutral_color,
            };

            self.push_node(
                id.clone(),
                position,
                NodeKind::ExecutionStep(StepNodeData {
                    step_id: step.id.clone(),
                    order: step.order.unwrap_or(index as i64),
                    name: step
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("Step {}", row + 1)),
                    status: step.status,
                    failure_reason: step.failure_reason.clone(),
                    started_at: step.started_at,
                    completed_at: step.completed_at,
                    step_data: step.step_data.clone(),
                    visual_status: None,
                    original_status: None,
                }),
                color,
            );

            if let Some(prev) = tail.take() {
                self.push_edge(&prev.id, &id, prev.edge);
            }
            tail = Some(Tail {
                edge: self.step_edge(step.status),
                id: id.clone(),
            });
            first.get_or_insert(id);
        }

        let last = if first.is_some() { tail.map(|t| t.id) } else { None };
        (first, last)
    }

    fn add_logistics(
        &mut self,
        events: &[LogisticsEventRecord],
        last_step: Option<&str>,
        step_rows: usize,
    ) {
        let mut prev: Option<String> = last_step.map(str::to_string);

        for (index, event) in events.iter().enumerate() {
            let id = self.claim_id(
                event.id.as_ref().map(|e| format!("logistics-{e}")),
                format!("logistics-{index}"),
            );
            let row = step_rows + index;
            let position = Vec2::new(
                self.layout.step_column_x,
                self.layout.step_origin_y + row as f32 * self.layout.step_spacing_y,
            );
            let color = self.risk_color(event.risk_level);
            let in_transit = event
                .status
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case("IN_TRANSIT"));

            self.push_node(
                id.clone(),
                position,
                NodeKind::LogisticsEvent(LogisticsNodeData {
                    event_id: event.id.clone(),
                    event_type: event
                        .event_type
                        .clone()
                        .unwrap_or_else(|| "EVENT".to_string()),
                    status: event.status.clone(),
                    risk_level: event.risk_level,
                }),
                color,
            );

            if let Some(source) = prev.take() {
                let style = self.edge_style(color, event.risk_level == RiskLevel::High, in_transit);
                self.push_edge(&source, &id, style);
            }
            prev = Some(id);
        }
    }

    fn add_counterfactual(&mut self, cf: &CounterfactualRecord, first_step: Option<&str>) {
        let id = self.claim_id(None, "counterfactual".to_string());
        let shadow = self.style.shadow_color;

        self.push_node(
            id.clone(),
            Vec2::new(self.layout.shadow_lane_x, self.layout.step_origin_y),
            NodeKind::CounterfactualNode(CounterfactualNodeData {
                label: "No action".to_string(),
                roi_delta: cf.roi_delta.unwrap_or_default(),
                risk_delta: cf.risk_delta.unwrap_or_default(),
                opportunity_cost: cf.opportunity_cost.unwrap_or_default(),
            }),
            shadow,
        );

        if let Some(step) = first_step {
            let style = self.edge_style(shadow, true, false);
            self.push_edge(step, &id, style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, order: Option<i64>, status: StepStatus) -> ExecutionStepRecord {
        ExecutionStepRecord {
            id: Some(id.to_string()),
            order,
            name: Some(id.to_uppercase()),
            status: Some(status),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_records_build_empty_graph() {
        let graph = build_execution_graph(&ExecutionRecords::default());
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_duplicate_ids_fall_back() {
        let records = ExecutionRecords {
            steps: Some(vec![
                step("a", Some(1), StepStatus::Success),
                step("a", Some(2), StepStatus::Success),
            ]),
            ..Default::default()
        };
        let graph = build_execution_graph(&records);
        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["step-a", "step-1"]);
    }

    #[test]
    fn test_missing_order_uses_array_index() {
        let records = ExecutionRecords {
            steps: Some(vec![
                step("late", Some(5), StepStatus::Pending),
                step("first", None, StepStatus::Pending),
                step("second", None, StepStatus::Pending),
            ]),
            ..Default::default()
        };
        let graph = build_execution_graph(&records);
        let names: Vec<&str> = graph
            .step_nodes()
            .iter()
            .filter_map(|n| n.as_step().map(|s| s.name.as_str()))
            .collect();
        assert_eq!(names, vec!["FIRST", "SECOND", "LATE"]);
    }

    #[test]
    fn test_failed_step_edge_is_dashed_red() {
        let records = ExecutionRecords {
            steps: Some(vec![
                step("a", Some(1), StepStatus::Failed),
                step("b", Some(2), StepStatus::Pending),
            ]),
            ..Default::default()
        };
        let graph = build_execution_graph(&records);
        let edge = graph.edge_between("step-a", "step-b").unwrap();
        assert!(edge.style.dashed);
        assert!(!edge.style.animated);
        assert_eq!(edge.style.stroke, GraphStyle::default().failure_color);
    }
}
