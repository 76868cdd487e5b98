//! # Configuration
//!
//! Layout spacing and color palette used by the builder.

use glam::Vec4;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Spacing constants for the deterministic layout.
///
/// Gates occupy the top row, compliance sits below them, and steps run down a
/// single column followed by logistics events. The counterfactual node lives in
/// a shadow lane to the right of the step column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Nominal node footprint used for collision checks. Default: 200x80.
    pub node_width: f32,
    pub node_height: f32,
    /// Y of the gate row. Default: 0.
    pub gate_row_y: f32,
    /// Horizontal distance between consecutive gates. Default: 250.
    pub gate_spacing_x: f32,
    /// Y of the compliance node. Default: 150.
    pub compliance_y: f32,
    /// X of the step column. Default: 0.
    pub step_column_x: f32,
    /// Y of the first step. Default: 300.
    pub step_origin_y: f32,
    /// Vertical distance between consecutive steps and logistics events. Default: 150.
    pub step_spacing_y: f32,
    /// X of the counterfactual shadow lane. Default: 450.
    pub shadow_lane_x: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 200.0,
            node_height: 80.0,
            gate_row_y: 0.0,
            gate_spacing_x: 250.0,
            compliance_y: 150.0,
            step_column_x: 0.0,
            step_origin_y: 300.0,
            step_spacing_y: 150.0,
            shadow_lane_x: 450.0,
        }
    }
}

impl LayoutConfig {
    /// Checks that the spacing can never place two nodes on top of each other,
    /// whatever the number of records.
    pub fn validate(&self) -> Result<(), GraphError> {
        let checks = [
            ("gate_spacing_x", self.gate_spacing_x, self.node_width),
            ("step_spacing_y", self.step_spacing_y, self.node_height),
            (
                "compliance_y",
                self.compliance_y - self.gate_row_y,
                self.node_height,
            ),
            (
                "step_origin_y",
                self.step_origin_y - self.compliance_y,
                self.node_height,
            ),
            (
                "shadow_lane_x",
                self.shadow_lane_x - self.step_column_x,
                self.node_width,
            ),
        ];

        for (field, gap, footprint) in checks {
            if !(gap >= footprint) {
                return Err(GraphError::InvalidLayout {
                    field,
                    gap,
                    footprint,
                });
            }
        }
        Ok(())
    }
}

/// Color palette for status-derived styling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphStyle {
    pub success_color: Vec4,
    pub failure_color: Vec4,
    pub active_color: Vec4,
    pub warning_color: Vec4,
    pub neutral_color: Vec4,
    /// Faint stroke for the counterfactual shadow lane.
    pub shadow_color: Vec4,
    pub node_fill: Vec4,
    /// Default wire width in screen pixels. Default: 2.0.
    pub edge_width: f32,
}

impl Default for GraphStyle {
    fn default() -> Self {
        Self {
            success_color: Vec4::new(0.13, 0.77, 0.37, 1.0),
            failure_color: Vec4::new(0.94, 0.27, 0.27, 1.0),
            active_color: Vec4::new(0.23, 0.51, 0.96, 1.0),
            warning_color: Vec4::new(0.96, 0.62, 0.04, 1.0),
            neutral_color: Vec4::new(0.58, 0.64, 0.72, 1.0),
            shadow_color: Vec4::new(0.58, 0.64, 0.72, 0.35),
            node_fill: Vec4::new(0.15, 0.15, 0.15, 1.0),
            edge_width: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_is_collision_free() {
        assert!(LayoutConfig::default().validate().is_ok());
    }

    #[test]
    fn test_cramped_layout_rejected() {
        let layout = LayoutConfig {
            step_spacing_y: 40.0,
            ..Default::default()
        };
        match layout.validate() {
            Err(GraphError::InvalidLayout { field, .. }) => assert_eq!(field, "step_spacing_y"),
            other => panic!("Expected InvalidLayout, got {:?}", other),
        }
    }
}
