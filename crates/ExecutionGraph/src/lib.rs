//! # ExecutionGraph
//!
//! `execution_graph` turns the records of a trade-execution run (gates,
//! compliance, ordered steps, logistics, counterfactual) into a renderable
//! directed graph. It is headless: it computes structure, layout and style
//! hints, and leaves drawing to the host application.
//!
//! ## Core Architecture
//! - **Records (`src/records.rs`)**: Lenient input shapes from the execution backend.
//! - **Model (`src/model.rs`)**: Typed nodes and styled edges.
//! - **Builder (`src/builder.rs`)**: Deterministic layout and status-derived styling.
//! - **Persistence (`src/persistence.rs`)**: Versioned JSON snapshots.

pub mod builder;
pub mod config;
pub mod error;
pub mod model;
pub mod persistence;
pub mod records;

// Re-exports for convenience
pub use builder::{GraphBuilder, build_execution_graph};
pub use config::{GraphStyle, LayoutConfig};
pub use error::GraphError;
pub use model::{EdgeFlags, ExecutionGraph, GraphEdge, GraphNode, NodeKind, VisualStatus};
pub use records::{ExecutionRecords, StepStatus};
