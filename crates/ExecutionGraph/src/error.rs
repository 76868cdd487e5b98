use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("layout field `{field}` leaves a gap of {gap}, nodes need {footprint}")]
    InvalidLayout {
        field: &'static str,
        gap: f32,
        footprint: f32,
    },

    #[error("duplicate node id `{0}`")]
    DuplicateNode(String),

    #[error("edge `{edge}` references unknown node `{node}`")]
    DanglingEdge { edge: String, node: String },

    #[error("unsupported saved graph version {0}")]
    UnsupportedVersion(u32),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
