//! # Cellar Playback
//!
//! Timed, pausable replay of a trade-execution run over the `execution_step`
//! nodes of an `ExecutionGraph`.
//!
//! ## Core Architecture
//! - **Machine (`src/machine.rs`)**: The finite state machine. Owns the playback
//!   position and a single pending timer, advanced by a logical clock.
//! - **Projection (`src/projection.rs`)**: Recomputes node `visual_status` and
//!   edge flags from the machine, never in place.
//! - **Driver (`src/driver.rs`)**: Runs the machine in real time on a tokio task,
//!   behind a command channel and an event bus.

pub mod config;
pub mod driver;
pub mod error;
pub mod machine;
pub mod projection;
pub mod state;
pub mod timer;

// Re-exports for convenience
pub use config::PlaybackConfig;
pub use driver::{PlaybackDriver, PlaybackHandle};
pub use error::{ConfigError, PlaybackError};
pub use machine::{EVENT_BACKLOG, PlaybackMachine};
pub use projection::project;
pub use state::{ExecutionState, PlaybackEvent, PlaybackSnapshot, StepVisualState};
