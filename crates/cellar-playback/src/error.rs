use thiserror::Error;

use crate::state::ExecutionState;

/// Rejected playback operations.
///
/// The plain operations on `PlaybackMachine` swallow these after logging them;
/// the `try_` variants hand them back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("execution can only start from IDLE, machine is {0:?}")]
    NotIdle(ExecutionState),

    #[error("there are no execution steps to play")]
    NothingToPlay,

    #[error("step {index} is out of range for {total} steps")]
    StepOutOfRange { index: usize, total: usize },

    #[error("playback has finished, reset before playing again")]
    AlreadyFinished,

    #[error("already at the {0} of the sequence")]
    AtBoundary(&'static str),

    #[error("playback driver has shut down")]
    DriverClosed,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid playback config: {0}")]
    Parse(#[from] serde_yaml::Error),
}
