use std::path::PathBuf;
use thiserror::Error;

use crate::exit_code;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Failed to run script {}: {source}", script.display())]
    Spawn {
        script: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open output channel: {0}")]
    Channel(String),

    #[error("Failed to kill timed-out child {pid}: {source}")]
    Kill {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for child {pid}: {source}")]
    Wait {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl SupervisorError {
    /// Exit code the supervisor terminates with when this error escapes.
    pub fn exit_code(&self) -> i32 {
        match self {
            SupervisorError::Spawn { .. }
            | SupervisorError::Channel(_)
            | SupervisorError::Wait { .. } => exit_code::SPAWN_FAILURE,
            SupervisorError::Kill { .. } => exit_code::KILL_FAILURE,
            SupervisorError::InvalidConfiguration(_) => exit_code::USAGE,
        }
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
