use std::path::PathBuf;
use thiserror::Error;

/// Terminal failure of a pipeline job. None of these are retried; every
/// variant maps to exactly one failed `Outcome`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("engine executable not found: {}", .0.display())]
    EngineMissing(PathBuf),

    #[error("failed to decode {}: {:#}", .path.display(), .source)]
    InputDecode {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to start engine {}: {}", .path.display(), .source)]
    EngineStart {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("engine execution failed{}: {}", timeout_note(.timed_out), .stderr)]
    EngineExecution { stderr: String, timed_out: bool },

    #[error("failed to encode {}: {:#}", .path.display(), .source)]
    OutputEncode {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("a job is already running on this coordinator")]
    AlreadyRunning,

    #[error("input path has no usable file name: {}", .0.display())]
    InvalidInput(PathBuf),

    #[error("invalid log pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn timeout_note(timed_out: &bool) -> &'static str {
    if *timed_out { " (timed out)" } else { "" }
}

impl PipelineError {
    /// Stable machine-readable tag for the run summary, so callers can
    /// dispatch without inspecting the message text.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::EngineMissing(_) => "engine_missing",
            PipelineError::InputDecode { .. } => "input_decode",
            PipelineError::EngineStart { .. } => "engine_start",
            PipelineError::EngineExecution { .. } => "engine_execution",
            PipelineError::OutputEncode { .. } => "output_encode",
            PipelineError::AlreadyRunning => "already_running",
            PipelineError::InvalidInput(_) => "invalid_input",
            PipelineError::InvalidPattern { .. } => "invalid_pattern",
            PipelineError::Io(_) => "io",
        }
    }
}
