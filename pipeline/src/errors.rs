use std::path::PathBuf;

use structures::RenderMode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterFailure {
    #[error("filter tool exited with {}", describe_exit(.0))]
    ExitStatus(Option<i32>),
    /// Usually a wrong key: the filter ran but matched nothing.
    #[error("filter tool wrote an empty log")]
    EmptyOutput,
    #[error("filter tool wrote no log")]
    MissingOutput,
}

/// Outcomes a caller must handle, plus one channel for unexpected faults.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid canvas code {0:?}")]
    InvalidCanvasFormat(String),
    #[error("no log key registered for user {user} on canvas {canvas}")]
    NoKeyRegistered { user: u64, canvas: String },
    #[error("log key for user {user} on canvas {canvas} is malformed")]
    InvalidKeyFormat { user: u64, canvas: String },
    #[error("no log for canvas {canvas} at {}", .path.display())]
    MissingSourceLog { canvas: String, path: PathBuf },
    #[error("filtering canvas {canvas} failed: {failure}")]
    Filter {
        canvas: String,
        #[source]
        failure: FilterFailure,
    },
    #[error("rendering {mode} placemap for canvas {canvas} failed: render tool exited with {}", describe_exit(.status))]
    Render {
        canvas: String,
        mode: RenderMode,
        status: Option<i32>,
    },
    #[error(transparent)]
    Fault(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, PipelineError::Fault(_))
    }

    /// Text for the person who asked for the placemap.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::InvalidCanvasFormat(_) => {
                "Invalid format! A canvas code may not begin with a c, and can only contain a-z and 0-9.".to_string()
            }
            PipelineError::NoKeyRegistered { .. } => "No log key found for this canvas.".to_string(),
            PipelineError::InvalidKeyFormat { .. } => {
                "Invalid format! A log key can only contain a-z and 0-9.".to_string()
            }
            PipelineError::MissingSourceLog { .. } => {
                "No log file found. Either invalid canvas or the logs haven't been added yet.".to_string()
            }
            PipelineError::Filter {
                canvas,
                failure: FilterFailure::EmptyOutput,
            } => format!("Invalid log key for c{}. Wrong key?", canvas),
            PipelineError::Filter { .. } => {
                "Something went wrong when filtering the log file! Try again, or ask an admin if it keeps happening.".to_string()
            }
            PipelineError::Render { .. } => {
                "Something went wrong when generating the placemap! Try again, or ask an admin if it keeps happening.".to_string()
            }
            PipelineError::Fault(_) => {
                "An unexpected error occurred. Try again, or ask an admin if it keeps happening.".to_string()
            }
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (killed by signal)".to_string(),
    }
}
