use std::fmt;
use std::path::PathBuf;

/// Result type for training operations
pub type Result<T> = std::result::Result<T, DqnError>;

/// Main error type for the DQN trainer
#[derive(Debug, Clone)]
pub enum DqnError {
    /// Fewer transitions stored than a sample asked for
    InsufficientData {
        requested: usize,
        available: usize,
    },

    /// A persisted weight artifact could not be restored
    ArtifactLoad {
        path: PathBuf,
        reason: String,
    },

    /// Failure reported by (or detected in) the environment adapter
    Environment(String),

    /// Invalid dimensions for operations
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Invalid parameter value
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// Action index outside the discrete action space
    InvalidAction {
        action: usize,
        num_actions: usize,
    },

    /// IO errors (file operations)
    IoError(String),

    /// Serialization/deserialization errors
    SerializationError(String),

    /// Training error
    TrainingError(String),
}

impl fmt::Display for DqnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DqnError::InsufficientData { requested, available } => {
                write!(f, "Insufficient data: requested {} transitions, {} stored", requested, available)
            }
            DqnError::ArtifactLoad { path, reason } => {
                write!(f, "Cannot load weight artifact {}: {}", path.display(), reason)
            }
            DqnError::Environment(msg) => write!(f, "Environment error: {}", msg),
            DqnError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, actual)
            }
            DqnError::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter '{}': {}", name, reason)
            }
            DqnError::InvalidAction { action, num_actions } => {
                write!(f, "Invalid action {}: must be less than {}", action, num_actions)
            }
            DqnError::IoError(msg) => write!(f, "IO error: {}", msg),
            DqnError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            DqnError::TrainingError(msg) => write!(f, "Training error: {}", msg),
        }
    }
}

impl std::error::Error for DqnError {}

impl From<std::io::Error> for DqnError {
    fn from(err: std::io::Error) -> Self {
        DqnError::IoError(err.to_string())
    }
}

impl From<bincode::Error> for DqnError {
    fn from(err: bincode::Error) -> Self {
        DqnError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for DqnError {
    fn from(err: serde_json::Error) -> Self {
        DqnError::SerializationError(err.to_string())
    }
}

impl From<tempfile::PersistError> for DqnError {
    fn from(err: tempfile::PersistError) -> Self {
        DqnError::IoError(err.error.to_string())
    }
}

// Helper functions for common error patterns
impl DqnError {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        DqnError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        DqnError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn artifact_load<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        DqnError::ArtifactLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error is the expected warm-up condition rather than a failure
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DqnError::InsufficientData { .. })
    }
}
