//! Error types shared by every pipeline stage.

use std::path::PathBuf;

use thiserror::Error;

use crate::candidate::CameraId;

/// Boxed error produced by an external detector or tagger.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, ScouterError>;

#[derive(Debug, Error)]
pub enum ScouterError {
    /// Malformed or inconsistent configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[source] serde_json::Error),

    #[error("failed to read configuration file {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A candidate or frame references a camera that is not registered.
    #[error("unknown camera id {0}")]
    UnknownCamera(CameraId),

    /// Per-cycle data that cannot be processed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// `track()` was called while no cycle can be resolved.
    #[error("tracker is not ready")]
    NotReady,

    #[error("detection failed: {0}")]
    Detection(#[source] BoxError),

    #[error("tagging failed: {0}")]
    Tagging(#[source] BoxError),

    #[error("failed to serialize: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("instance state lock poisoned")]
    LockPoisoned,
}

/// Coarse classification used by drivers to decide whether to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Stop the pipeline.
    Configuration,
    /// Skip the current cycle and continue.
    InvalidInput,
    /// Shared state is unusable.
    Internal,
}

impl ScouterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) | Self::ConfigParse(_) | Self::ConfigIo { .. } => {
                ErrorKind::Configuration
            }
            Self::UnknownCamera(_)
            | Self::InvalidInput(_)
            | Self::NotReady
            | Self::Detection(_)
            | Self::Tagging(_)
            | Self::Serialization(_) => ErrorKind::InvalidInput,
            Self::LockPoisoned => ErrorKind::Internal,
        }
    }

    /// Whether the pipeline must stop rather than skip the cycle.
    pub fn is_fatal(&self) -> bool {
        self.kind() != ErrorKind::InvalidInput
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
