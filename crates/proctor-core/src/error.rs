//! Error taxonomy for a proctored attempt.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{SessionStatus, WarningKind};

/// A capability the Permission Gate must acquire before the session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CameraAndMicrophone,
    Fullscreen,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CameraAndMicrophone => f.write_str("camera/microphone"),
            Self::Fullscreen => f.write_str("fullscreen"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProctorError {
    /// Recoverable: the user may retry the request.
    #[error("{capability} permission denied: {reason}")]
    PermissionDenied {
        capability: Capability,
        reason: String,
    },

    /// Presence model not loaded or no frame available; the cycle is skipped.
    #[error("presence detector unavailable: {0}")]
    DetectorUnavailable(String),

    #[error("integrity violation: {0}")]
    IntegrityViolation(WarningKind),

    #[error("speech recognition failed: {0}")]
    RecognitionError(String),

    #[error("content generation failed: {0}")]
    GenerationFailure(String),

    #[error("persistence failed: {0}")]
    PersistenceFailure(String),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("{collection}/{id} not found")]
    NotFound { collection: &'static str, id: String },

    #[error("invalid session transition {from} -> {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("session is {0}, not active")]
    SessionNotActive(SessionStatus),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("code execution failed: {0}")]
    ExecutionFailure(String),
}

impl ProctorError {
    /// Only these errors may stop the terminal transition from completing.
    pub fn blocks_submission(&self) -> bool {
        matches!(self, Self::PersistenceFailure(_) | Self::NotAuthenticated)
    }

    pub fn not_found(collection: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProctorError>;
