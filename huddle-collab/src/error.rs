use huddle_core::{AdmissionError, RegistryError};
use log::error;
use serde::Serialize;
use thiserror::Error;

use crate::ServerEvent;

/// Stable codes clients can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    Forbidden,
    NotFound,
    Conflict,
    Cooldown,
    StreamLimit,
    ServerBusy,
    StreamFull,
    InternalError,
    MissingToken,
    InvalidToken,
    UserNotFound,
}

#[derive(Debug, Error)]
pub enum CollabError {
    /// A payload field is missing or malformed
    #[error("{0}")]
    Validation(String),
    /// The caller is not allowed to do this, for example because they are not the host
    #[error("{0}")]
    Forbidden(String),
    /// A user that was addressed directly is not connected
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Admission(#[from] AdmissionError),
    /// Something that should not happen, details are only logged
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CollabError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Registry(e) => match e {
                RegistryError::NotFound { .. } | RegistryError::NotMember { .. } => {
                    ErrorCode::NotFound
                }
                RegistryError::RoomTaken { .. } | RegistryError::SubscriptionBusy { .. } => {
                    ErrorCode::Conflict
                }
                RegistryError::Full { .. } => ErrorCode::StreamFull,
                RegistryError::NotHost { .. } | RegistryError::NotPermitted { .. } => {
                    ErrorCode::Forbidden
                }
            },
            Self::Admission(e) => match e {
                AdmissionError::Cooldown { .. } => ErrorCode::Cooldown,
                AdmissionError::StreamLimit { .. } => ErrorCode::StreamLimit,
                AdmissionError::ServerBusy { .. } => ErrorCode::ServerBusy,
            },
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Seconds the client should wait before trying again, if that is known
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::Admission(AdmissionError::Cooldown { remaining_secs }) => Some(*remaining_secs),
            _ => None,
        }
    }

    /// The message that is safe to show a client
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "Something went wrong".to_string(),
            e => e.to_string(),
        }
    }

    /// Turns the error into the event sent back to the connection that caused it
    pub fn to_event(&self) -> ServerEvent {
        if let Self::Internal(details) = self {
            error!("Internal error while handling an event: {}", details);
        }

        ServerEvent::Error {
            code: self.code(),
            message: self.public_message(),
            retry_after: self.retry_after(),
        }
    }
}

pub type CollabResult<T> = Result<T, CollabError>;
