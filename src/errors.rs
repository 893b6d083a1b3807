//! Typed error hierarchy for the part-tracking client.
//!
//! A single enum covers every failure the core can report. Variants fall
//! into four classes (see [`ErrorKind`]):
//! - `Validation`: detected locally, nothing was sent to the server
//! - `NotFound`: the server reported a missing part or record
//! - `Conflict`: the server rejected a take/complete because of a race
//! - `Transport`: network, timeout, authorization or decoding failures

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Operator-facing failure class used to pick the notice style and the
/// fallback message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Transport,
}

/// Errors returned by every operation of the tracking core.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("operator already has an active part ({part_id}); finish it before taking another")]
    ActiveTaskHeld { tracking_id: i64, part_id: Uuid },

    #[error("no active task with tracking id {tracking_id} for this operator")]
    NoActiveTask { tracking_id: i64 },

    #[error("a take/complete command is already in flight for operator {operator_id}")]
    CommandInFlight { operator_id: i64 },

    #[error("QR payload does not contain a part identifier: {payload:?}")]
    InvalidPayload { payload: String },

    #[error("no session token available")]
    MissingToken,

    #[error("session expired; log in again")]
    SessionExpired,

    #[error("invalid session token: {0}")]
    InvalidToken(String),

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("not authorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("server rejected request ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("request timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("unexpected response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    #[error("camera unavailable: {0}")]
    Media(String),
}

impl TrackerError {
    /// Map the variant onto the four operator-facing classes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ActiveTaskHeld { .. }
            | Self::NoActiveTask { .. }
            | Self::CommandInFlight { .. }
            | Self::InvalidPayload { .. }
            | Self::MissingToken
            | Self::SessionExpired
            | Self::InvalidToken(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Unauthorized { .. }
            | Self::Server { .. }
            | Self::Timeout { .. }
            | Self::Transport(_)
            | Self::InvalidResponse { .. }
            | Self::Media(_) => ErrorKind::Transport,
        }
    }

    /// True when the failure was decided locally and no request was issued.
    pub fn is_local(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// Message to show the operator.
    ///
    /// Server-provided text is passed through verbatim; transport failures
    /// get a generic retry hint.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { message }
            | Self::Conflict { message }
            | Self::Server { message, .. }
            | Self::Unauthorized { message, .. }
                if !message.trim().is_empty() =>
            {
                message.clone()
            }
            Self::NotFound { .. } => "The requested part or task was not found.".to_string(),
            Self::Conflict { .. } => {
                "Another session already holds this part. Refresh and pick another one.".to_string()
            }
            Self::Unauthorized { .. } => {
                "You are not authorized for this action. Check your session.".to_string()
            }
            Self::Server { .. }
            | Self::Timeout { .. }
            | Self::Transport(_)
            | Self::InvalidResponse { .. } => {
                "Could not complete the request. Check the connection and try again.".to_string()
            }
            other => other.to_string(),
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout { after: timeout }
        } else {
            Self::Transport(err)
        }
    }
}
