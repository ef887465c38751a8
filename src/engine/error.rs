use thiserror::Error;
use ulid::Ulid;

use crate::calendar::CalendarError;
use crate::model::BookingStatus;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("no active booking with short code {0}")]
    UnknownShortCode(String),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("no availability for the requested window")]
    NoAvailability,
    #[error("slot no longer available, please choose another time")]
    SlotNoLongerAvailable,
    #[error("illegal transition: {from} -> {to}")]
    IllegalTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("overlaps existing record: {0}")]
    Overlap(Ulid),
    #[error("no unique short code after {0} attempts")]
    ShortCodeExhausted(u32),
    #[error("WAL error: {0}")]
    WalError(String),
}

/// How a caller is expected to react to an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller's fault; do not retry without correcting the request.
    Validation,
    /// Legitimate negative result; advance to another window.
    NoAvailability,
    /// Lost a commit race; recompute availability and ask the user again.
    SlotNoLongerAvailable,
    IllegalTransition,
    Overlap,
    /// Persistence failure; retry with backoff.
    Infrastructure,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_)
            | EngineError::NotFound(_)
            | EngineError::UnknownShortCode(_)
            | EngineError::LimitExceeded(_) => ErrorKind::Validation,
            EngineError::NoAvailability => ErrorKind::NoAvailability,
            EngineError::SlotNoLongerAvailable => ErrorKind::SlotNoLongerAvailable,
            EngineError::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            EngineError::Overlap(_) => ErrorKind::Overlap,
            EngineError::ShortCodeExhausted(_) | EngineError::WalError(_) => ErrorKind::Infrastructure,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Infrastructure
    }
}

impl From<CalendarError> for EngineError {
    fn from(e: CalendarError) -> Self {
        EngineError::Validation(e.to_string())
    }
}
