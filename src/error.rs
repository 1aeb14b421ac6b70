//! Error taxonomy for the identity and recovery core.
//!
//! Structural errors (not found, invalid transition, duplicate code) surface
//! to the immediate caller for translation into an HTTP response. Channel
//! failures never appear here: the dispatcher captures them as
//! [`NotificationAttempt`](crate::model::NotificationAttempt) outcomes.

use crate::model::ReportStatus;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown public code or report id. Deliberately carries no detail so
    /// anonymous callers cannot distinguish "never existed" from
    /// "deactivated".
    #[error("not found")]
    NotFound,

    /// A status move that violates the forward-only report lifecycle.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: ReportStatus,
        to: ReportStatus,
    },

    /// The persistence layer reported a uniqueness violation on a freshly
    /// issued public code. Callers retry with a new draw.
    #[error("public code already in use")]
    DuplicateCode,

    /// The visual token could not be encoded.
    #[error("token encoding failed: {0}")]
    Generation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
