//! # Error Hierarchy
//!
//! Structured error types for the credential domain, built with `thiserror`.
//! Each variant carries the state that made the operation fail so callers
//! can map it to a stable external code without string matching.

use thiserror::Error;

use crate::anchor::AnchorStatus;

/// A requested [`AnchorStatus`] change is not permitted by the state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid anchor status transition from {from} to {to}")]
pub struct TransitionError {
    /// The current status.
    pub from: AnchorStatus,
    /// The requested status.
    pub to: AnchorStatus,
}

/// Errors while recording an anchor reference on a credential.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnchorError {
    /// A different reference is already recorded. References are write-once.
    #[error("anchor reference already set to {existing:?}; refusing to replace with {attempted:?}")]
    ReferenceConflict {
        /// The reference currently recorded.
        existing: String,
        /// The reference the caller attempted to record.
        attempted: String,
    },

    /// The supplied reference was empty or whitespace.
    #[error("anchor reference must not be empty")]
    EmptyReference,

    /// The status change that accompanies anchoring is not permitted.
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Validation failures for a credential registration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required text field was empty after trimming.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// A text field exceeded its maximum length.
    #[error("{field} must not exceed {max} characters")]
    TooLong {
        /// The offending field.
        field: &'static str,
        /// Maximum permitted length.
        max: usize,
    },

    /// The expiry date precedes the issue date.
    #[error("expiry date {expiry} is before issue date {issued}")]
    ExpiryBeforeIssue {
        /// Issue date as supplied.
        issued: String,
        /// Expiry date as supplied.
        expiry: String,
    },

    /// Too many skills were associated with one credential.
    #[error("a credential may reference at most {max} skills")]
    TooManySkills {
        /// Maximum permitted skill count.
        max: usize,
    },
}
