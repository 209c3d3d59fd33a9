//! # Anchor Status State Machine
//!
//! Tracks whether a credential has been recorded on the external integrity
//! ledger and whether it has been revoked.
//!
//! ```text
//! Unanchored ──▶ Anchored ──▶ Revoked (terminal)
//!      │                         ▲
//!      └─────────────────────────┘
//! ```
//!
//! `Revoked` is terminal. Same-state "transitions" are not transitions and
//! are rejected here; callers that want idempotence (revoke twice, anchor
//! with the same reference twice) check the current state first.

use serde::{Deserialize, Serialize};

use crate::error::TransitionError;

/// Ledger anchoring state of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorStatus {
    /// Registered locally; no reference recorded on the ledger yet.
    Unanchored,
    /// The ledger confirmed the recorded anchor reference.
    Anchored,
    /// Revoked by an issuer. Terminal.
    Revoked,
}

impl AnchorStatus {
    /// All states, in lifecycle order.
    pub const ALL: [AnchorStatus; 3] = [Self::Unanchored, Self::Anchored, Self::Revoked];

    /// The canonical string name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unanchored => "unanchored",
            Self::Anchored => "anchored",
            Self::Revoked => "revoked",
        }
    }

    /// Parse a canonical state name. Returns `None` for anything else.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "unanchored" => Some(Self::Unanchored),
            "anchored" => Some(Self::Anchored),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }

    /// The states reachable from this one in a single transition.
    pub fn valid_transitions(&self) -> &'static [AnchorStatus] {
        match self {
            Self::Unanchored => &[Self::Anchored, Self::Revoked],
            Self::Anchored => &[Self::Revoked],
            Self::Revoked => &[],
        }
    }

    /// Whether `to` is reachable from this state in one transition.
    pub fn can_transition_to(&self, to: AnchorStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Whether no transition leads out of this state.
    pub fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// Validate a transition, returning the new state.
    pub fn transition(self, to: AnchorStatus) -> Result<AnchorStatus, TransitionError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(TransitionError { from: self, to })
        }
    }
}

impl std::fmt::Display for AnchorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
