#![deny(missing_docs)]

//! # credtrust-core: Foundational Types for the Credential Trust Core
//!
//! Every other crate in the workspace depends on this one. It performs no
//! I/O and has no internal crate dependencies. It uses only `serde`, `serde_json`,
//! `thiserror`, `chrono`, `uuid`, and `sha2` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** A [`UserId`] cannot be passed
//!    where a [`CredentialId`] is expected.
//!
//! 2. **One state machine.** [`AnchorStatus`] owns the legal transitions
//!    (`unanchored → anchored → revoked`, `unanchored → revoked`). Every
//!    layer that changes the status goes through [`AnchorStatus::transition`].
//!
//! 3. **Write-once anchoring.** [`Credential::record_anchor`] refuses to
//!    replace an anchor reference once one is recorded.
//!
//! 4. **Structured errors.** `thiserror` enums, no `.unwrap()` outside tests.

pub mod anchor;
pub mod credential;
pub mod error;
pub mod identity;

pub use anchor::AnchorStatus;
pub use credential::{
    Credential, CredentialType, NewCredential, VerificationArtifact, Visibility, MAX_SKILLS,
    MAX_TEXT_LEN,
};
pub use error::{AnchorError, TransitionError, ValidationError};
pub use identity::{CredentialId, SkillId, UserId};
