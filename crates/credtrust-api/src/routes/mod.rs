//! # API Route Modules
//!
//! - `credentials`: registration, public reads, anchoring, revocation, and
//!   verification artifacts.
//! - `verify`: the public verification page behind artifact links.

pub mod credentials;
pub mod verify;
