//! Core types for the hotline IVR
//!
//! This crate provides foundational types used across all other crates:
//! - Inbound speech events
//! - Conversation turns
//! - Reference numbers handed to callers
//! - Error types
//! - Attempt-with-fallback combinators for best-effort collaborators

pub mod conversation;
pub mod error;
pub mod fallback;
pub mod reference;
pub mod transcript;

pub use conversation::{Turn, TurnRole};
pub use error::{Error, Result};
pub use fallback::{attempt, attempt_within};
pub use reference::{ReferenceKind, ReferenceNumber};
pub use transcript::SpeechInput;
