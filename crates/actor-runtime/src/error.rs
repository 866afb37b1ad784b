//! # Runtime Errors
//!
//! Transport-level failures shared by every actor. Component errors wrap these with
//! `#[from]` so callers see a single error type per component.

/// Errors that can occur while talking to an actor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActorError {
    #[error("Actor closed")]
    ActorClosed,
    #[error("Actor dropped response channel")]
    ActorDropped,
}
