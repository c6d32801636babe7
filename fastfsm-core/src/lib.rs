//! Runtime contract for fastfsm state machines.
//!
//! Everything in this crate is consumed by code that `#[fastfsm::fsm]`
//! generates. Users mostly touch [`InvalidTransition`], the
//! [`StateMachineExtension`] hooks and the [`StateMachine`] traits.

mod error;
mod extension;
mod hierarchy;
mod machine;

pub use error::InvalidTransition;
pub use extension::{ExtensionRunner, StateMachineExtension, TransitionContext};
pub use hierarchy::{Hierarchy, HistoryMode, HistoryTracker};
pub use machine::{AsyncStateMachine, GenerationVariant, StateMachine};
pub use tokio_util::sync::CancellationToken;

/// Re-exports used by generated code. Not part of the public API.
#[doc(hidden)]
pub mod __private {
    pub use tracing;
}
