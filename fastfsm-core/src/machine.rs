use std::fmt::Debug;
use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::InvalidTransition;

/// The generation shape chosen for a machine.
///
/// Exposed on every generated machine as `VARIANT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationVariant {
    /// No payload, no entry/exit callbacks, no extensions.
    Pure,
    /// Entry/exit callbacks, no payload.
    Basic,
    /// One payload type shared by all triggers.
    WithPayload,
    /// A payload type per trigger.
    WithMultiPayload,
    /// Extension hooks, no payload.
    WithExtensions,
    /// Payload, extension hooks and callbacks.
    Full,
}

impl GenerationVariant {
    pub fn has_payload(self) -> bool {
        matches!(
            self,
            Self::WithPayload | Self::WithMultiPayload | Self::Full
        )
    }

    pub fn has_extensions(self) -> bool {
        matches!(self, Self::WithExtensions | Self::Full)
    }
}

/// Dispatch surface of a synchronous generated machine.
///
/// Payload machines also get inherent `try_fire_with`, `fire_with` and
/// `can_fire_with`. The payload is passed on as
/// `&(dyn Any + Send + Sync)`, so payload types must be
/// `Send + Sync + 'static`.
pub trait StateMachine {
    type State: Copy + Debug;
    type Trigger: Copy + Debug;

    fn current_state(&self) -> Self::State;

    /// Attempts the trigger and reports whether a transition was taken.
    fn try_fire(&mut self, trigger: Self::Trigger) -> bool;

    fn fire(
        &mut self,
        trigger: Self::Trigger,
    ) -> Result<(), InvalidTransition<Self::State, Self::Trigger>>;

    fn can_fire(&self, trigger: Self::Trigger) -> bool;

    fn permitted_triggers(&self) -> Vec<Self::Trigger>;
}

/// Dispatch surface of an asynchronous generated machine.
///
/// The token is forwarded to every callback that accepts one.
pub trait AsyncStateMachine {
    type State: Copy + Debug;
    type Trigger: Copy + Debug;

    fn current_state(&self) -> Self::State;

    fn try_fire(
        &mut self,
        trigger: Self::Trigger,
        cancel: &CancellationToken,
    ) -> impl Future<Output = bool>;

    fn fire(
        &mut self,
        trigger: Self::Trigger,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), InvalidTransition<Self::State, Self::Trigger>>>;

    fn can_fire(
        &self,
        trigger: Self::Trigger,
        cancel: &CancellationToken,
    ) -> impl Future<Output = bool>;

    fn permitted_triggers(&self, cancel: &CancellationToken)
    -> impl Future<Output = Vec<Self::Trigger>>;
}
