//! Extension hooks invoked around every transition attempt.

use std::any::Any;
use std::fmt::{self, Debug};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Facts about one transition attempt, handed to every extension hook.
pub struct TransitionContext<'a, S, T> {
    pub from: S,
    pub trigger: T,
    pub to: S,
    /// Payload passed with the trigger, if the machine carries payloads.
    pub payload: Option<&'a (dyn Any + Send + Sync)>,
}

impl<'a, S: Copy, T: Copy> TransitionContext<'a, S, T> {
    pub fn new(from: S, trigger: T, to: S, payload: Option<&'a (dyn Any + Send + Sync)>) -> Self {
        Self {
            from,
            trigger,
            to,
            payload,
        }
    }

    /// Downcasts the payload to `P`.
    pub fn payload_as<P: Any>(&self) -> Option<&'a P> {
        self.payload.and_then(|payload| payload.downcast_ref::<P>())
    }
}

impl<S: Debug, T: Debug> Debug for TransitionContext<'_, S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionContext")
            .field("from", &self.from)
            .field("trigger", &self.trigger)
            .field("to", &self.to)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

/// Observer of a machine's transitions.
///
/// All hooks default to no-ops. Hooks observe; they cannot veto a transition.
pub trait StateMachineExtension<S, T>: Send + Sync {
    fn on_before_transition(&self, _context: &TransitionContext<'_, S, T>) {}

    /// `success` is `false` when a guard rejected the transition or a callback failed.
    fn on_after_transition(&self, _context: &TransitionContext<'_, S, T>, _success: bool) {}

    fn on_guard_evaluation(&self, _context: &TransitionContext<'_, S, T>, _guard: &'static str) {}

    fn on_guard_evaluated(
        &self,
        _context: &TransitionContext<'_, S, T>,
        _guard: &'static str,
        _result: bool,
    ) {
    }
}

/// Ordered list of extensions owned by a generated machine.
///
/// A panicking extension is logged and skipped so it cannot corrupt the
/// machine or starve the extensions registered after it.
pub struct ExtensionRunner<S, T> {
    extensions: Vec<Box<dyn StateMachineExtension<S, T>>>,
}

impl<S, T> Default for ExtensionRunner<S, T> {
    fn default() -> Self {
        Self {
            extensions: Vec::new(),
        }
    }
}

impl<S, T> Debug for ExtensionRunner<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRunner")
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

impl<S: Debug, T: Debug> ExtensionRunner<S, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, extension: impl StateMachineExtension<S, T> + 'static) {
        self.extensions.push(Box::new(extension));
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn before_transition(&self, context: &TransitionContext<'_, S, T>) {
        self.each("on_before_transition", context, |ext| {
            ext.on_before_transition(context)
        });
    }

    pub fn after_transition(&self, context: &TransitionContext<'_, S, T>, success: bool) {
        self.each("on_after_transition", context, |ext| {
            ext.on_after_transition(context, success)
        });
    }

    pub fn guard_evaluation(&self, context: &TransitionContext<'_, S, T>, guard: &'static str) {
        self.each("on_guard_evaluation", context, |ext| {
            ext.on_guard_evaluation(context, guard)
        });
    }

    pub fn guard_evaluated(
        &self,
        context: &TransitionContext<'_, S, T>,
        guard: &'static str,
        result: bool,
    ) {
        self.each("on_guard_evaluated", context, |ext| {
            ext.on_guard_evaluated(context, guard, result)
        });
    }

    fn each<F>(&self, hook: &'static str, context: &TransitionContext<'_, S, T>, call: F)
    where
        F: Fn(&dyn StateMachineExtension<S, T>),
    {
        for (index, extension) in self.extensions.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| call(extension.as_ref()))).is_err() {
                tracing::error!(
                    hook,
                    extension = index,
                    from = ?context.from,
                    trigger = ?context.trigger,
                    "state machine extension panicked"
                );
            }
        }
    }
}
