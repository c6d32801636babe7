use std::fmt::Debug;

/// Returned by `fire` when the current state has no enabled transition for
/// the trigger.
///
/// A guard that evaluates to `false`, a payload whose type does not match the
/// trigger, and a callback that returned `Err` all end up here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no valid transition from state {state:?} on trigger {trigger:?}{}", payload_suffix(.payload_type))]
pub struct InvalidTransition<S: Debug, T: Debug> {
    /// State the machine was in when the trigger was fired.
    pub state: S,
    /// The rejected trigger.
    pub trigger: T,
    /// Type name of the payload passed with the trigger, if any.
    pub payload_type: Option<&'static str>,
}

impl<S: Debug, T: Debug> InvalidTransition<S, T> {
    pub fn new(state: S, trigger: T) -> Self {
        Self {
            state,
            trigger,
            payload_type: None,
        }
    }

    pub fn with_payload<P: ?Sized>(state: S, trigger: T) -> Self {
        Self {
            state,
            trigger,
            payload_type: Some(std::any::type_name::<P>()),
        }
    }
}

fn payload_suffix(payload_type: &Option<&'static str>) -> String {
    match payload_type {
        Some(name) => format!(" with payload of type {name}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Door {
        Open,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Action {
        Lock,
    }

    #[test]
    fn message_without_payload() {
        let err = InvalidTransition::new(Door::Open, Action::Lock);
        assert_eq!(
            err.to_string(),
            "no valid transition from state Open on trigger Lock"
        );
    }

    #[test]
    fn message_names_payload_type() {
        let err = InvalidTransition::with_payload::<u32>(Door::Open, Action::Lock);
        assert_eq!(err.payload_type, Some("u32"));
        assert_eq!(
            err.to_string(),
            "no valid transition from state Open on trigger Lock with payload of type u32"
        );
    }
}
