//! Diagnostic rule engine.
//!
//! Every rule is a pure function from a small, rule-specific context to a list
//! of [`Outcome`]s. Rules never see syntax trees or spans; the model builder
//! attaches locations when it turns outcomes into diagnostics.

pub mod asynchrony;
pub mod config;
pub mod hierarchy;
pub mod signatures;
pub mod transitions;

use std::fmt;

/// How an outcome affects generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Reported and suppresses emission for the machine.
    Error,
    /// Reported, emission proceeds.
    Warning,
    /// Kept in the report only.
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    DuplicateTransition,
    UnreachableState,
    InvalidMethodSignature,
    MissingStateMachineAttribute,
    InvalidTypesInAttribute,
    InvalidEnumValue,
    MissingPayloadType,
    ConflictingPayloadConfiguration,
    InvalidForcedVariant,
    GuardWithPayloadInNonPayloadMachine,
    MixedSyncAsyncCallbacks,
    InvalidGuardFutureReturn,
    AsyncCallbackInSyncMachine,
    InvalidAsyncVoid,
    CircularHierarchy,
    OrphanSubstate,
    InvalidHierarchyConfiguration,
    MultipleInitialSubstates,
    InvalidHistoryConfiguration,
    CompositeTransitionTarget,
}

/// Every rule, in identifier order.
pub const CATALOG: &[Rule] = &[
    Rule::DuplicateTransition,
    Rule::UnreachableState,
    Rule::InvalidMethodSignature,
    Rule::MissingStateMachineAttribute,
    Rule::InvalidTypesInAttribute,
    Rule::InvalidEnumValue,
    Rule::MissingPayloadType,
    Rule::ConflictingPayloadConfiguration,
    Rule::InvalidForcedVariant,
    Rule::GuardWithPayloadInNonPayloadMachine,
    Rule::MixedSyncAsyncCallbacks,
    Rule::InvalidGuardFutureReturn,
    Rule::AsyncCallbackInSyncMachine,
    Rule::InvalidAsyncVoid,
    Rule::CircularHierarchy,
    Rule::OrphanSubstate,
    Rule::InvalidHierarchyConfiguration,
    Rule::MultipleInitialSubstates,
    Rule::InvalidHistoryConfiguration,
    Rule::CompositeTransitionTarget,
];

const GENERATOR: &str = "FSM.Generator";
const GENERATOR_ASYNC: &str = "FSM.Generator.Async";
const GENERATOR_HSM: &str = "FSM.Generator.HSM";

impl Rule {
    /// Stable identifier shown in every message.
    pub fn id(self) -> &'static str {
        match self {
            Self::DuplicateTransition => "FSM001",
            Self::UnreachableState => "FSM002",
            Self::InvalidMethodSignature => "FSM003",
            Self::MissingStateMachineAttribute => "FSM004",
            Self::InvalidTypesInAttribute => "FSM005",
            Self::InvalidEnumValue => "FSM006",
            Self::MissingPayloadType => "FSM007",
            Self::ConflictingPayloadConfiguration => "FSM008",
            Self::InvalidForcedVariant => "FSM009",
            Self::GuardWithPayloadInNonPayloadMachine => "FSM010",
            Self::MixedSyncAsyncCallbacks => "FSM011",
            Self::InvalidGuardFutureReturn => "FSM012",
            Self::AsyncCallbackInSyncMachine => "FSM013",
            Self::InvalidAsyncVoid => "FSM014",
            Self::CircularHierarchy => "FSM100",
            Self::OrphanSubstate => "FSM101",
            Self::InvalidHierarchyConfiguration => "FSM102",
            Self::MultipleInitialSubstates => "FSM103",
            Self::InvalidHistoryConfiguration => "FSM104",
            Self::CompositeTransitionTarget => "FSM105",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::DuplicateTransition => "Duplicate transition",
            Self::UnreachableState => "Unreachable state",
            Self::InvalidMethodSignature => "Invalid method signature",
            Self::MissingStateMachineAttribute => "Missing or invalid state_machine attribute",
            Self::InvalidTypesInAttribute => "State and trigger types must be enums",
            Self::InvalidEnumValue => "Invalid enum value",
            Self::MissingPayloadType => "Missing payload type",
            Self::ConflictingPayloadConfiguration => "Conflicting payload configuration",
            Self::InvalidForcedVariant => "Invalid forced variant configuration",
            Self::GuardWithPayloadInNonPayloadMachine => "Guard expects a payload the machine never carries",
            Self::MixedSyncAsyncCallbacks => "Mixed sync and async callbacks",
            Self::InvalidGuardFutureReturn => "Async guard must resolve to bool",
            Self::AsyncCallbackInSyncMachine => "Async callback in a synchronous machine",
            Self::InvalidAsyncVoid => "Fire-and-forget callback",
            Self::CircularHierarchy => "Circular hierarchy",
            Self::OrphanSubstate => "Orphan substate",
            Self::InvalidHierarchyConfiguration => "Composite state without entry child",
            Self::MultipleInitialSubstates => "Multiple initial substates",
            Self::InvalidHistoryConfiguration => "History on a non-composite state",
            Self::CompositeTransitionTarget => "Transition targets a composite state",
        }
    }

    pub fn category(self) -> &'static str {
        match self {
            Self::MixedSyncAsyncCallbacks
            | Self::InvalidGuardFutureReturn
            | Self::AsyncCallbackInSyncMachine
            | Self::InvalidAsyncVoid => GENERATOR_ASYNC,
            Self::CircularHierarchy
            | Self::OrphanSubstate
            | Self::InvalidHierarchyConfiguration
            | Self::MultipleInitialSubstates
            | Self::InvalidHistoryConfiguration
            | Self::CompositeTransitionTarget => GENERATOR_HSM,
            _ => GENERATOR,
        }
    }

    pub fn default_severity(self) -> Severity {
        match self {
            Self::DuplicateTransition
            | Self::UnreachableState
            | Self::MissingStateMachineAttribute
            | Self::InvalidAsyncVoid
            | Self::InvalidHistoryConfiguration => Severity::Warning,
            Self::CompositeTransitionTarget => Severity::Info,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One finding of one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub rule: Rule,
    pub severity: Severity,
    pub message: String,
    /// The state or member the finding is about, used to pick a location.
    pub subject: Option<String>,
}

impl Outcome {
    pub fn new(rule: Rule, message: impl Into<String>) -> Self {
        Self {
            rule,
            severity: rule.default_severity(),
            message: message.into(),
            subject: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn about(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn identifiers_are_unique() {
        let ids: HashSet<_> = CATALOG.iter().map(|rule| rule.id()).collect();
        assert_eq!(ids.len(), CATALOG.len());
    }

    #[test]
    fn categories_follow_identifier_ranges() {
        for rule in CATALOG {
            let number: u32 = rule.id()[3..].parse().unwrap();
            let expected = match number {
                100.. => GENERATOR_HSM,
                11..=14 => GENERATOR_ASYNC,
                _ => GENERATOR,
            };
            assert_eq!(rule.category(), expected, "{rule}");
        }
    }

    #[test]
    fn outcome_defaults_to_rule_severity() {
        let outcome = Outcome::new(Rule::UnreachableState, "x");
        assert_eq!(outcome.severity, Severity::Warning);
        assert!(!outcome.is_error());
        let outcome = Outcome::new(Rule::InvalidMethodSignature, "x");
        assert!(outcome.is_error());
    }
}
