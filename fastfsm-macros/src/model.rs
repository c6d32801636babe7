//! The validated state machine model.
//!
//! Built once per annotated struct by the model builder, read by the variant
//! selector and the code generators, then dropped.

use std::fmt;

use syn::{Generics, Ident, Type};

use crate::analyzer::{CallbackRole, PayloadParam, TokenParam};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationVariant {
    Pure,
    Basic,
    WithPayload,
    WithMultiPayload,
    WithExtensions,
    Full,
}

impl GenerationVariant {
    pub fn has_extensions(self) -> bool {
        matches!(self, Self::WithExtensions | Self::Full)
    }

    pub fn has_payload(self) -> bool {
        matches!(self, Self::WithPayload | Self::WithMultiPayload | Self::Full)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Pure => "Pure",
            Self::Basic => "Basic",
            Self::WithPayload => "WithPayload",
            Self::WithMultiPayload => "WithMultiPayload",
            Self::WithExtensions => "WithExtensions",
            Self::Full => "Full",
        }
    }
}

impl fmt::Display for GenerationVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<crate::attrs::VariantArg> for GenerationVariant {
    fn from(arg: crate::attrs::VariantArg) -> Self {
        use crate::attrs::VariantArg;
        match arg {
            VariantArg::Pure => Self::Pure,
            VariantArg::Basic => Self::Basic,
            VariantArg::WithPayload => Self::WithPayload,
            VariantArg::WithMultiPayload => Self::WithMultiPayload,
            VariantArg::WithExtensions => Self::WithExtensions,
            VariantArg::Full => Self::Full,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryMode {
    #[default]
    None,
    Shallow,
    Deep,
}

impl From<crate::attrs::HistoryArg> for HistoryMode {
    fn from(arg: crate::attrs::HistoryArg) -> Self {
        use crate::attrs::HistoryArg;
        match arg {
            HistoryArg::None => Self::None,
            HistoryArg::Shallow => Self::Shallow,
            HistoryArg::Deep => Self::Deep,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    None,
    Single,
    Multi,
}

/// Feature usage observed in the declarations, independent of any forcing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub payload: PayloadKind,
    pub trigger_payloads: usize,
    pub entry_exit: bool,
    pub extensions: bool,
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Set by the variant selector.
    pub variant: GenerationVariant,
    pub forced: Option<GenerationVariant>,
    pub is_async: bool,
    pub has_payload: bool,
    pub has_entry_exit: bool,
    pub extensions_requested: bool,
    /// Accepted for compatibility; futures carry no captured context.
    pub continue_on_captured_context: bool,
    pub structural_api: bool,
    pub hierarchy: bool,
}

/// A resolved callback.
#[derive(Debug, Clone)]
pub struct CallbackModel {
    pub ident: Ident,
    pub role: CallbackRole,
    pub is_async: bool,
    pub fallible: bool,
    pub payload: PayloadParam,
    pub token: TokenParam,
    /// Returns a `JoinHandle` that is dropped after the call.
    pub detached: bool,
}

impl CallbackModel {
    pub fn expects_payload(&self) -> bool {
        !matches!(self.payload, PayloadParam::None)
    }

    /// Callable when no matching payload is present.
    pub fn has_parameterless_form(&self) -> bool {
        matches!(self.payload, PayloadParam::None | PayloadParam::Optional(_))
    }
}

#[derive(Debug, Clone)]
pub struct StateModel {
    pub ident: Ident,
    pub on_entry: Option<CallbackModel>,
    pub on_exit: Option<CallbackModel>,
    pub parent: Option<Ident>,
    pub is_initial: bool,
    pub history: HistoryMode,
}

impl StateModel {
    pub fn new(ident: Ident) -> Self {
        Self {
            ident,
            on_entry: None,
            on_exit: None,
            parent: None,
            is_initial: false,
            history: HistoryMode::None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransitionModel {
    pub from: Ident,
    pub trigger: Ident,
    pub to: Ident,
    pub internal: bool,
    pub guard: Option<CallbackModel>,
    pub action: Option<CallbackModel>,
    pub expected_payload: Option<Type>,
}

#[derive(Debug, Clone)]
pub struct StateMachineModel {
    pub ident: Ident,
    pub generics: Generics,
    pub module: Option<Ident>,
    pub state_type: Ident,
    pub trigger_type: Ident,
    /// Every member of the state enum, in declaration order.
    pub states: Vec<StateModel>,
    /// Every member of the trigger enum, in declaration order.
    pub triggers: Vec<Ident>,
    /// Registered transitions, in declaration order, without duplicates.
    pub transitions: Vec<TransitionModel>,
    pub default_payload: Option<Type>,
    pub trigger_payloads: Vec<(Ident, Type)>,
    /// User fields, kept as constructor parameters.
    pub fields: Vec<(Ident, Type)>,
    pub config: GenerationConfig,
}

impl StateMachineModel {
    pub fn state(&self, ident: &Ident) -> Option<&StateModel> {
        self.states.iter().find(|state| &state.ident == ident)
    }

    pub fn state_index(&self, ident: &Ident) -> Option<usize> {
        self.states.iter().position(|state| &state.ident == ident)
    }

    pub fn payload_kind(&self) -> PayloadKind {
        if !self.trigger_payloads.is_empty() {
            PayloadKind::Multi
        } else if self.default_payload.is_some() {
            PayloadKind::Single
        } else {
            PayloadKind::None
        }
    }

    pub fn features(&self) -> Features {
        Features {
            payload: self.payload_kind(),
            trigger_payloads: self.trigger_payloads.len(),
            entry_exit: self.config.has_entry_exit,
            extensions: self.config.extensions_requested,
        }
    }

    /// Expected payload for a trigger: its own type, else the default.
    pub fn payload_for(&self, trigger: &Ident) -> Option<&Type> {
        self.trigger_payloads
            .iter()
            .find(|(candidate, _)| candidate == trigger)
            .map(|(_, ty)| ty)
            .or(self.default_payload.as_ref())
    }

    /// Transitions declared directly on `state`, in declaration order.
    pub fn transitions_from<'a>(&'a self, state: &'a Ident) -> impl Iterator<Item = &'a TransitionModel> + 'a {
        self.transitions
            .iter()
            .filter(move |transition| &transition.from == state)
    }

    pub fn children_of<'a>(&'a self, state: &'a Ident) -> impl Iterator<Item = &'a StateModel> + 'a {
        self.states
            .iter()
            .filter(move |candidate| candidate.parent.as_ref() == Some(state))
    }

    pub fn is_composite(&self, state: &Ident) -> bool {
        self.children_of(state).next().is_some()
    }

    /// Ancestors of `state`, innermost first.
    pub fn ancestors(&self, state: &Ident) -> Vec<&StateModel> {
        let mut chain = Vec::new();
        let mut current = self.state(state).and_then(|s| s.parent.as_ref());
        while let Some(parent) = current {
            let Some(model) = self.state(parent) else {
                break;
            };
            if chain.len() > self.states.len() {
                break;
            }
            chain.push(model);
            current = model.parent.as_ref();
        }
        chain
    }

    /// Candidate transitions for `state`: its own first, then those of each
    /// ancestor, innermost first. Declaration order holds within a level.
    pub fn effective_transitions<'a>(&'a self, state: &'a Ident) -> Vec<&'a TransitionModel> {
        let mut effective: Vec<&TransitionModel> = self.transitions_from(state).collect();
        if !self.config.hierarchy {
            return effective;
        }
        for ancestor in self.ancestors(state) {
            effective.extend(self.transitions_from(&ancestor.ident));
        }
        effective
    }

    /// Effective transitions grouped by trigger, in order of first appearance.
    /// Dispatch tries each group's candidates in turn until a guard passes.
    pub fn candidates<'a>(&'a self, state: &'a Ident) -> Vec<(&'a Ident, Vec<&'a TransitionModel>)> {
        let mut groups: Vec<(&Ident, Vec<&TransitionModel>)> = Vec::new();
        for transition in self.effective_transitions(state) {
            match groups.iter_mut().find(|(trigger, _)| **trigger == transition.trigger) {
                Some((_, group)) => group.push(transition),
                None => groups.push((&transition.trigger, vec![transition])),
            }
        }
        groups
    }

    /// Child used when entering `composite` without history.
    ///
    /// Falls back to the first declared child when only history is configured.
    pub fn entry_child<'a>(&'a self, composite: &'a Ident) -> Option<&'a StateModel> {
        let mut children = self.children_of(composite).peekable();
        let first = children.peek().copied();
        children.find(|child| child.is_initial).or(first)
    }

    pub fn callbacks(&self) -> impl Iterator<Item = &CallbackModel> {
        let transition_callbacks = self
            .transitions
            .iter()
            .flat_map(|transition| transition.guard.iter().chain(transition.action.iter()));
        let state_callbacks = self
            .states
            .iter()
            .flat_map(|state| state.on_entry.iter().chain(state.on_exit.iter()));
        transition_callbacks.chain(state_callbacks)
    }
}
