//! Model builder.
//!
//! Walks one machine's declarations in source order, resolving enum
//! references and callbacks, running the rules on each declaration and
//! collecting every diagnostic before deciding whether a model exists.

use std::collections::HashSet;

use proc_macro2::Span;
use syn::{Ident, Type};

use crate::analyzer::{self, AsyncMode, CallbackMode, CallbackRole, ShapeClass, TokenParam};
use crate::attrs::{EnumRef, MemberName, PayloadTypeArgs, StateArgs, StateMachineArgs};
use crate::diagnostics::Report;
use crate::model::{
    CallbackModel, GenerationConfig, HistoryMode, StateMachineModel, StateModel, TransitionModel,
};
use crate::reader::{EnumFacts, MachineAttr, MachineDecl, ModuleFacts, StructShape};
use crate::rules::config::{self, DeclarationProblem};
use crate::rules::hierarchy::{self as hsm, HierarchyFacts, HierarchyState};
use crate::rules::signatures::{self, ExpectedPayload, type_text};
use crate::rules::transitions::{self, Reachability};
use crate::rules::{Outcome, asynchrony};
use crate::variant;

/// Builds the model for one machine, or returns `None` after reporting why not.
pub fn build(decl: &MachineDecl, facts: &ModuleFacts, report: &mut Report) -> Option<StateMachineModel> {
    let struct_span = decl.ident.span();
    let machine = decl.ident.to_string();

    let Some(primary) = decl.primary() else {
        report.extend(
            config::primary_declaration(&config::PrimaryDeclaration {
                machine: &machine,
                problem: Some(DeclarationProblem::MissingAttribute),
            }),
            struct_span,
        );
        return None;
    };

    let duplicates = decl
        .attrs
        .iter()
        .filter(|attr| matches!(attr, MachineAttr::StateMachine(_)))
        .count();
    if duplicates > 1 {
        report.extend(
            config::primary_declaration(&config::PrimaryDeclaration {
                machine: &machine,
                problem: Some(DeclarationProblem::DuplicateAttribute),
            }),
            primary.span,
        );
    }

    let problem = match (&decl.shape, &primary.args.state, &primary.args.trigger) {
        (StructShape::Tuple, _, _) => Some(DeclarationProblem::NotExtensible),
        (_, None, _) => Some(DeclarationProblem::MissingArgument("state")),
        (_, _, None) => Some(DeclarationProblem::MissingArgument("trigger")),
        _ => None,
    };
    if problem.is_some() {
        report.extend(
            config::primary_declaration(&config::PrimaryDeclaration {
                machine: &machine,
                problem,
            }),
            primary.span,
        );
        return None;
    }
    let (Some(state_ref), Some(trigger_ref)) = (&primary.args.state, &primary.args.trigger) else {
        return None;
    };

    let state_enum = state_ref.ident().and_then(|ident| facts.find_enum(ident));
    let trigger_enum = trigger_ref.ident().and_then(|ident| facts.find_enum(ident));
    let outcomes = config::enum_types(&config::EnumTypes {
        state: &state_ref.display(),
        trigger: &trigger_ref.display(),
        state_is_enum: state_enum.is_some(),
        trigger_is_enum: trigger_enum.is_some(),
    });
    let (Some(state_enum), Some(trigger_enum)) = (state_enum, trigger_enum) else {
        report.extend(outcomes, primary.span);
        return None;
    };

    let mut builder = ModelBuilder::new(decl, facts, report, state_enum, trigger_enum, &primary.args);
    builder.payload_declarations();
    builder.declarations();
    builder.check_tokens();
    builder.check_hierarchy(struct_span);

    let rejected = builder.report.has_errors() || decl.malformed;
    let spans = std::mem::take(&mut builder.state_spans);
    let model = builder.finish();
    check_reachability(&model, report, |name| locate_state(&spans, state_enum, name));

    if rejected {
        return None;
    }
    Some(model)
}

/// Reports states that cannot be reached from the first declared state.
///
/// Runs on partial models too, so it reports alongside any other error.
pub fn check_reachability(model: &StateMachineModel, report: &mut Report, locate: impl Fn(&str) -> Option<Span>) {
    let states: Vec<String> = model.states.iter().map(|state| state.ident.to_string()).collect();
    let mut edges: Vec<(String, String)> = model
        .transitions
        .iter()
        .map(|transition| (transition.from.to_string(), transition.to.to_string()))
        .collect();
    if model.config.hierarchy {
        for state in &model.states {
            if let Some(child) = model.entry_child(&state.ident) {
                edges.push((state.ident.to_string(), child.ident.to_string()));
            }
            if let Some(parent) = &state.parent {
                edges.push((state.ident.to_string(), parent.to_string()));
            }
        }
    }

    let outcomes = transitions::unreachable_states(&Reachability {
        states: &states,
        initial: states.first().map(String::as_str),
        edges: &edges,
    });
    report.extend_located(outcomes, model.ident.span(), locate);
}

struct ModelBuilder<'a> {
    decl: &'a MachineDecl,
    facts: &'a ModuleFacts,
    report: &'a mut Report,
    state_enum: &'a EnumFacts,
    trigger_enum: &'a EnumFacts,
    primary: &'a StateMachineArgs,

    states: Vec<StateModel>,
    /// Where each state was declared, for locating diagnostics.
    state_spans: Vec<(String, Span)>,
    /// Parent references that did not resolve, by state name.
    orphan_parents: Vec<(String, String)>,
    transitions: Vec<TransitionModel>,
    registered: HashSet<(String, String)>,
    default_payload: Option<Type>,
    trigger_payloads: Vec<(Ident, Type)>,
    has_entry_exit: bool,

    mode: AsyncMode,
    /// The callback that fixed the mode.
    mode_source: Option<String>,
    conflict_reported: bool,
    tokens: Vec<(String, CallbackRole, TokenParam, Span)>,
}

impl<'a> ModelBuilder<'a> {
    fn new(
        decl: &'a MachineDecl,
        facts: &'a ModuleFacts,
        report: &'a mut Report,
        state_enum: &'a EnumFacts,
        trigger_enum: &'a EnumFacts,
        primary: &'a StateMachineArgs,
    ) -> Self {
        let states = state_enum
            .members
            .iter()
            .map(|member| StateModel::new(member.ident.clone()))
            .collect();
        Self {
            decl,
            facts,
            report,
            state_enum,
            trigger_enum,
            primary,
            states,
            state_spans: Vec::new(),
            orphan_parents: Vec::new(),
            transitions: Vec::new(),
            registered: HashSet::new(),
            default_payload: None,
            trigger_payloads: Vec::new(),
            has_entry_exit: false,
            mode: AsyncMode::Unset,
            mode_source: None,
            conflict_reported: false,
            tokens: Vec::new(),
        }
    }

    fn has_payload(&self) -> bool {
        self.default_payload.is_some() || !self.trigger_payloads.is_empty()
    }

    fn variant_forced(&self) -> bool {
        self.primary.variant.is_some()
    }

    /// Machine-wide default first, then struct-level declarations, then
    /// declarations on methods.
    fn payload_declarations(&mut self) {
        if let Some(payload) = &self.primary.payload {
            self.default_payload = Some(payload.0.clone());
        }

        let decl = self.decl;
        for attr in &decl.attrs {
            if let MachineAttr::PayloadType(payload) = attr {
                self.declare_payload(&payload.args, payload.span, None);
            }
        }

        let facts = self.facts;
        for method in facts.methods_of(&decl.ident) {
            for payload in &method.payload_types {
                self.declare_payload(&payload.args, payload.span, Some(&method.ident));
            }
        }
    }

    fn declare_payload(&mut self, args: &PayloadTypeArgs, span: Span, on_method: Option<&Ident>) {
        let declared = &args.ty.0;
        let method = on_method.map(Ident::to_string);

        let Some(trigger) = &args.trigger else {
            match &self.default_payload {
                Some(existing) => {
                    let outcomes = config::payload_redeclaration(&config::PayloadRedeclaration {
                        trigger: None,
                        existing: &type_text(existing),
                        declared: &type_text(declared),
                        on_method: method.as_deref(),
                    });
                    self.report.extend(outcomes, span);
                }
                None => self.default_payload = Some(declared.clone()),
            }
            return;
        };

        let Some(trigger) = self.resolve_trigger(trigger) else {
            return;
        };
        match self.trigger_payloads.iter().find(|(existing, _)| existing == &trigger) {
            Some((_, existing)) => {
                let outcomes = config::payload_redeclaration(&config::PayloadRedeclaration {
                    trigger: Some(&trigger.to_string()),
                    existing: &type_text(existing),
                    declared: &type_text(declared),
                    on_method: method.as_deref(),
                });
                self.report.extend(outcomes, span);
            }
            None => self.trigger_payloads.push((trigger, declared.clone())),
        }
    }

    fn declarations(&mut self) {
        let decl = self.decl;
        for attr in &decl.attrs {
            match attr {
                MachineAttr::Transition(transition) => {
                    let args = &transition.args;
                    self.transition(
                        [&args.from, &args.trigger, &args.to],
                        args.guard.as_ref(),
                        args.action.as_ref(),
                        false,
                        transition.span,
                    );
                }
                MachineAttr::InternalTransition(internal) => {
                    let args = &internal.args;
                    self.transition(
                        [&args.state, &args.trigger, &args.state],
                        args.guard.as_ref(),
                        Some(&args.action),
                        true,
                        internal.span,
                    );
                }
                MachineAttr::State(state) => self.state(&state.args, state.span),
                MachineAttr::StateMachine(_) | MachineAttr::PayloadType(_) => {}
            }
        }
    }

    fn transition(
        &mut self,
        [from, trigger, to]: [&EnumRef; 3],
        guard: Option<&MemberName>,
        action: Option<&MemberName>,
        internal: bool,
        span: Span,
    ) {
        let from = self.resolve_state(from);
        let trigger = self.resolve_trigger(trigger);
        let to = self.resolve_state(to);
        let (Some(from), Some(trigger), Some(to)) = (from, trigger, to) else {
            return;
        };

        let key = (from.to_string(), trigger.to_string());
        let outcomes = transitions::duplicate_transition(&transitions::DuplicateTransition {
            from: &key.0,
            trigger: &key.1,
            already_registered: self.registered.contains(&key),
        });
        if !outcomes.is_empty() {
            self.report.extend(outcomes, span);
            return;
        }
        self.registered.insert(key);

        let expected_payload = self
            .trigger_payloads
            .iter()
            .find(|(candidate, _)| candidate == &trigger)
            .map(|(_, ty)| ty.clone())
            .or_else(|| self.default_payload.clone());
        let expected = match (&expected_payload, self.has_payload()) {
            (Some(ty), _) => ExpectedPayload::Type(ty),
            (None, true) => ExpectedPayload::Any,
            (None, false) => ExpectedPayload::None,
        };

        let guard = guard.and_then(|name| self.callback(name, CallbackRole::Guard, expected, span));
        let action = action.and_then(|name| self.callback(name, CallbackRole::Action, expected, span));

        self.transitions.push(TransitionModel {
            from,
            trigger,
            to,
            internal,
            guard,
            action,
            expected_payload,
        });
    }

    fn state(&mut self, args: &StateArgs, span: Span) {
        let Some(ident) = self.resolve_state(&args.state) else {
            return;
        };
        self.state_spans.push((ident.to_string(), span));

        let default = self.default_payload.clone();
        let expected = match (&default, self.has_payload()) {
            (Some(ty), _) => ExpectedPayload::Type(ty),
            (None, true) => ExpectedPayload::Any,
            (None, false) => ExpectedPayload::None,
        };

        if args.on_entry.is_some() || args.on_exit.is_some() {
            self.has_entry_exit = true;
        }
        let on_entry = args
            .on_entry
            .as_ref()
            .and_then(|name| self.callback(name, CallbackRole::OnEntry, expected, span));
        let on_exit = args
            .on_exit
            .as_ref()
            .and_then(|name| self.callback(name, CallbackRole::OnExit, expected, span));

        let parent = match &args.parent {
            Some(parent) => match self.state_enum.resolve(parent) {
                Some(member) => Some(member.ident.clone()),
                None => {
                    self.orphan_parents.push((ident.to_string(), parent.display()));
                    None
                }
            },
            None => None,
        };

        let Some(state) = self.states.iter_mut().find(|state| state.ident == ident) else {
            return;
        };
        if state.on_entry.is_none() {
            state.on_entry = on_entry;
        }
        if state.on_exit.is_none() {
            state.on_exit = on_exit;
        }
        if state.parent.is_none() {
            state.parent = parent;
        }
        state.is_initial |= args.initial;
        if state.history == HistoryMode::None {
            state.history = args.history.into();
        }
    }

    fn callback(
        &mut self,
        name: &MemberName,
        role: CallbackRole,
        expected: ExpectedPayload<'_>,
        span: Span,
    ) -> Option<CallbackModel> {
        let (facts, decl) = (self.facts, self.decl);
        let method_name = name.0.to_string();
        let method = facts
            .methods_of(&decl.ident)
            .find(|method| method.ident == name.0);
        let shape = method.map(|method| analyzer::analyze(method, role));

        let outcomes = signatures::callback_signature(&signatures::CallbackSignature {
            method: &method_name,
            role,
            shape: shape.as_ref(),
            expected,
            variant_forced: self.variant_forced(),
        });
        let failed = outcomes.iter().any(Outcome::is_error);
        self.report.extend(outcomes, span);
        let (method, shape) = (method?, shape?);
        if failed {
            return None;
        }

        let mode = shape.class.mode();
        if let Some(mode) = mode {
            match self.mode.observe(mode) {
                Ok(next) => {
                    if self.mode == AsyncMode::Unset {
                        self.mode_source = Some(method_name.clone());
                    }
                    self.mode = next;
                }
                Err(analyzer::ModeConflict) => {
                    let established_by = self.mode_source.clone().unwrap_or_default();
                    let outcomes = asynchrony::mode_conflict(&asynchrony::ModeConflict {
                        method: &method_name,
                        established_by: &established_by,
                        first_conflict: !self.conflict_reported,
                    });
                    self.conflict_reported = true;
                    self.report.extend(outcomes, span);
                    return None;
                }
            }
        }

        self.tokens.push((method_name, role, shape.token, span));
        Some(CallbackModel {
            ident: method.ident.clone(),
            role,
            is_async: mode == Some(CallbackMode::Async),
            fallible: shape.fallible,
            payload: shape.payload,
            token: shape.token,
            detached: shape.class == ShapeClass::InvalidAsyncVoid,
        })
    }

    /// Token parameters only make sense once the machine turned out async.
    fn check_tokens(&mut self) {
        let machine_is_async = self.mode.is_async();
        for (method, role, token, span) in std::mem::take(&mut self.tokens) {
            let outcomes = signatures::token_parameter(&signatures::TokenParameter {
                method: &method,
                role,
                token,
                machine_is_async,
            });
            self.report.extend(outcomes, span);
        }
    }

    fn hierarchy_enabled(&self) -> bool {
        self.primary.hierarchy
            || !self.orphan_parents.is_empty()
            || self.states.iter().any(|state| state.parent.is_some())
    }

    fn check_hierarchy(&mut self, struct_span: Span) {
        if !self.hierarchy_enabled() {
            return;
        }

        let names: Vec<String> = self.states.iter().map(|state| state.ident.to_string()).collect();
        let parents: Vec<Option<String>> = self
            .states
            .iter()
            .zip(&names)
            .map(|(state, name)| {
                state.parent.as_ref().map(Ident::to_string).or_else(|| {
                    self.orphan_parents
                        .iter()
                        .find(|(orphan, _)| orphan == name)
                        .map(|(_, parent)| parent.clone())
                })
            })
            .collect();
        let hierarchy_states: Vec<HierarchyState<'_>> = self
            .states
            .iter()
            .zip(&names)
            .zip(&parents)
            .map(|((state, name), parent)| HierarchyState {
                name,
                parent: parent.as_deref(),
                initial: state.is_initial,
                history: state.history,
            })
            .collect();
        let facts = HierarchyFacts {
            states: &hierarchy_states,
        };

        let mut outcomes = hsm::circular_hierarchy(&facts);
        outcomes.extend(hsm::orphan_substates(&facts));
        outcomes.extend(hsm::composite_entry(&facts));
        outcomes.extend(hsm::history_on_leaf(&facts));

        let edges: Vec<(String, String)> = self
            .transitions
            .iter()
            .filter(|transition| !transition.internal)
            .map(|transition| (transition.from.to_string(), transition.to.to_string()))
            .collect();
        let edge_refs: Vec<(&str, &str)> = edges
            .iter()
            .map(|(from, to)| (from.as_str(), to.as_str()))
            .collect();
        outcomes.extend(hsm::composite_targets(&hsm::CompositeTargets {
            hierarchy: &facts,
            transitions: &edge_refs,
        }));

        let spans = self.state_spans.clone();
        let state_enum = self.state_enum;
        self.report.extend_located(outcomes, struct_span, |name| {
            locate_state(&spans, state_enum, name)
        });
    }

    fn resolve_state(&mut self, reference: &EnumRef) -> Option<Ident> {
        resolve(self.state_enum, reference, self.report)
    }

    fn resolve_trigger(&mut self, reference: &EnumRef) -> Option<Ident> {
        resolve(self.trigger_enum, reference, self.report)
    }

    fn finish(self) -> StateMachineModel {
        let hierarchy = self.hierarchy_enabled();
        let config = GenerationConfig {
            variant: crate::model::GenerationVariant::Pure,
            forced: self.primary.variant.map(Into::into),
            is_async: self.mode.is_async(),
            has_payload: self.has_payload(),
            has_entry_exit: self.has_entry_exit,
            extensions_requested: self.primary.extensions,
            continue_on_captured_context: self.primary.continue_on_captured_context,
            structural_api: self.primary.structural_api,
            hierarchy,
        };
        let mut model = StateMachineModel {
            ident: self.decl.ident.clone(),
            generics: self.decl.generics.clone(),
            module: self.facts.module.clone(),
            state_type: self.state_enum.ident.clone(),
            trigger_type: self.trigger_enum.ident.clone(),
            states: self.states,
            triggers: self
                .trigger_enum
                .members
                .iter()
                .map(|member| member.ident.clone())
                .collect(),
            transitions: self.transitions,
            default_payload: self.default_payload,
            trigger_payloads: self.trigger_payloads,
            fields: self.decl.user_fields().to_vec(),
            config,
        };
        model.config.variant = variant::auto_select(&model.features());
        model
    }
}

fn resolve(facts: &EnumFacts, reference: &EnumRef, report: &mut Report) -> Option<Ident> {
    let resolved = facts.resolve(reference).map(|member| member.ident.clone());
    let outcomes = transitions::enum_value(&transitions::EnumValue {
        value: &reference.display(),
        enum_name: &facts.ident.to_string(),
        resolved: resolved.is_some(),
    });
    report.extend(outcomes, reference.span());
    resolved
}

/// Declaring `#[state]` attribute, else the enum variant.
pub fn locate_state(spans: &[(String, Span)], state_enum: &EnumFacts, name: &str) -> Option<Span> {
    spans
        .iter()
        .find(|(state, _)| state == name)
        .map(|(_, span)| *span)
        .or_else(|| {
            state_enum
                .members
                .iter()
                .find(|member| member.ident == name)
                .map(|member| member.ident.span())
        })
}
