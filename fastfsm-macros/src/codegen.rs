//! Code generation for a validated state machine model.
//!
//! Each [`Feature`] contributes to one shared [`EmissionContext`]: first every
//! feature registers its fields, constructor parts and hooks, then every
//! feature emits its items and methods. The feature list is fixed per variant
//! so the output is identical on every run.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Ident, Type};

mod callbacks;
mod context;
mod dispatch;
mod extensions;
mod hierarchy;
mod payload;
mod queries;
mod structural;

use crate::model::{GenerationVariant, PayloadKind, StateMachineModel};
use context::EmissionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Core,
    SinglePayload,
    MultiPayload,
    Queries,
    Structural,
    Hierarchy,
    Extensions,
}

/// Features emitted for a machine, in emission order.
pub fn features(model: &StateMachineModel, variant: GenerationVariant, payload: PayloadKind) -> Vec<Feature> {
    let mut features = vec![Feature::Core];
    match payload {
        PayloadKind::Single => features.push(Feature::SinglePayload),
        PayloadKind::Multi => features.push(Feature::MultiPayload),
        PayloadKind::None => {}
    }
    features.push(Feature::Queries);
    if model.config.structural_api {
        features.push(Feature::Structural);
    }
    if model.config.hierarchy {
        features.push(Feature::Hierarchy);
    }
    if variant.has_extensions() {
        features.push(Feature::Extensions);
    }
    features
}

/// Output for one machine.
pub struct Generated {
    /// Private fields to add to the user's struct.
    pub fields: Vec<(Ident, Type)>,
    /// Items placed in the user's module.
    pub tokens: TokenStream,
}

pub fn generate(model: &StateMachineModel, variant: GenerationVariant, payload: PayloadKind) -> Generated {
    let features = features(model, variant, payload);
    let mut cx = EmissionContext::new(model, variant, payload);

    for feature in &features {
        match feature {
            Feature::Core => dispatch::prepare(&mut cx),
            Feature::MultiPayload => payload::prepare_multi(&mut cx),
            Feature::Hierarchy => hierarchy::prepare(&mut cx),
            Feature::Extensions => extensions::prepare(&mut cx),
            Feature::SinglePayload | Feature::Queries | Feature::Structural => {}
        }
    }
    for feature in &features {
        match feature {
            Feature::Core => dispatch::emit(&mut cx),
            Feature::SinglePayload => payload::emit_single(&mut cx),
            Feature::MultiPayload => payload::emit_multi(&mut cx),
            Feature::Queries => queries::emit(&mut cx),
            Feature::Structural => structural::emit(&mut cx),
            Feature::Hierarchy => hierarchy::emit(&mut cx),
            Feature::Extensions => extensions::emit(&mut cx),
        }
    }

    let tokens = assemble(&cx);
    Generated {
        fields: cx.fields,
        tokens,
    }
}

fn assemble(cx: &EmissionContext<'_>) -> TokenStream {
    let model = cx.model;
    let ident = &model.ident;
    let (impl_generics, ty_generics, where_clause) = model.generics.split_for_impl();
    let items = &cx.items;
    let methods = &cx.methods;
    let trait_items = &cx.trait_items;
    let machine_trait = if cx.is_async() {
        quote!(::fastfsm::AsyncStateMachine)
    } else {
        quote!(::fastfsm::StateMachine)
    };

    quote! {
        const _: () = {
            #(#items)*

            impl #impl_generics #ident #ty_generics #where_clause {
                #(#methods)*
            }

            impl #impl_generics #machine_trait for #ident #ty_generics #where_clause {
                #(#trait_items)*
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder;
    use crate::diagnostics::Report;
    use crate::reader::ModuleFacts;
    use crate::variant;
    use syn::parse_quote;

    fn render(module: syn::ItemMod) -> (Generated, Vec<Feature>) {
        let facts = ModuleFacts::read(&module);
        let mut report = Report::default();
        let model = builder::build(&facts.machines[0], &facts, &mut report).expect("model");
        let chosen = variant::select(&model).expect("variant");
        let payload = variant::emitted_payload(chosen, &model);
        let features = features(&model, chosen, payload);
        (generate(&model, chosen, payload), features)
    }

    fn pretty(tokens: &TokenStream) -> String {
        let file: syn::File = syn::parse2(tokens.clone()).expect("generated code parses");
        prettyplease::unparse(&file)
    }

    /// Token-level containment, independent of how the output is laid out.
    fn contains_tokens(haystack: &TokenStream, needle: TokenStream) -> bool {
        haystack.to_string().contains(&needle.to_string())
    }

    #[test]
    fn pure_machine_emits_dispatch_and_queries() {
        let (generated, features) = render(parse_quote! {
            mod m {
                enum State { Idle, Working }
                enum Trigger { Start }

                #[state_machine(state = State, trigger = Trigger)]
                #[transition(from = Idle, trigger = Start, to = Working)]
                struct Job;
            }
        });
        assert_eq!(features, vec![Feature::Core, Feature::Queries]);
        assert_eq!(generated.fields.len(), 1);
        assert_eq!(generated.fields[0].0, "__fsm_state");

        let text = pretty(&generated.tokens);
        assert!(text.contains("pub fn new(initial_state: State) -> Self"));
        assert!(text.contains("::fastfsm::GenerationVariant::Pure"));
        assert!(text.contains("State::Idle => {"));
        assert!(text.contains("self.__fsm_state = State::Working;"));
        assert!(text.contains("impl ::fastfsm::StateMachine for Job"));
        assert!(text.contains("const __PERMITTED_Idle: &[Trigger] = &[Trigger::Start];"));
        assert!(!text.contains("async fn"));
    }

    #[test]
    fn callbacks_run_in_exit_action_entry_order() {
        let (generated, _) = render(parse_quote! {
            mod m {
                enum State { Idle, Working }
                enum Trigger { Start }

                #[state_machine(state = State, trigger = Trigger)]
                #[state(state = Idle, on_exit = "leave_idle")]
                #[state(state = Working, on_entry = "enter_working")]
                #[transition(from = Idle, trigger = Start, to = Working, guard = "ready", action = "start")]
                struct Job { ready: bool }

                impl Job {
                    fn ready(&self) -> bool { self.ready }
                    fn start(&mut self) {}
                    fn leave_idle(&mut self) {}
                    fn enter_working(&mut self) {}
                }
            }
        });
        let text = pretty(&generated.tokens);
        assert!(text.contains("pub fn new(initial_state: State, ready: bool) -> Self"));

        let guard = text.find("self.ready()").unwrap();
        let exit = text.find("self.leave_idle();").unwrap();
        let action = text.find("self.start();").unwrap();
        let entry = text.find("self.enter_working();").unwrap();
        let commit = text.find("self.__fsm_state = State::Working;").unwrap();
        assert!(guard < exit && exit < action && action < entry && entry < commit);
        assert!(text.contains("::fastfsm::GenerationVariant::Basic"));
    }

    #[test]
    fn internal_transitions_skip_entry_exit_and_commit() {
        let (generated, _) = render(parse_quote! {
            mod m {
                enum State { Running }
                enum Trigger { Tick }

                #[state_machine(state = State, trigger = Trigger)]
                #[state(state = Running, on_entry = "enter", on_exit = "leave")]
                #[internal_transition(state = Running, trigger = Tick, action = "count")]
                struct Clock { ticks: u32 }

                impl Clock {
                    fn count(&mut self) { self.ticks += 1; }
                    fn enter(&mut self) {}
                    fn leave(&mut self) {}
                }
            }
        });
        let text = pretty(&generated.tokens);
        assert!(text.contains("self.count();"));
        assert!(!text.contains("self.enter();"));
        assert!(!text.contains("self.leave();"));
        assert!(!text.contains("self.__fsm_state = State::Running;"));
    }

    #[test]
    fn multi_payload_filters_before_guards() {
        let (generated, features) = render(parse_quote! {
            mod m {
                enum State { Open, Paid }
                enum Trigger { Pay }
                struct Payment { amount: u32 }

                #[state_machine(state = State, trigger = Trigger)]
                #[payload_type(ty = Payment, trigger = Pay)]
                #[transition(from = Open, trigger = Pay, to = Paid, guard = "enough")]
                struct Till;

                impl Till {
                    fn enough(&self, payment: &Payment) -> bool { payment.amount > 0 }
                }
            }
        });
        assert_eq!(
            features,
            vec![Feature::Core, Feature::MultiPayload, Feature::Queries]
        );
        let text = pretty(&generated.tokens);
        assert!(text.contains("Trigger::Pay => payload.is::<Payment>()"));
        assert!(text.contains("pub fn try_fire_with<"));
        assert!(text.contains("downcast_ref::<Payment>()"));
        let filter = text.find("payload.is::<Payment>()").unwrap();
        let guard = text.find("self.enough(__payload)").unwrap();
        assert!(filter < guard);
    }

    #[test]
    fn single_payload_api_is_concrete() {
        let (generated, features) = render(parse_quote! {
            mod m {
                enum State { Idle, Busy }
                enum Trigger { Assign }
                struct Task;

                #[state_machine(state = State, trigger = Trigger, payload = Task)]
                #[transition(from = Idle, trigger = Assign, to = Busy, action = "assign")]
                struct Worker;

                impl Worker {
                    fn assign(&mut self, task: Option<&Task>) {}
                }
            }
        });
        assert_eq!(
            features,
            vec![Feature::Core, Feature::SinglePayload, Feature::Queries]
        );
        let text = pretty(&generated.tokens);
        assert!(text.contains("pub fn try_fire_with(&mut self, trigger: Trigger, payload: &Task) -> bool"));
        assert!(text.contains("must be `Send + Sync + 'static`"));
        assert!(text.contains("self.assign("));
        assert!(text.contains("payload.downcast_ref::<Task>()"));
        assert!(text.contains("::fastfsm::InvalidTransition::with_payload::<Task>"));
    }

    #[test]
    fn async_machine_awaits_and_forwards_token() {
        let (generated, _) = render(parse_quote! {
            mod m {
                enum State { Idle, Loaded }
                enum Trigger { Load }

                #[state_machine(state = State, trigger = Trigger)]
                #[transition(from = Idle, trigger = Load, to = Loaded, action = "load")]
                struct Loader;

                impl Loader {
                    async fn load(&mut self, cancel: CancellationToken) -> Result<(), String> { Ok(()) }
                }
            }
        });
        let text = pretty(&generated.tokens);
        assert!(text.contains("pub async fn try_fire("));
        assert!(text.contains("cancel: &::fastfsm::CancellationToken"));
        assert!(text.contains("::core::clone::Clone::clone(cancel)"));
        assert!(text.contains(".await"));
        assert!(text.contains("impl ::fastfsm::AsyncStateMachine for Loader"));
        assert!(text.contains("tracing::warn!"));
    }

    #[test]
    fn extensions_wrap_guard_and_transition() {
        let (generated, features) = render(parse_quote! {
            mod m {
                enum State { A, B }
                enum Trigger { Go }

                #[state_machine(state = State, trigger = Trigger, extensions)]
                #[transition(from = A, trigger = Go, to = B, guard = "allowed")]
                struct M;

                impl M {
                    fn allowed(&self) -> bool { true }
                }
            }
        });
        assert!(features.contains(&Feature::Extensions));
        assert_eq!(generated.fields.len(), 2);
        let text = pretty(&generated.tokens);
        let before = text.find("before_transition(&__context)").unwrap();
        let evaluation = text.find("guard_evaluation(&__context, \"allowed\")").unwrap();
        let evaluated = text.find("guard_evaluated(&__context, \"allowed\", __allowed)").unwrap();
        let after = text.find("after_transition(&__context, true)").unwrap();
        assert!(before < evaluation && evaluation < evaluated && evaluated < after);
        assert!(text.contains("after_transition(&__context, false)"));
        assert!(text.contains("pub fn add_extension("));
    }

    #[test]
    fn structural_api_is_opt_in() {
        let (generated, features) = render(parse_quote! {
            mod m {
                enum State { A, B }
                enum Trigger { Go, Back }

                #[state_machine(state = State, trigger = Trigger, structural_api)]
                #[transition(from = A, trigger = Go, to = B)]
                #[transition(from = B, trigger = Back, to = A)]
                struct M;
            }
        });
        assert!(features.contains(&Feature::Structural));
        let text = pretty(&generated.tokens);
        assert!(text.contains("pub fn has_transition(&self, trigger: Trigger) -> bool"));
        assert!(contains_tokens(
            &generated.tokens,
            quote!(matches!((self.__fsm_state, trigger), (State::A, Trigger::Go) | (State::B, Trigger::Back)))
        ));
        assert!(text.contains("pub fn defined_triggers(&self)"));
    }

    #[test]
    fn hierarchy_emits_tables_and_walks() {
        let (generated, features) = render(parse_quote! {
            mod m {
                enum State { Off, On, Low, High }
                enum Trigger { Power, Boost }

                #[state_machine(state = State, trigger = Trigger, hierarchy)]
                #[state(state = On, history = "Shallow", on_entry = "lamp_on")]
                #[state(state = Low, parent = On, initial)]
                #[state(state = High, parent = On)]
                #[transition(from = Off, trigger = Power, to = On)]
                #[transition(from = On, trigger = Power, to = Off)]
                #[transition(from = Low, trigger = Boost, to = High)]
                struct Lamp;

                impl Lamp {
                    fn lamp_on(&mut self) {}
                }
            }
        });
        assert!(features.contains(&Feature::Hierarchy));
        assert!(generated.fields.iter().any(|(field, _)| field == "__fsm_history"));
        let text = pretty(&generated.tokens);
        assert!(text.contains("static __FSM_HIERARCHY: ::fastfsm::Hierarchy"));
        assert!(text.contains("const __FSM_STATES: [State; 4usize]"));
        assert!(text.contains("pub fn is_in(&self, state: State) -> bool"));
        assert!(text.contains("fn __fsm_enter(&mut self, state: usize) -> bool"));
        assert!(text.contains("1 => {"));
        assert!(text.contains("exit_path("));
        assert!(text.contains("resolve_entry(0, &self.__fsm_history)"));
        // Low and High inherit Power from On.
        let inherited = text.matches("Trigger::Power => {").count();
        assert_eq!(inherited, 4);
    }

    #[test]
    fn inherited_candidates_follow_a_failed_guard() {
        let (generated, _) = render(parse_quote! {
            mod m {
                enum State { Off, On, Low }
                enum Trigger { Power }

                #[state_machine(state = State, trigger = Trigger, hierarchy)]
                #[state(state = Low, parent = On, initial)]
                #[transition(from = Off, trigger = Power, to = On)]
                #[transition(from = On, trigger = Power, to = Off)]
                #[transition(from = Low, trigger = Power, to = Off, guard = "armed")]
                struct Lamp;

                impl Lamp {
                    fn armed(&self) -> bool { false }
                }
            }
        });
        let tokens = &generated.tokens;
        assert!(contains_tokens(tokens, quote!(if !__allowed { break '__candidate; })));
        assert!(contains_tokens(tokens, quote!(Trigger::Power => self.armed() || true,)));
        assert!(contains_tokens(
            tokens,
            quote!(const __PERMITTED_Low: &[Trigger] = &[Trigger::Power];)
        ));
    }
}
