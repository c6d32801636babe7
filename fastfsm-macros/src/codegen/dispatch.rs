use proc_macro2::TokenStream;
use quote::quote;

use super::callbacks;
use super::context::{EmissionContext, HookSite};
use super::hierarchy;
use crate::helpers;
use crate::model::{StateModel, TransitionModel};

pub fn prepare(cx: &mut EmissionContext<'_>) {
    let state_type = cx.state_type().clone();
    cx.fields
        .push((helpers::state_field(), syn::parse_quote!(#state_type)));
}

pub fn emit(cx: &mut EmissionContext<'_>) {
    let constructor = render_constructor(cx);
    let accessors = render_accessors(cx);
    let fire = render_fire(cx);
    let dispatch = render_dispatch(cx);
    cx.methods.extend([constructor, accessors, fire, dispatch]);

    let trait_items = render_trait_items(cx);
    cx.trait_items.extend(trait_items);
}

fn render_constructor(cx: &EmissionContext<'_>) -> TokenStream {
    let state_type = cx.state_type();
    let state_field = helpers::state_field();
    let initial = helpers::initial_state_param(&cx.model.fields);
    let params = cx.model.fields.iter().map(|(ident, ty)| quote!(#ident: #ty));
    let user_fields = cx.model.fields.iter().map(|(ident, _)| ident);
    let injected = &cx.constructor;

    let body = if cx.constructor_stmts.is_empty() {
        quote! {
            Self {
                #(#user_fields,)*
                #state_field: #initial,
                #(#injected,)*
            }
        }
    } else {
        let stmts = &cx.constructor_stmts;
        quote! {
            let mut machine = Self {
                #(#user_fields,)*
                #state_field: #initial,
                #(#injected,)*
            };
            #(#stmts)*
            machine
        }
    };

    quote! {
        /// Creates the machine in `initial_state` without running any entry callback.
        pub fn new(#initial: #state_type #(, #params)*) -> Self {
            #body
        }
    }
}

fn render_accessors(cx: &EmissionContext<'_>) -> TokenStream {
    let state_type = cx.state_type();
    let state_field = helpers::state_field();
    let variant = syn::Ident::new(cx.variant.name(), proc_macro2::Span::call_site());

    quote! {
        /// The generation variant this machine was built with.
        pub const VARIANT: ::fastfsm::GenerationVariant = ::fastfsm::GenerationVariant::#variant;

        pub fn current_state(&self) -> #state_type {
            self.#state_field
        }
    }
}

fn render_fire(cx: &EmissionContext<'_>) -> TokenStream {
    let state_type = cx.state_type();
    let trigger_type = cx.trigger_type();
    let state_field = helpers::state_field();
    let dispatch = helpers::dispatch_fn();
    let asyncness = cx.asyncness();
    let awaited = cx.awaited();
    let cancel_param = cx.cancel_param();
    let cancel_arg = cx.forward_cancel();
    let forward = cx.forward(quote!(::core::option::Option::None));

    quote! {
        /// Fires `trigger` and reports whether a transition was taken.
        ///
        /// A rejected trigger leaves the state unchanged.
        pub #asyncness fn try_fire(&mut self, trigger: #trigger_type #cancel_param) -> bool {
            self.#dispatch(trigger #forward)#awaited
        }

        /// Like [`Self::try_fire`], but a rejected trigger is an error.
        pub #asyncness fn fire(
            &mut self,
            trigger: #trigger_type
            #cancel_param
        ) -> ::core::result::Result<(), ::fastfsm::InvalidTransition<#state_type, #trigger_type>> {
            let state = self.#state_field;
            if self.try_fire(trigger #cancel_arg)#awaited {
                ::core::result::Result::Ok(())
            } else {
                ::core::result::Result::Err(::fastfsm::InvalidTransition::new(state, trigger))
            }
        }
    }
}

fn render_dispatch(cx: &EmissionContext<'_>) -> TokenStream {
    let trigger_type = cx.trigger_type();
    let state_field = helpers::state_field();
    let dispatch = helpers::dispatch_fn();
    let asyncness = cx.asyncness();
    let payload_param = cx.payload_param();
    let cancel_param = cx.cancel_param();
    let payload_binding = cx.payload_binding();
    let filter = cx.hooks.payload_filter();

    let arms = cx.model.states.iter().filter_map(|state| {
        let groups = cx.model.candidates(&state.ident);
        if groups.is_empty() {
            return None;
        }
        let state_path = cx.state_path(&state.ident);
        let trigger_arms = groups.iter().map(|(trigger, candidates)| {
            let trigger = cx.trigger_path(trigger);
            let body = render_candidates(cx, state, candidates);
            quote!(#trigger => { #body })
        });
        Some(quote! {
            #state_path => match trigger {
                #(#trigger_arms)*
                _ => false,
            },
        })
    });

    quote! {
        #[allow(unused_variables, unreachable_patterns)]
        #asyncness fn #dispatch(&mut self, trigger: #trigger_type #payload_param #cancel_param) -> bool {
            #payload_binding
            #filter
            match self.#state_field {
                #(#arms)*
                _ => false,
            }
        }
    }
}

/// Candidates for one `(state, trigger)` pair, innermost first. A failed
/// guard falls through to the next candidate; the last one rejects.
fn render_candidates(cx: &EmissionContext<'_>, current: &StateModel, candidates: &[&TransitionModel]) -> TokenStream {
    let reachable = candidates
        .iter()
        .position(|transition| transition.guard.is_none())
        .map_or(candidates.len(), |unguarded| unguarded + 1);
    let Some((last, fallible)) = candidates[..reachable].split_last() else {
        return quote!(false);
    };

    let label = syn::Lifetime::new("'__candidate", proc_macro2::Span::call_site());
    let next = cx.hooks.pass(&label);
    let attempts = fallible.iter().map(|transition| {
        let body = render_attempt(cx, current, transition, &next);
        quote! {
            #label: {
                #body
                return true;
            }
        }
    });
    let last = render_attempt(cx, current, last, &cx.hooks.reject());

    quote! {
        #(#attempts)*
        #last
        true
    }
}

/// One candidate: hooks, guard, then the transfer. `denied` runs when the
/// guard fails.
fn render_attempt(
    cx: &EmissionContext<'_>,
    current: &StateModel,
    transition: &TransitionModel,
    denied: &TokenStream,
) -> TokenStream {
    let payload = cx.payload_expr();
    let before = cx.hooks.before(&HookSite {
        from: cx.state_path(&current.ident),
        trigger: cx.trigger_path(&transition.trigger),
        to: cx.state_path(&transition.to),
        payload: &payload,
    });
    let reject = cx.hooks.reject();

    let guard = match &transition.guard {
        Some(guard) => {
            let allowed = syn::Ident::new("__allowed", proc_macro2::Span::call_site());
            let evaluation = cx.hooks.guard_evaluation(&guard.ident);
            let expr = callbacks::guard(cx, guard);
            let evaluated = cx.hooks.guard_evaluated(&guard.ident, &allowed);
            quote! {
                #evaluation
                let #allowed: bool = #expr;
                #evaluated
                if !#allowed #denied
            }
        }
        None => TokenStream::new(),
    };

    let transfer = if transition.internal {
        action(cx, transition, &reject)
    } else if cx.hierarchy() {
        hierarchy::render_transfer(cx, transition, &reject)
    } else {
        flat_transfer(cx, transition, &reject)
    };
    let after = cx.hooks.after(true);

    quote! {
        #before
        #guard
        #transfer
        #after
    }
}

fn action(cx: &EmissionContext<'_>, transition: &TransitionModel, reject: &TokenStream) -> TokenStream {
    match &transition.action {
        Some(action) => callbacks::effect(cx, action, reject),
        None => TokenStream::new(),
    }
}

/// Exit, action, entry, commit.
fn flat_transfer(cx: &EmissionContext<'_>, transition: &TransitionModel, reject: &TokenStream) -> TokenStream {
    let exit = cx
        .model
        .state(&transition.from)
        .and_then(|state| state.on_exit.as_ref())
        .map(|callback| callbacks::effect(cx, callback, reject));
    let action = action(cx, transition, reject);
    let entry = cx
        .model
        .state(&transition.to)
        .and_then(|state| state.on_entry.as_ref())
        .map(|callback| callbacks::effect(cx, callback, reject));
    let state_field = helpers::state_field();
    let to = cx.state_path(&transition.to);

    quote! {
        #exit
        #action
        #entry
        self.#state_field = #to;
    }
}

fn render_trait_items(cx: &EmissionContext<'_>) -> Vec<TokenStream> {
    let state_type = cx.state_type();
    let trigger_type = cx.trigger_type();
    let error = quote!(::fastfsm::InvalidTransition<#state_type, #trigger_type>);

    let current_state = quote! {
        fn current_state(&self) -> #state_type {
            Self::current_state(self)
        }
    };

    let fire = if cx.is_async() {
        quote! {
            async fn try_fire(&mut self, trigger: #trigger_type, cancel: &::fastfsm::CancellationToken) -> bool {
                Self::try_fire(self, trigger, cancel).await
            }

            async fn fire(
                &mut self,
                trigger: #trigger_type,
                cancel: &::fastfsm::CancellationToken,
            ) -> ::core::result::Result<(), #error> {
                Self::fire(self, trigger, cancel).await
            }
        }
    } else {
        quote! {
            fn try_fire(&mut self, trigger: #trigger_type) -> bool {
                Self::try_fire(self, trigger)
            }

            fn fire(&mut self, trigger: #trigger_type) -> ::core::result::Result<(), #error> {
                Self::fire(self, trigger)
            }
        }
    };

    vec![
        quote! {
            type State = #state_type;
            type Trigger = #trigger_type;
        },
        current_state,
        fire,
    ]
}
