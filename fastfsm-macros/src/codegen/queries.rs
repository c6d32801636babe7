//! Guard-aware queries: `can_fire` and `permitted_triggers`.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use super::callbacks;
use super::context::{EmissionContext, dyn_payload};
use crate::helpers;
use crate::model::TransitionModel;

pub fn emit(cx: &mut EmissionContext<'_>) {
    let query = render_query(cx);
    let can_fire = render_can_fire(cx);
    let permitted = render_permitted_triggers(cx);
    cx.methods.extend([query, can_fire, permitted]);

    let trait_items = render_trait_items(cx);
    cx.trait_items.push(trait_items);
}

/// Whether `trigger` would be taken from the current state, guards included.
fn render_query(cx: &EmissionContext<'_>) -> TokenStream {
    let trigger_type = cx.trigger_type();
    let state_field = helpers::state_field();
    let query = helpers::query_fn();
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
            let allowed = any_allowed(cx, candidates);
            quote!(#trigger => #allowed,)
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
        #asyncness fn #query(&self, trigger: #trigger_type #payload_param #cancel_param) -> bool {
            #payload_binding
            #filter
            match self.#state_field {
                #(#arms)*
                _ => false,
            }
        }
    }
}

/// `true` when any candidate's guard passes, tried innermost first.
fn any_allowed(cx: &EmissionContext<'_>, candidates: &[&TransitionModel]) -> TokenStream {
    let mut allowed: Option<TokenStream> = None;
    for transition in candidates {
        let next = match &transition.guard {
            Some(guard) => callbacks::guard(cx, guard),
            None => quote!(true),
        };
        allowed = Some(match allowed {
            Some(previous) => quote!(#previous || #next),
            None => next,
        });
        if transition.guard.is_none() {
            break;
        }
    }
    allowed.unwrap_or_else(|| quote!(false))
}

fn render_can_fire(cx: &EmissionContext<'_>) -> TokenStream {
    let trigger_type = cx.trigger_type();
    let query = helpers::query_fn();
    let asyncness = cx.asyncness();
    let awaited = cx.awaited();
    let cancel_param = cx.cancel_param();
    let forward = cx.forward(quote!(::core::option::Option::None));

    quote! {
        /// Whether `trigger` would currently be taken. Guards are evaluated
        /// without a payload; no callback other than guards runs.
        pub #asyncness fn can_fire(&self, trigger: #trigger_type #cancel_param) -> bool {
            self.#query(trigger #forward)#awaited
        }
    }
}

/// Triggers in declaration order. States without guards answer from a
/// constant table.
fn render_permitted_triggers(cx: &EmissionContext<'_>) -> TokenStream {
    let trigger_type = cx.trigger_type();
    let state_field = helpers::state_field();
    let asyncness = cx.asyncness();
    let cancel_param = cx.cancel_param();
    let payload_binding = if cx.payload_in_scope() {
        let ty = dyn_payload();
        quote!(let payload: ::core::option::Option<&#ty> = ::core::option::Option::None;)
    } else {
        TokenStream::new()
    };

    let arms = cx.model.states.iter().filter_map(|state| {
        let mut groups = cx.model.candidates(&state.ident);
        if groups.is_empty() {
            return None;
        }
        groups.sort_by_key(|(trigger, _)| trigger_order(cx, trigger));
        let state_path = cx.state_path(&state.ident);

        if groups.iter().all(|(_, candidates)| unguarded(candidates)) {
            let table = format_ident!("__PERMITTED_{}", state.ident);
            let triggers = groups.iter().map(|(trigger, _)| cx.trigger_path(trigger));
            return Some(quote! {
                #state_path => {
                    const #table: &[#trigger_type] = &[#(#triggers),*];
                    #table.to_vec()
                }
            });
        }

        let capacity = groups.len();
        let pushes = groups.iter().map(|(trigger, candidates)| {
            let trigger = cx.trigger_path(trigger);
            if unguarded(candidates) {
                return quote!(permitted.push(#trigger););
            }
            let allowed = any_allowed(cx, candidates);
            quote! {
                if #allowed {
                    permitted.push(#trigger);
                }
            }
        });
        Some(quote! {
            #state_path => {
                let mut permitted = ::std::vec::Vec::with_capacity(#capacity);
                #(#pushes)*
                permitted
            }
        })
    });

    quote! {
        /// Triggers that would currently be taken, in declaration order.
        #[allow(unused_variables, unreachable_patterns, non_upper_case_globals)]
        pub #asyncness fn permitted_triggers(&self #cancel_param) -> ::std::vec::Vec<#trigger_type> {
            #payload_binding
            match self.#state_field {
                #(#arms)*
                _ => ::std::vec::Vec::new(),
            }
        }
    }
}

fn unguarded(candidates: &[&TransitionModel]) -> bool {
    candidates.iter().any(|transition| transition.guard.is_none())
}

fn trigger_order(cx: &EmissionContext<'_>, trigger: &syn::Ident) -> usize {
    cx.model
        .triggers
        .iter()
        .position(|candidate| candidate == trigger)
        .unwrap_or(usize::MAX)
}

fn render_trait_items(cx: &EmissionContext<'_>) -> TokenStream {
    let trigger_type = cx.trigger_type();
    if cx.is_async() {
        quote! {
            async fn can_fire(&self, trigger: #trigger_type, cancel: &::fastfsm::CancellationToken) -> bool {
                Self::can_fire(self, trigger, cancel).await
            }

            async fn permitted_triggers(
                &self,
                cancel: &::fastfsm::CancellationToken,
            ) -> ::std::vec::Vec<#trigger_type> {
                Self::permitted_triggers(self, cancel).await
            }
        }
    } else {
        quote! {
            fn can_fire(&self, trigger: #trigger_type) -> bool {
                Self::can_fire(self, trigger)
            }

            fn permitted_triggers(&self) -> ::std::vec::Vec<#trigger_type> {
                Self::permitted_triggers(self)
            }
        }
    }
}
