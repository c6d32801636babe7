use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use super::context::EmissionContext;
use crate::helpers;

pub fn emit(cx: &mut EmissionContext<'_>) {
    let methods = render_structural(cx);
    cx.methods.push(methods);
}

/// `has_transition` and `defined_triggers` ignore guards and payloads.
fn render_structural(cx: &EmissionContext<'_>) -> TokenStream {
    let trigger_type = cx.trigger_type();
    let state_field = helpers::state_field();

    let mut pairs = Vec::new();
    let mut tables = Vec::new();
    for state in &cx.model.states {
        let mut triggers: Vec<_> = cx
            .model
            .candidates(&state.ident)
            .into_iter()
            .map(|(trigger, _)| trigger)
            .collect();
        if triggers.is_empty() {
            continue;
        }
        triggers.sort_by_key(|trigger| cx.model.triggers.iter().position(|t| t == *trigger));

        let state_path = cx.state_path(&state.ident);
        let paths: Vec<_> = triggers.iter().map(|trigger| cx.trigger_path(trigger)).collect();
        pairs.push(quote!((#state_path, #(#paths)|*)));

        let table = format_ident!("__DEFINED_{}", state.ident);
        tables.push(quote! {
            #state_path => {
                const #table: &[#trigger_type] = &[#(#paths),*];
                #table.to_vec()
            }
        });
    }

    let has_transition = if pairs.is_empty() {
        quote!(false)
    } else {
        quote!(matches!((self.#state_field, trigger), #(#pairs)|*))
    };

    quote! {
        /// Whether a transition is declared for `trigger` in the current
        /// state, whatever its guard would say.
        #[allow(unused_variables)]
        pub fn has_transition(&self, trigger: #trigger_type) -> bool {
            #has_transition
        }

        /// Every trigger declared for the current state, in declaration order.
        #[allow(unreachable_patterns, non_upper_case_globals)]
        pub fn defined_triggers(&self) -> ::std::vec::Vec<#trigger_type> {
            match self.#state_field {
                #(#tables)*
                _ => ::std::vec::Vec::new(),
            }
        }
    }
}
