//! Hierarchical machines: static tables, history, and the exit/entry walk.
//!
//! States are addressed by declaration index at runtime. The tables live in
//! a `static` next to the impl blocks and are interpreted by
//! `fastfsm::Hierarchy`; the per-state entry and exit callbacks are reached
//! through two generated `match` functions.

use proc_macro2::TokenStream;
use quote::quote;

use super::callbacks;
use super::context::EmissionContext;
use crate::helpers;
use crate::model::{HistoryMode, TransitionModel};

pub fn prepare(cx: &mut EmissionContext<'_>) {
    let history = helpers::history_field();
    let count = cx.model.states.len();
    cx.fields
        .push((history.clone(), syn::parse_quote!(::fastfsm::HistoryTracker)));
    cx.constructor
        .push(quote!(#history: ::fastfsm::HistoryTracker::new(#count)));

    let state_field = helpers::state_field();
    let table = helpers::hierarchy_static();
    let states = helpers::states_const();
    let index = helpers::index_fn();
    cx.constructor_stmts.push(quote! {
        machine.#state_field =
            #states[#table.resolve_entry(#index(machine.#state_field), &machine.#history)];
    });
}

pub fn emit(cx: &mut EmissionContext<'_>) {
    let tables = render_tables(cx);
    cx.items.push(tables);

    let introspection = render_introspection(cx);
    cx.methods.push(introspection);

    if cx.model.config.has_entry_exit {
        let enter = render_state_callbacks(cx, Walk::Enter);
        let exit = render_state_callbacks(cx, Walk::Exit);
        cx.methods.extend([enter, exit]);
    }
}

fn render_tables(cx: &EmissionContext<'_>) -> TokenStream {
    let state_type = cx.state_type();
    let table = helpers::hierarchy_static();
    let states_const = helpers::states_const();
    let index = helpers::index_fn();
    let model = cx.model;
    let count = model.states.len();

    let parents = model.states.iter().map(|state| {
        match state.parent.as_ref().and_then(|parent| model.state_index(parent)) {
            Some(parent) => {
                let parent = helpers::index_literal(parent);
                quote!(::core::option::Option::Some(#parent))
            }
            None => quote!(::core::option::Option::None),
        }
    });
    let entry_children = model.states.iter().map(|state| {
        match model
            .entry_child(&state.ident)
            .and_then(|child| model.state_index(&child.ident))
        {
            Some(child) => {
                let child = helpers::index_literal(child);
                quote!(::core::option::Option::Some(#child))
            }
            None => quote!(::core::option::Option::None),
        }
    });
    let history = model.states.iter().map(|state| match state.history {
        HistoryMode::None => quote!(::fastfsm::HistoryMode::None),
        HistoryMode::Shallow => quote!(::fastfsm::HistoryMode::Shallow),
        HistoryMode::Deep => quote!(::fastfsm::HistoryMode::Deep),
    });
    let all_states: Vec<_> = model.states.iter().map(|state| cx.state_path(&state.ident)).collect();
    let indices = (0..count).map(helpers::index_literal);

    quote! {
        static #table: ::fastfsm::Hierarchy = ::fastfsm::Hierarchy::new(
            &[#(#parents),*],
            &[#(#entry_children),*],
            &[#(#history),*],
        );

        const #states_const: [#state_type; #count] = [#(#all_states),*];

        fn #index(state: #state_type) -> usize {
            match state {
                #(#all_states => #indices,)*
            }
        }
    }
}

fn render_introspection(cx: &EmissionContext<'_>) -> TokenStream {
    let state_type = cx.state_type();
    let state_field = helpers::state_field();
    let table = helpers::hierarchy_static();
    let states = helpers::states_const();
    let index = helpers::index_fn();

    quote! {
        /// Whether `state` is the current state or one of its ancestors.
        pub fn is_in(&self, state: #state_type) -> bool {
            #table.is_in(#index(self.#state_field), #index(state))
        }

        /// Active states from the outermost composite down to the current leaf.
        pub fn active_path(&self) -> ::std::vec::Vec<#state_type> {
            #table
                .active_path(#index(self.#state_field))
                .into_iter()
                .map(|state| #states[state])
                .collect()
        }
    }
}

#[derive(Clone, Copy)]
enum Walk {
    Enter,
    Exit,
}

/// `__fsm_enter` / `__fsm_exit`: run one state's callback by index.
/// Returns `false` when a fallible callback failed.
fn render_state_callbacks(cx: &EmissionContext<'_>, walk: Walk) -> TokenStream {
    let name = match walk {
        Walk::Enter => helpers::enter_fn(),
        Walk::Exit => helpers::exit_fn(),
    };
    let asyncness = cx.asyncness();
    let payload_param = cx.payload_param();
    let cancel_param = cx.cancel_param();
    let payload_binding = cx.payload_binding();
    let reject = quote!({ return false; });

    let arms = cx.model.states.iter().enumerate().filter_map(|(index, state)| {
        let callback = match walk {
            Walk::Enter => state.on_entry.as_ref(),
            Walk::Exit => state.on_exit.as_ref(),
        }?;
        let index = helpers::index_literal(index);
        let call = callbacks::effect(cx, callback, &reject);
        Some(quote!(#index => { #call }))
    });

    quote! {
        #[allow(unused_variables)]
        #asyncness fn #name(&mut self, state: usize #payload_param #cancel_param) -> bool {
            #payload_binding
            match state {
                #(#arms)*
                _ => {}
            }
            true
        }
    }
}

/// Exit from the active leaf up to the transition scope, run the action,
/// then enter down to the resolved target leaf.
pub fn render_transfer(cx: &EmissionContext<'_>, transition: &TransitionModel, reject: &TokenStream) -> TokenStream {
    let state_field = helpers::state_field();
    let history = helpers::history_field();
    let table = helpers::hierarchy_static();
    let states = helpers::states_const();
    let index = helpers::index_fn();
    let awaited = cx.awaited();
    let forward = cx.forward(quote!(payload));

    let source = helpers::index_literal(cx.index_of(&transition.from));
    let target = helpers::index_literal(cx.index_of(&transition.to));
    let action = transition
        .action
        .as_ref()
        .map(|action| callbacks::effect(cx, action, reject));

    let (exit_call, enter_call) = if cx.model.config.has_entry_exit {
        let exit = helpers::exit_fn();
        let enter = helpers::enter_fn();
        (
            quote!(if !self.#exit(__state #forward)#awaited #reject),
            quote!(if !self.#enter(__state #forward)#awaited #reject),
        )
    } else {
        (TokenStream::new(), TokenStream::new())
    };

    quote! {
        let __scope = #table.transition_scope(#source, #target);
        for __state in #table.exit_path(#index(self.#state_field), __scope) {
            self.#history.record_exit(&#table, __state);
            #exit_call
        }
        #action
        let __leaf = #table.resolve_entry(#target, &self.#history);
        for __state in #table.entry_path(__scope, __leaf) {
            #enter_call
        }
        self.#state_field = #states[__leaf];
    }
}
