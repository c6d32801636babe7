use proc_macro2::{Literal, Span};
use syn::Ident;

fn ident(name: &str) -> Ident {
    Ident::new(name, Span::call_site())
}

/// Private field holding the current state.
pub fn state_field() -> Ident {
    ident("__fsm_state")
}

/// Private field holding the registered extensions.
pub fn extensions_field() -> Ident {
    ident("__fsm_extensions")
}

/// Private field holding the per-instance history of composite states.
pub fn history_field() -> Ident {
    ident("__fsm_history")
}

/// `static` with the machine's hierarchy tables.
pub fn hierarchy_static() -> Ident {
    ident("__FSM_HIERARCHY")
}

/// `const` array of every state, indexed like the hierarchy tables.
pub fn states_const() -> Ident {
    ident("__FSM_STATES")
}

/// Free function mapping a state to its table index.
pub fn index_fn() -> Ident {
    ident("__fsm_index")
}

pub fn dispatch_fn() -> Ident {
    ident("__fsm_dispatch")
}

pub fn query_fn() -> Ident {
    ident("__fsm_query")
}

pub fn enter_fn() -> Ident {
    ident("__fsm_enter")
}

pub fn exit_fn() -> Ident {
    ident("__fsm_exit")
}

/// Constructor parameter for the initial state, renamed when a user field
/// already uses the plain name.
pub fn initial_state_param(fields: &[(Ident, syn::Type)]) -> Ident {
    if fields.iter().any(|(field, _)| field == "initial_state") {
        ident("__fsm_initial_state")
    } else {
        ident("initial_state")
    }
}

/// Table index as an unsuffixed literal.
pub fn index_literal(index: usize) -> Literal {
    Literal::usize_unsuffixed(index)
}
