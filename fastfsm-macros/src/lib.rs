//! Proc macro that turns declarative state machine definitions into
//! generated dispatch code.
//!
//! Use it through the `fastfsm` crate, which re-exports [`macro@fsm`] next to
//! the runtime types the generated code refers to.

use proc_macro::TokenStream;
use syn::{ItemMod, parse_macro_input};

mod analyzer;
mod attrs;
mod builder;
mod codegen;
mod diagnostics;
mod expand;
mod helpers;
mod model;
mod reader;
mod rules;
mod variant;

/// Generates state machines declared inside an inline module.
///
/// Every struct in the module carrying `#[state_machine(state = S, trigger = T)]`
/// becomes a machine. Its transitions and state callbacks are declared with
/// sibling attributes:
///
/// ```ignore
/// #[fastfsm::fsm]
/// mod door {
///     #[derive(Debug, Clone, Copy, PartialEq, Eq)]
///     pub enum State { Closed, Open, Locked }
///
///     #[derive(Debug, Clone, Copy, PartialEq, Eq)]
///     pub enum Trigger { Open, Close, Lock }
///
///     #[state_machine(state = State, trigger = Trigger)]
///     #[transition(from = Closed, trigger = Open, to = Open, guard = "unlocked")]
///     #[transition(from = Open, trigger = Close, to = Closed)]
///     #[transition(from = Closed, trigger = Lock, to = Locked)]
///     #[state(state = Open, on_entry = "announce")]
///     pub struct Door { opened: u32 }
///
///     impl Door {
///         fn unlocked(&self) -> bool { true }
///         fn announce(&mut self) { self.opened += 1; }
///     }
/// }
/// ```
///
/// Problems in the declarations are reported as compile errors or warnings
/// carrying an `FSMxxx` code; a machine with errors gets no generated code.
#[proc_macro_attribute]
pub fn fsm(args: TokenStream, input: TokenStream) -> TokenStream {
    let module = parse_macro_input!(input as ItemMod);
    match expand::expand(args.into(), module) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}
