//! # fastfsm
//!
//! Compile-time generated finite state machines. Transitions, guards and
//! state callbacks are declared with attributes; `#[fsm]` validates the
//! declarations and generates a plain `match`-based dispatcher directly on
//! your struct. There is no runtime engine and no allocation per transition.
//!
//! ## Example
//!
//! ```rust
//! #[fastfsm::fsm]
//! mod door {
//!     #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//!     pub enum State { Closed, Open, Locked }
//!
//!     #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//!     pub enum Trigger { Open, Close, Lock, Unlock }
//!
//!     #[state_machine(state = State, trigger = Trigger)]
//!     #[transition(from = Closed, trigger = Open, to = Open)]
//!     #[transition(from = Open, trigger = Close, to = Closed)]
//!     #[transition(from = Closed, trigger = Lock, to = Locked, guard = "has_key")]
//!     #[transition(from = Locked, trigger = Unlock, to = Closed, guard = "has_key")]
//!     pub struct Door {
//!         has_key: bool,
//!     }
//!
//!     impl Door {
//!         fn has_key(&self) -> bool {
//!             self.has_key
//!         }
//!     }
//! }
//!
//! use door::{Door, State, Trigger};
//!
//! let mut door = Door::new(State::Closed, true);
//! assert!(door.try_fire(Trigger::Lock));
//! assert_eq!(door.current_state(), State::Locked);
//! assert!(door.fire(Trigger::Open).is_err());
//! assert_eq!(door.permitted_triggers(), vec![Trigger::Unlock]);
//! ```
//!
//! ## Variants
//!
//! The generated code is tailored to what a machine uses. A machine with no
//! callbacks besides guards and actions is [`GenerationVariant::Pure`];
//! `on_entry`/`on_exit` make it `Basic`; payload declarations add
//! `try_fire_with`, `fire_with` and `can_fire_with`; `extensions = true` adds
//! [`StateMachineExtension`] hooks. A variant can be forced with
//! `#[state_machine(variant = ...)]`, which is rejected when the declarations
//! need more than the variant provides.
//!
//! ## Async machines
//!
//! As soon as one callback is `async`, every dispatch and query method becomes
//! `async` and takes a trailing [`CancellationToken`], which callbacks may
//! receive as their last parameter.

#[doc(inline)]
pub use fastfsm_core::*;
#[doc(inline)]
pub use fastfsm_macros::fsm;
