//! Shared emission state threaded through every feature emitter.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Ident, Type};

use crate::model::{GenerationVariant, PayloadKind, StateMachineModel};

/// Buffers the feature emitters append to, in emission order.
pub struct EmissionContext<'a> {
    pub model: &'a StateMachineModel,
    pub variant: GenerationVariant,
    /// Payload shape of the emitted API.
    pub payload: PayloadKind,
    /// Statics, consts and free functions placed next to the impl blocks.
    pub items: Vec<TokenStream>,
    /// Fields injected into the machine struct.
    pub fields: Vec<(Ident, Type)>,
    /// Field initializers of the generated constructor.
    pub constructor: Vec<TokenStream>,
    /// Statements run in the constructor after the struct is built.
    pub constructor_stmts: Vec<TokenStream>,
    pub methods: Vec<TokenStream>,
    pub trait_items: Vec<TokenStream>,
    pub hooks: Hooks,
}

impl<'a> EmissionContext<'a> {
    pub fn new(model: &'a StateMachineModel, variant: GenerationVariant, payload: PayloadKind) -> Self {
        Self {
            model,
            variant,
            payload,
            items: Vec::new(),
            fields: Vec::new(),
            constructor: Vec::new(),
            constructor_stmts: Vec::new(),
            methods: Vec::new(),
            trait_items: Vec::new(),
            hooks: Hooks::default(),
        }
    }

    pub fn is_async(&self) -> bool {
        self.model.config.is_async
    }

    pub fn has_payload(&self) -> bool {
        self.payload != PayloadKind::None
    }

    pub fn state_type(&self) -> &Ident {
        &self.model.state_type
    }

    pub fn trigger_type(&self) -> &Ident {
        &self.model.trigger_type
    }

    pub fn asyncness(&self) -> TokenStream {
        if self.is_async() { quote!(async) } else { TokenStream::new() }
    }

    pub fn awaited(&self) -> TokenStream {
        if self.is_async() { quote!(.await) } else { TokenStream::new() }
    }

    /// `, payload: ..` for internal functions of payload machines.
    pub fn payload_param(&self) -> TokenStream {
        if self.has_payload() {
            let ty = dyn_payload();
            quote!(, payload: ::core::option::Option<&#ty>)
        } else {
            TokenStream::new()
        }
    }

    /// `, cancel: &CancellationToken` for async machines.
    pub fn cancel_param(&self) -> TokenStream {
        if self.is_async() {
            quote!(, cancel: &::fastfsm::CancellationToken)
        } else {
            TokenStream::new()
        }
    }

    /// Trailing arguments forwarding `payload` and `cancel` to an internal function.
    pub fn forward(&self, payload: TokenStream) -> TokenStream {
        let payload = if self.has_payload() { quote!(, #payload) } else { TokenStream::new() };
        let cancel = if self.is_async() { quote!(, cancel) } else { TokenStream::new() };
        quote!(#payload #cancel)
    }

    /// `, cancel` when calling a public method from another one.
    pub fn forward_cancel(&self) -> TokenStream {
        if self.is_async() { quote!(, cancel) } else { TokenStream::new() }
    }

    /// Whether a `payload` binding is visible inside dispatch and queries.
    pub fn payload_in_scope(&self) -> bool {
        self.has_payload() || self.model.callbacks().any(|callback| callback.expects_payload())
    }

    /// Binds an empty `payload` for machines whose API carries none but whose
    /// callbacks still name one.
    pub fn payload_binding(&self) -> TokenStream {
        if !self.has_payload() && self.payload_in_scope() {
            let ty = dyn_payload();
            quote!(let payload: ::core::option::Option<&#ty> = ::core::option::Option::None;)
        } else {
            TokenStream::new()
        }
    }

    /// The payload as seen by extension hooks.
    pub fn payload_expr(&self) -> TokenStream {
        if self.payload_in_scope() {
            quote!(payload)
        } else {
            quote!(::core::option::Option::None)
        }
    }

    pub fn state_path(&self, state: &Ident) -> TokenStream {
        let ty = self.state_type();
        quote!(#ty::#state)
    }

    pub fn trigger_path(&self, trigger: &Ident) -> TokenStream {
        let ty = self.trigger_type();
        quote!(#ty::#trigger)
    }

    pub fn index_of(&self, state: &Ident) -> usize {
        self.model.state_index(state).unwrap_or_default()
    }

    pub fn hierarchy(&self) -> bool {
        self.model.config.hierarchy
    }
}

/// The type-erased payload all dispatch paths share.
pub fn dyn_payload() -> TokenStream {
    quote!((dyn ::core::any::Any + ::core::marker::Send + ::core::marker::Sync))
}

/// One transition as the extension hooks see it.
pub struct HookSite<'a> {
    pub from: TokenStream,
    pub trigger: TokenStream,
    pub to: TokenStream,
    pub payload: &'a TokenStream,
}

/// Insertion points filled by optional features and read by the core.
#[derive(Default)]
pub struct Hooks {
    payload_filter: Option<TokenStream>,
    observer: Option<Ident>,
}

impl Hooks {
    /// Statements run before any arm of dispatch and queries; may `return false`.
    pub fn set_payload_filter(&mut self, filter: TokenStream) {
        self.payload_filter = Some(filter);
    }

    /// Routes transition events to the extension runner in `field`.
    pub fn set_observer(&mut self, field: Ident) {
        self.observer = Some(field);
    }

    pub fn payload_filter(&self) -> TokenStream {
        self.payload_filter.clone().unwrap_or_default()
    }

    pub fn observed(&self) -> bool {
        self.observer.is_some()
    }

    pub fn before(&self, site: &HookSite<'_>) -> TokenStream {
        let Some(field) = &self.observer else {
            return TokenStream::new();
        };
        let HookSite {
            from,
            trigger,
            to,
            payload,
        } = site;
        quote! {
            let __context = ::fastfsm::TransitionContext::new(#from, #trigger, #to, #payload);
            self.#field.before_transition(&__context);
        }
    }

    pub fn after(&self, success: bool) -> TokenStream {
        match &self.observer {
            Some(field) => quote!(self.#field.after_transition(&__context, #success);),
            None => TokenStream::new(),
        }
    }

    pub fn guard_evaluation(&self, guard: &Ident) -> TokenStream {
        let Some(field) = &self.observer else {
            return TokenStream::new();
        };
        let name = guard.to_string();
        quote!(self.#field.guard_evaluation(&__context, #name);)
    }

    pub fn guard_evaluated(&self, guard: &Ident, result: &Ident) -> TokenStream {
        let Some(field) = &self.observer else {
            return TokenStream::new();
        };
        let name = guard.to_string();
        quote!(self.#field.guard_evaluated(&__context, #name, #result);)
    }

    /// `after(false)`, then leave the candidate block `label`.
    pub fn pass(&self, label: &syn::Lifetime) -> TokenStream {
        let after = self.after(false);
        quote!({
            #after
            break #label;
        })
    }

    /// `after(false)` followed by the early return of a failed attempt.
    pub fn reject(&self) -> TokenStream {
        let after = self.after(false);
        quote!({
            #after
            return false;
        })
    }
}
