//! Payload-carrying dispatch: one shared payload type, or one per trigger.

use proc_macro2::TokenStream;
use quote::quote;
use syn::Type;

use super::context::{EmissionContext, dyn_payload};
use crate::helpers;

/// Multi-payload machines reject a payload whose type does not match the
/// trigger before any guard runs.
pub fn prepare_multi(cx: &mut EmissionContext<'_>) {
    let arms = cx.model.trigger_payloads.iter().map(|(trigger, ty)| {
        let trigger = cx.trigger_path(trigger);
        quote!(#trigger => payload.is::<#ty>(),)
    });
    let fallback = match &cx.model.default_payload {
        Some(ty) => quote!(_ => payload.is::<#ty>(),),
        None => quote!(_ => true,),
    };
    let filter = quote! {
        if let ::core::option::Option::Some(payload) = payload {
            let accepted = match trigger {
                #(#arms)*
                #fallback
            };
            if !accepted {
                return false;
            }
        }
    };
    cx.hooks.set_payload_filter(filter);
}

pub fn emit_single(cx: &mut EmissionContext<'_>) {
    let Some(ty) = cx.model.default_payload.clone() else {
        return;
    };
    let methods = render_with_payload(cx, &Generic::Concrete(ty));
    cx.methods.push(methods);
}

pub fn emit_multi(cx: &mut EmissionContext<'_>) {
    let methods = render_with_payload(cx, &Generic::PerCall);
    cx.methods.push(methods);
}

enum Generic {
    Concrete(Type),
    PerCall,
}

fn render_with_payload(cx: &EmissionContext<'_>, generic: &Generic) -> TokenStream {
    let state_type = cx.state_type();
    let trigger_type = cx.trigger_type();
    let state_field = helpers::state_field();
    let dispatch = helpers::dispatch_fn();
    let query = helpers::query_fn();
    let asyncness = cx.asyncness();
    let awaited = cx.awaited();
    let cancel_param = cx.cancel_param();
    let cancel_arg = cx.forward_cancel();
    let dyn_payload = dyn_payload();
    let forward = cx.forward(quote!(::core::option::Option::Some(payload as &#dyn_payload)));

    let (params, payload_ty) = match generic {
        Generic::Concrete(ty) => (TokenStream::new(), quote!(#ty)),
        Generic::PerCall => (
            quote!(<P: ::core::any::Any + ::core::marker::Send + ::core::marker::Sync>),
            quote!(P),
        ),
    };

    quote! {
        /// Fires `trigger` carrying `payload`.
        ///
        /// Callbacks receive the payload through a `dyn Any` downcast, so its
        /// type must be `Send + Sync + 'static`.
        pub #asyncness fn try_fire_with #params(
            &mut self,
            trigger: #trigger_type,
            payload: &#payload_ty
            #cancel_param
        ) -> bool {
            self.#dispatch(trigger #forward)#awaited
        }

        pub #asyncness fn fire_with #params(
            &mut self,
            trigger: #trigger_type,
            payload: &#payload_ty
            #cancel_param
        ) -> ::core::result::Result<(), ::fastfsm::InvalidTransition<#state_type, #trigger_type>> {
            let state = self.#state_field;
            if self.try_fire_with(trigger, payload #cancel_arg)#awaited {
                ::core::result::Result::Ok(())
            } else {
                ::core::result::Result::Err(
                    ::fastfsm::InvalidTransition::with_payload::<#payload_ty>(state, trigger),
                )
            }
        }

        /// Whether `trigger` carrying `payload` would currently be taken.
        pub #asyncness fn can_fire_with #params(
            &self,
            trigger: #trigger_type,
            payload: &#payload_ty
            #cancel_param
        ) -> bool {
            self.#query(trigger #forward)#awaited
        }
    }
}
