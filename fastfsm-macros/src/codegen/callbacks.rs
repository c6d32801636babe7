//! Invocation of user callbacks from generated code.

use proc_macro2::TokenStream;
use quote::quote;

use super::context::EmissionContext;
use crate::analyzer::{PayloadParam, TokenParam};
use crate::model::CallbackModel;

/// A guard call as a `bool` expression.
///
/// A guard that needs a payload evaluates to `false` without one, and an
/// `Err` from a fallible guard is logged and read as `false`.
pub fn guard(cx: &EmissionContext<'_>, guard: &CallbackModel) -> TokenStream {
    let call = call(cx, guard);
    let machine = cx.model.ident.to_string();
    let name = guard.ident.to_string();
    let body = if guard.fallible {
        quote! {
            match #call {
                ::core::result::Result::Ok(allowed) => allowed,
                ::core::result::Result::Err(error) => {
                    ::fastfsm::__private::tracing::warn!(
                        machine = #machine,
                        callback = #name,
                        error = ?error,
                        "guard failed"
                    );
                    false
                }
            }
        }
    } else {
        call
    };

    match &guard.payload {
        PayloadParam::Required(ty) => quote! {
            match payload.and_then(|payload| payload.downcast_ref::<#ty>()) {
                ::core::option::Option::Some(__payload) => #body,
                ::core::option::Option::None => false,
            }
        },
        _ => body,
    }
}

/// An action, entry or exit call as a statement.
///
/// `on_error` runs when a fallible callback returns `Err`. A callback that
/// needs a payload is skipped when none of its type is present.
pub fn effect(cx: &EmissionContext<'_>, callback: &CallbackModel, on_error: &TokenStream) -> TokenStream {
    let call = call(cx, callback);
    let machine = cx.model.ident.to_string();
    let name = callback.ident.to_string();
    let stmt = if callback.detached {
        quote!(::core::mem::drop(#call);)
    } else if callback.fallible {
        quote! {
            if let ::core::result::Result::Err(error) = #call {
                ::fastfsm::__private::tracing::warn!(
                    machine = #machine,
                    callback = #name,
                    error = ?error,
                    "state machine callback failed"
                );
                #on_error
            }
        }
    } else {
        quote!(#call;)
    };

    match &callback.payload {
        PayloadParam::Required(ty) => quote! {
            if let ::core::option::Option::Some(__payload) =
                payload.and_then(|payload| payload.downcast_ref::<#ty>())
            {
                #stmt
            }
        },
        _ => stmt,
    }
}

fn call(cx: &EmissionContext<'_>, callback: &CallbackModel) -> TokenStream {
    let ident = &callback.ident;
    let mut args = Vec::new();
    match &callback.payload {
        PayloadParam::Required(_) => args.push(quote!(__payload)),
        PayloadParam::Optional(ty) => {
            args.push(quote!(payload.and_then(|payload| payload.downcast_ref::<#ty>())))
        }
        PayloadParam::None | PayloadParam::Invalid(_) => {}
    }
    match callback.token {
        TokenParam::Owned => args.push(quote!(::core::clone::Clone::clone(cancel))),
        TokenParam::Borrowed => args.push(quote!(cancel)),
        TokenParam::None => {}
    }
    let awaited = if callback.is_async && cx.is_async() {
        quote!(.await)
    } else {
        TokenStream::new()
    };
    quote!(self.#ident(#(#args),*)#awaited)
}
