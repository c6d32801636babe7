use quote::quote;

use super::context::EmissionContext;
use crate::helpers;

pub fn prepare(cx: &mut EmissionContext<'_>) {
    let field = helpers::extensions_field();
    let state_type = cx.state_type().clone();
    let trigger_type = cx.trigger_type().clone();
    cx.fields.push((
        field.clone(),
        syn::parse_quote!(::fastfsm::ExtensionRunner<#state_type, #trigger_type>),
    ));
    cx.constructor
        .push(quote!(#field: ::fastfsm::ExtensionRunner::new()));
    cx.hooks.set_observer(field);
}

pub fn emit(cx: &mut EmissionContext<'_>) {
    let field = helpers::extensions_field();
    let state_type = cx.state_type();
    let trigger_type = cx.trigger_type();

    let add_extension = quote! {
        /// Registers an extension. Extensions run in registration order.
        pub fn add_extension(
            &mut self,
            extension: impl ::fastfsm::StateMachineExtension<#state_type, #trigger_type> + 'static,
        ) {
            self.#field.push(extension);
        }
    };
    cx.methods.push(add_extension);
}
