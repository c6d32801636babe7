//! Expansion of one `#[fsm]` module.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Fields, FieldsNamed, ImplItem, Item, ItemMod, ItemStruct, spanned::Spanned};

use crate::attrs;
use crate::builder;
use crate::codegen::{self, Generated};
use crate::diagnostics::Report;
use crate::reader::{MachineDecl, ModuleFacts};
use crate::variant;

pub fn expand(args: TokenStream, mut module: ItemMod) -> syn::Result<TokenStream> {
    if !args.is_empty() {
        return Err(syn::Error::new(args.span(), "#[fsm] takes no arguments"));
    }
    if module.content.is_none() {
        return Err(syn::Error::new(
            module.span(),
            "#[fsm] needs an inline module: `mod name { ... }`",
        ));
    }

    let mut facts = ModuleFacts::read(&module);
    let mut appended = Vec::new();
    if !facts.errors.is_empty() {
        let errors = darling::Error::multiple(std::mem::take(&mut facts.errors));
        appended.push(errors.write_errors());
    }

    let mut injected = Vec::new();
    for decl in &facts.machines {
        let mut report = Report::default();
        if let Some(generated) = generate_machine(decl, &facts, &mut report) {
            injected.push((decl.item_index, generated.fields));
            appended.push(generated.tokens);
        }
        appended.push(report.to_tokens());
    }

    if let Some((_, items)) = &mut module.content {
        for (index, fields) in injected {
            if let Some(Item::Struct(item)) = items.get_mut(index) {
                inject_fields(item, fields);
            }
        }
        strip_helpers(items);
        items.extend(
            appended
                .into_iter()
                .filter(|tokens| !tokens.is_empty())
                .map(Item::Verbatim),
        );
    }

    Ok(quote!(#module))
}

fn generate_machine(decl: &MachineDecl, facts: &ModuleFacts, report: &mut Report) -> Option<Generated> {
    let model = builder::build(decl, facts, report)?;
    let chosen = match variant::select(&model) {
        Ok(chosen) => chosen,
        Err(outcomes) => {
            let span = decl.primary().map_or_else(|| decl.ident.span(), |primary| primary.span);
            report.extend(outcomes, span);
            return None;
        }
    };
    let payload = variant::emitted_payload(chosen, &model);
    Some(codegen::generate(&model, chosen, payload))
}

fn inject_fields(item: &mut ItemStruct, fields: Vec<(syn::Ident, syn::Type)>) {
    let fields = fields.into_iter().map(|(ident, ty)| syn::Field {
        attrs: Vec::new(),
        vis: syn::Visibility::Inherited,
        mutability: syn::FieldMutability::None,
        ident: Some(ident),
        colon_token: Some(Default::default()),
        ty,
    });
    match &mut item.fields {
        Fields::Named(named) => named.named.extend(fields),
        Fields::Unit => {
            item.fields = Fields::Named(FieldsNamed {
                brace_token: Default::default(),
                named: fields.collect(),
            });
            item.semi_token = None;
        }
        Fields::Unnamed(_) => {}
    }
}

/// Helper attributes are not real attributes and must not reach rustc.
fn strip_helpers(items: &mut [Item]) {
    for item in items {
        match item {
            Item::Struct(item) => item.attrs.retain(|attr| !attrs::is_helper(attr)),
            Item::Impl(item) if item.trait_.is_none() => {
                for member in &mut item.items {
                    if let ImplItem::Fn(method) = member {
                        method.attrs.retain(|attr| !attrs::is_helper(attr));
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn expand_module(module: ItemMod) -> String {
        expand(TokenStream::new(), module).unwrap().to_string()
    }

    #[test]
    fn rejects_arguments_and_outline_modules() {
        let module: ItemMod = parse_quote!(mod m {});
        assert!(expand(quote!(strict), module).is_err());

        let outline: ItemMod = parse_quote!(mod m;);
        assert!(expand(TokenStream::new(), outline).is_err());
    }

    #[test]
    fn injects_fields_and_strips_helpers() {
        let output = expand_module(parse_quote! {
            mod m {
                #[derive(Debug, Clone, Copy, PartialEq, Eq)]
                pub enum State { Idle, Busy }
                #[derive(Debug, Clone, Copy, PartialEq, Eq)]
                pub enum Trigger { Go }

                #[state_machine(state = State, trigger = Trigger)]
                #[transition(from = Idle, trigger = Go, to = Busy)]
                pub struct Job;
            }
        });
        let module: ItemMod = syn::parse_str(&output).unwrap();
        let (_, items) = module.content.unwrap();
        let Item::Struct(job) = &items[2] else {
            panic!("struct moved");
        };
        assert!(job.attrs.is_empty());
        assert!(job.semi_token.is_none());
        let names: Vec<_> = job
            .fields
            .iter()
            .map(|field| field.ident.as_ref().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["__fsm_state"]);
        assert!(output.contains("fn try_fire"));
    }

    #[test]
    fn method_payload_attributes_are_stripped() {
        let output = expand_module(parse_quote! {
            mod m {
                pub enum State { A, B }
                pub enum Trigger { Go }

                #[state_machine(state = State, trigger = Trigger)]
                #[transition(from = A, trigger = Go, to = B, action = "record")]
                pub struct Job { seen: u32 }

                impl Job {
                    #[payload_type(ty = u32)]
                    fn record(&mut self, value: &u32) { self.seen = *value; }
                }
            }
        });
        assert!(!output.contains("payload_type"));
        assert!(output.contains("try_fire_with"));
    }

    #[test]
    fn forced_variant_mismatch_emits_only_the_error() {
        let output = expand_module(parse_quote! {
            mod m {
                pub enum State { A, B }
                pub enum Trigger { Go }

                #[state_machine(state = State, trigger = Trigger, variant = Pure)]
                #[state(state = B, on_entry = "arrived")]
                #[transition(from = A, trigger = Go, to = B)]
                pub struct Job;

                impl Job {
                    fn arrived(&mut self) {}
                }
            }
        });
        assert_eq!(output.matches("FSM009").count(), 1);
        assert!(output.contains("compile_error"));
        assert!(!output.contains("fn try_fire"));
        assert!(!output.contains("__fsm_state"));
    }

    #[test]
    fn malformed_attributes_surface_darling_errors() {
        let output = expand_module(parse_quote! {
            mod m {
                pub enum State { A }
                pub enum Trigger { Go }

                #[state_machine(state = State, trigger = Trigger)]
                #[transition(from = A, trigger = Go)]
                pub struct Job;
            }
        });
        assert!(output.contains("compile_error"));
        assert!(!output.contains("fn try_fire"));
    }

    #[test]
    fn unreachable_state_warns_without_blocking_generation() {
        let output = expand_module(parse_quote! {
            mod m {
                pub enum State { A, B, Lost }
                pub enum Trigger { Go }

                #[state_machine(state = State, trigger = Trigger)]
                #[transition(from = A, trigger = Go, to = B)]
                pub struct Job;
            }
        });
        assert!(output.contains("FSM002"));
        assert!(output.contains("deprecated"));
        assert!(output.contains("fn try_fire"));
    }

    #[test]
    fn unreachable_state_is_reported_with_other_errors() {
        let output = expand_module(parse_quote! {
            mod m {
                pub enum State { A, B, Lost }
                pub enum Trigger { Go }

                #[state_machine(state = State, trigger = Trigger)]
                #[transition(from = A, trigger = Go, to = B, guard = "missing")]
                pub struct Job;
            }
        });
        assert!(output.contains("FSM003"));
        assert!(output.contains("FSM002"));
        assert!(!output.contains("fn try_fire"));
    }
}
