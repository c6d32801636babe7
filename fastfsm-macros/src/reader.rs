//! Semantic reader: the facts the generator needs from an `#[fsm]` module.
//!
//! The reader does no validation of its own. It records enums with their
//! evaluated discriminants, method signatures grouped by owner, and the
//! helper attributes found on each struct, in declaration order.

use proc_macro2::Span;
use syn::{
    Expr, FnArg, Generics, Ident, ImplItem, Item, ItemMod, Lit, ReturnType, Type, UnOp,
    spanned::Spanned,
};

use crate::attrs::{
    self, EnumRef, InternalTransitionArgs, PayloadTypeArgs, StateArgs, StateMachineArgs,
    TransitionArgs,
};

/// Everything read from one module.
#[derive(Debug, Default)]
pub struct ModuleFacts {
    pub module: Option<Ident>,
    pub enums: Vec<EnumFacts>,
    /// Names of structs, unions and type aliases, for the enum-kind check.
    pub other_types: Vec<Ident>,
    pub methods: Vec<MethodFacts>,
    pub machines: Vec<MachineDecl>,
    /// Attribute arguments darling could not parse.
    pub errors: Vec<darling::Error>,
}

impl ModuleFacts {
    pub fn read(module: &ItemMod) -> Self {
        let mut facts = Self {
            module: Some(module.ident.clone()),
            ..Self::default()
        };
        let Some((_, items)) = &module.content else {
            return facts;
        };

        for (index, item) in items.iter().enumerate() {
            match item {
                Item::Enum(item) => facts.enums.push(EnumFacts::read(item)),
                Item::Struct(item) => {
                    facts.other_types.push(item.ident.clone());
                    if item.attrs.iter().any(attrs::is_helper) {
                        let decl = MachineDecl::read(index, item, &mut facts.errors);
                        facts.machines.push(decl);
                    }
                }
                Item::Type(item) => facts.other_types.push(item.ident.clone()),
                Item::Union(item) => facts.other_types.push(item.ident.clone()),
                Item::Impl(item) if item.trait_.is_none() => {
                    let Some(owner) = type_name(&item.self_ty) else {
                        continue;
                    };
                    for member in &item.items {
                        if let ImplItem::Fn(method) = member {
                            let facts_for = MethodFacts::read(owner, method, &mut facts.errors);
                            facts.methods.push(facts_for);
                        }
                    }
                }
                _ => {}
            }
        }
        facts
    }

    pub fn find_enum(&self, name: &Ident) -> Option<&EnumFacts> {
        self.enums.iter().find(|facts| &facts.ident == name)
    }

    pub fn is_known_type(&self, name: &Ident) -> bool {
        self.other_types.iter().any(|ident| ident == name)
    }

    /// Methods declared in inherent impls of `owner`, in declaration order.
    pub fn methods_of<'a>(&'a self, owner: &'a Ident) -> impl Iterator<Item = &'a MethodFacts> + 'a {
        self.methods.iter().filter(move |method| &method.owner == owner)
    }
}

/// An enum and its members with evaluated discriminants.
#[derive(Debug, Clone)]
pub struct EnumFacts {
    pub ident: Ident,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone)]
pub struct EnumMember {
    pub ident: Ident,
    /// `None` when the discriminant is not an integer literal, or follows one
    /// that is not.
    pub value: Option<i128>,
}

impl EnumFacts {
    fn read(item: &syn::ItemEnum) -> Self {
        let mut next = Some(0i128);
        let members = item
            .variants
            .iter()
            .map(|variant| {
                let value = match &variant.discriminant {
                    Some((_, expr)) => integer_value(expr),
                    None => next,
                };
                next = value.and_then(|value| value.checked_add(1));
                EnumMember {
                    ident: variant.ident.clone(),
                    value,
                }
            })
            .collect();

        Self {
            ident: item.ident.clone(),
            members,
        }
    }

    /// Resolves a reference against the declared members.
    ///
    /// Integers match by discriminant value, so `0x2`, `2u8` and `2` all
    /// name the member whose discriminant is two.
    pub fn resolve(&self, reference: &EnumRef) -> Option<&EnumMember> {
        match &reference.0 {
            Expr::Path(path) => {
                let segments = &path.path.segments;
                let last = segments.last()?;
                if segments.len() > 1 {
                    let owner = &segments[segments.len() - 2].ident;
                    if owner != &self.ident && owner != "Self" {
                        return None;
                    }
                }
                self.member(&last.ident)
            }
            expr => {
                let value = integer_value(expr)?;
                self.members
                    .iter()
                    .find(|member| member.value == Some(value))
            }
        }
    }

    pub fn member(&self, name: &Ident) -> Option<&EnumMember> {
        self.members.iter().find(|member| &member.ident == name)
    }
}

fn integer_value(expr: &Expr) -> Option<i128> {
    match expr {
        Expr::Lit(lit) => match &lit.lit {
            Lit::Int(int) => int.base10_parse::<i128>().ok(),
            _ => None,
        },
        Expr::Unary(unary) if matches!(unary.op, UnOp::Neg(_)) => {
            integer_value(&unary.expr).map(|value| -value)
        }
        Expr::Paren(paren) => integer_value(&paren.expr),
        Expr::Group(group) => integer_value(&group.expr),
        _ => None,
    }
}

fn type_name(ty: &Type) -> Option<&Ident> {
    match ty {
        Type::Path(path) => path.path.segments.last().map(|segment| &segment.ident),
        _ => None,
    }
}

/// How a method takes `self`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    None,
    Ref,
    RefMut,
    Value,
}

/// Signature facts of one method.
#[derive(Debug, Clone)]
pub struct MethodFacts {
    pub owner: Ident,
    pub ident: Ident,
    pub receiver: Receiver,
    /// Parameter types after the receiver.
    pub params: Vec<Type>,
    pub output: Option<Type>,
    pub is_async: bool,
    pub span: Span,
    /// `#[payload_type(..)]` declarations on the method.
    pub payload_types: Vec<Declaration<PayloadTypeArgs>>,
}

impl MethodFacts {
    pub(crate) fn read(owner: &Ident, method: &syn::ImplItemFn, errors: &mut Vec<darling::Error>) -> Self {
        let sig = &method.sig;
        let receiver = match sig.receiver() {
            None => Receiver::None,
            Some(receiver) if receiver.reference.is_none() => Receiver::Value,
            Some(receiver) if receiver.mutability.is_some() => Receiver::RefMut,
            Some(_) => Receiver::Ref,
        };
        let params = sig
            .inputs
            .iter()
            .filter_map(|input| match input {
                FnArg::Typed(pat) => Some((*pat.ty).clone()),
                FnArg::Receiver(_) => None,
            })
            .collect();
        let output = match &sig.output {
            ReturnType::Default => None,
            ReturnType::Type(_, ty) => Some((**ty).clone()),
        };
        let payload_types = method
            .attrs
            .iter()
            .filter(|attr| attr.path().is_ident(attrs::PAYLOAD_TYPE))
            .filter_map(|attr| match attrs::parse_args::<PayloadTypeArgs>(attr) {
                Ok(args) => Some(Declaration::new(args, attr.span())),
                Err(err) => {
                    errors.push(err);
                    None
                }
            })
            .collect();

        Self {
            owner: owner.clone(),
            ident: sig.ident.clone(),
            receiver,
            params,
            output,
            is_async: sig.asyncness.is_some(),
            span: sig.ident.span(),
            payload_types,
        }
    }
}

/// A parsed helper attribute and where it was written.
#[derive(Debug, Clone)]
pub struct Declaration<T> {
    pub args: T,
    pub span: Span,
}

impl<T> Declaration<T> {
    pub fn new(args: T, span: Span) -> Self {
        Self { args, span }
    }
}

/// Struct-level declarations, in source order.
#[derive(Debug)]
pub enum MachineAttr {
    StateMachine(Declaration<StateMachineArgs>),
    Transition(Declaration<TransitionArgs>),
    InternalTransition(Declaration<InternalTransitionArgs>),
    State(Declaration<StateArgs>),
    PayloadType(Declaration<PayloadTypeArgs>),
}

/// Field layout of the annotated struct.
#[derive(Debug, Clone)]
pub enum StructShape {
    Named(Vec<(Ident, Type)>),
    Unit,
    Tuple,
}

/// A struct carrying at least one helper attribute.
#[derive(Debug)]
pub struct MachineDecl {
    pub ident: Ident,
    pub generics: Generics,
    pub shape: StructShape,
    pub attrs: Vec<MachineAttr>,
    /// Position of the struct among the module items.
    pub item_index: usize,
    /// Some helper attribute failed to parse; the error is already recorded.
    pub malformed: bool,
}

impl MachineDecl {
    fn read(item_index: usize, item: &syn::ItemStruct, errors: &mut Vec<darling::Error>) -> Self {
        let shape = match &item.fields {
            syn::Fields::Named(fields) => StructShape::Named(
                fields
                    .named
                    .iter()
                    .filter_map(|field| field.ident.clone().map(|ident| (ident, field.ty.clone())))
                    .collect(),
            ),
            syn::Fields::Unit => StructShape::Unit,
            syn::Fields::Unnamed(_) => StructShape::Tuple,
        };

        let mut malformed = false;
        let mut decl_attrs = Vec::new();
        for attr in item.attrs.iter().filter(|attr| attrs::is_helper(attr)) {
            let span = attr.span();
            let parsed = if attr.path().is_ident(attrs::STATE_MACHINE) {
                attrs::parse_args(attr).map(|args| MachineAttr::StateMachine(Declaration::new(args, span)))
            } else if attr.path().is_ident(attrs::TRANSITION) {
                attrs::parse_args(attr).map(|args| MachineAttr::Transition(Declaration::new(args, span)))
            } else if attr.path().is_ident(attrs::INTERNAL_TRANSITION) {
                attrs::parse_args(attr)
                    .map(|args| MachineAttr::InternalTransition(Declaration::new(args, span)))
            } else if attr.path().is_ident(attrs::STATE) {
                attrs::parse_args(attr).map(|args| MachineAttr::State(Declaration::new(args, span)))
            } else {
                attrs::parse_args(attr).map(|args| MachineAttr::PayloadType(Declaration::new(args, span)))
            };
            match parsed {
                Ok(decl) => decl_attrs.push(decl),
                Err(err) => {
                    malformed = true;
                    errors.push(err);
                }
            }
        }

        Self {
            ident: item.ident.clone(),
            generics: item.generics.clone(),
            shape,
            attrs: decl_attrs,
            item_index,
            malformed,
        }
    }

    pub fn primary(&self) -> Option<&Declaration<StateMachineArgs>> {
        self.attrs.iter().find_map(|attr| match attr {
            MachineAttr::StateMachine(decl) => Some(decl),
            _ => None,
        })
    }

    pub fn user_fields(&self) -> &[(Ident, Type)] {
        match &self.shape {
            StructShape::Named(fields) => fields,
            StructShape::Unit | StructShape::Tuple => &[],
        }
    }
}
