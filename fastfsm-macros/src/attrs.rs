//! Attribute parsing for the machine declarations.
//!
//! Every helper attribute is a darling `FromMeta` struct. Enum references,
//! member names and payload types get small wrapper types so they accept both
//! bare paths (`from = State::Idle`) and string literals (`from = "Idle"`).

use darling::{FromMeta, ast::NestedMeta};
use proc_macro2::Span;
use syn::{Expr, Ident, Lit, Type, spanned::Spanned};

/// Names of every attribute the generator consumes and strips.
pub const STATE_MACHINE: &str = "state_machine";
pub const TRANSITION: &str = "transition";
pub const INTERNAL_TRANSITION: &str = "internal_transition";
pub const STATE: &str = "state";
pub const PAYLOAD_TYPE: &str = "payload_type";

pub const HELPER_ATTRIBUTES: &[&str] = &[
    STATE_MACHINE,
    TRANSITION,
    INTERNAL_TRANSITION,
    STATE,
    PAYLOAD_TYPE,
];

pub fn is_helper(attr: &syn::Attribute) -> bool {
    HELPER_ATTRIBUTES
        .iter()
        .any(|name| attr.path().is_ident(name))
}

/// Arguments for `#[state_machine(state = S, trigger = T, ...)]`.
///
/// `state` and `trigger` are optional here so that a missing one can be
/// reported as a declaration problem instead of a parse error.
#[derive(Debug, Default, FromMeta)]
pub struct StateMachineArgs {
    pub state: Option<TypeRef>,
    pub trigger: Option<TypeRef>,
    /// Payload type shared by every trigger.
    pub payload: Option<TypeArg>,
    /// Forced generation variant.
    pub variant: Option<VariantArg>,
    #[darling(default)]
    pub extensions: bool,
    #[darling(default)]
    pub structural_api: bool,
    #[darling(default)]
    pub continue_on_captured_context: bool,
    #[darling(default)]
    pub hierarchy: bool,
}

/// Arguments for `#[transition(from = A, trigger = Go, to = B, guard = "..", action = "..")]`.
#[derive(Debug, FromMeta)]
pub struct TransitionArgs {
    pub from: EnumRef,
    pub trigger: EnumRef,
    pub to: EnumRef,
    pub guard: Option<MemberName>,
    pub action: Option<MemberName>,
}

/// Arguments for `#[internal_transition(state = A, trigger = Tick, action = "..")]`.
#[derive(Debug, FromMeta)]
pub struct InternalTransitionArgs {
    pub state: EnumRef,
    pub trigger: EnumRef,
    pub action: MemberName,
    pub guard: Option<MemberName>,
}

/// Arguments for `#[state(state = A, on_entry = "..", parent = P, initial, history = "Deep")]`.
#[derive(Debug, FromMeta)]
pub struct StateArgs {
    pub state: EnumRef,
    pub on_entry: Option<MemberName>,
    pub on_exit: Option<MemberName>,
    pub parent: Option<EnumRef>,
    #[darling(default)]
    pub initial: bool,
    #[darling(default)]
    pub history: HistoryArg,
}

/// Arguments for `#[payload_type(ty = P, trigger = T::X)]`.
#[derive(Debug, Clone, FromMeta)]
pub struct PayloadTypeArgs {
    pub ty: TypeArg,
    pub trigger: Option<EnumRef>,
}

/// A reference to an enum member: a variant name, a path, or an integer
/// literal matched against the declared discriminants.
#[derive(Debug, Clone)]
pub struct EnumRef(pub Expr);

impl EnumRef {
    pub fn span(&self) -> Span {
        self.0.span()
    }

    /// Text shown in diagnostics.
    pub fn display(&self) -> String {
        match &self.0 {
            Expr::Path(path) => path
                .path
                .segments
                .iter()
                .map(|segment| segment.ident.to_string())
                .collect::<Vec<_>>()
                .join("::"),
            Expr::Lit(lit) => match &lit.lit {
                Lit::Int(int) => int.to_string(),
                Lit::Str(text) => text.value(),
                other => quote::quote!(#other).to_string(),
            },
            other => quote::quote!(#other).to_string().replace(' ', ""),
        }
    }
}

impl FromMeta for EnumRef {
    fn from_expr(expr: &Expr) -> darling::Result<Self> {
        match expr {
            Expr::Group(group) => Self::from_expr(&group.expr),
            Expr::Lit(lit) => Self::from_value(&lit.lit),
            _ => Ok(Self(expr.clone())),
        }
    }

    fn from_value(value: &Lit) -> darling::Result<Self> {
        match value {
            Lit::Str(text) => text
                .parse::<Expr>()
                .map(Self)
                .map_err(|err| darling::Error::custom(err).with_span(text)),
            other => Ok(Self(Expr::Lit(syn::ExprLit {
                attrs: Vec::new(),
                lit: other.clone(),
            }))),
        }
    }
}

/// A type named in `state = ..` / `trigger = ..`.
#[derive(Debug, Clone)]
pub struct TypeRef(pub syn::Path);

impl TypeRef {
    pub fn ident(&self) -> Option<&Ident> {
        self.0.segments.last().map(|segment| &segment.ident)
    }

    pub fn span(&self) -> Span {
        self.0.span()
    }

    pub fn display(&self) -> String {
        let path = &self.0;
        quote::quote!(#path).to_string().replace(' ', "")
    }
}

impl FromMeta for TypeRef {
    fn from_expr(expr: &Expr) -> darling::Result<Self> {
        match expr {
            Expr::Group(group) => Self::from_expr(&group.expr),
            Expr::Path(path) => Ok(Self(path.path.clone())),
            Expr::Lit(lit) => Self::from_value(&lit.lit),
            other => Err(darling::Error::unexpected_expr_type(other).with_span(other)),
        }
    }

    fn from_string(value: &str) -> darling::Result<Self> {
        syn::parse_str(value)
            .map(Self)
            .map_err(darling::Error::custom)
    }
}

/// A payload type. Generic types must be quoted: `ty = "Vec<u8>"`.
#[derive(Debug, Clone)]
pub struct TypeArg(pub Type);

impl FromMeta for TypeArg {
    fn from_expr(expr: &Expr) -> darling::Result<Self> {
        match expr {
            Expr::Group(group) => Self::from_expr(&group.expr),
            Expr::Path(path) => Ok(Self(Type::Path(syn::TypePath {
                qself: path.qself.clone(),
                path: path.path.clone(),
            }))),
            Expr::Tuple(tuple) if tuple.elems.is_empty() => Ok(Self(syn::parse_quote!(()))),
            Expr::Lit(lit) => Self::from_value(&lit.lit),
            other => Err(darling::Error::unexpected_expr_type(other).with_span(other)),
        }
    }

    fn from_value(value: &Lit) -> darling::Result<Self> {
        match value {
            Lit::Str(text) => text
                .parse::<Type>()
                .map(Self)
                .map_err(|err| darling::Error::custom(err).with_span(text)),
            other => Err(darling::Error::unexpected_lit_type(other)),
        }
    }
}

/// The name of a method on the machine: `guard = "can_start"` or `guard = can_start`.
#[derive(Debug, Clone)]
pub struct MemberName(pub Ident);

impl FromMeta for MemberName {
    fn from_expr(expr: &Expr) -> darling::Result<Self> {
        match expr {
            Expr::Group(group) => Self::from_expr(&group.expr),
            Expr::Path(path) => path
                .path
                .get_ident()
                .cloned()
                .map(Self)
                .ok_or_else(|| darling::Error::custom("expected a method name").with_span(path)),
            Expr::Lit(lit) => Self::from_value(&lit.lit),
            other => Err(darling::Error::unexpected_expr_type(other).with_span(other)),
        }
    }

    fn from_value(value: &Lit) -> darling::Result<Self> {
        match value {
            Lit::Str(text) => text
                .parse::<Ident>()
                .map(Self)
                .map_err(|err| darling::Error::custom(err).with_span(text)),
            other => Err(darling::Error::unexpected_lit_type(other)),
        }
    }
}

/// Forced generation variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantArg {
    Pure,
    Basic,
    WithPayload,
    WithMultiPayload,
    WithExtensions,
    Full,
}

impl VariantArg {
    fn parse(name: &str) -> Option<Self> {
        let variant = match name.to_ascii_lowercase().replace('_', "").as_str() {
            "pure" => Self::Pure,
            "basic" => Self::Basic,
            "withpayload" => Self::WithPayload,
            "withmultipayload" => Self::WithMultiPayload,
            "withextensions" => Self::WithExtensions,
            "full" => Self::Full,
            _ => return None,
        };
        Some(variant)
    }
}

impl FromMeta for VariantArg {
    fn from_string(value: &str) -> darling::Result<Self> {
        Self::parse(value).ok_or_else(|| darling::Error::unknown_value(value))
    }

    fn from_expr(expr: &Expr) -> darling::Result<Self> {
        match expr {
            Expr::Path(path) => {
                let name = last_segment(&path.path)?;
                Self::from_string(&name).map_err(|err| err.with_span(path))
            }
            Expr::Lit(lit) => Self::from_value(&lit.lit),
            other => Err(darling::Error::unexpected_expr_type(other).with_span(other)),
        }
    }
}

/// History mode of a composite state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryArg {
    #[default]
    None,
    Shallow,
    Deep,
}

impl FromMeta for HistoryArg {
    fn from_string(value: &str) -> darling::Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "shallow" => Ok(Self::Shallow),
            "deep" => Ok(Self::Deep),
            _ => Err(darling::Error::unknown_value(value)),
        }
    }

    fn from_expr(expr: &Expr) -> darling::Result<Self> {
        match expr {
            Expr::Path(path) => {
                let name = last_segment(&path.path)?;
                Self::from_string(&name).map_err(|err| err.with_span(path))
            }
            Expr::Lit(lit) => Self::from_value(&lit.lit),
            other => Err(darling::Error::unexpected_expr_type(other).with_span(other)),
        }
    }
}

fn last_segment(path: &syn::Path) -> darling::Result<String> {
    path.segments
        .last()
        .map(|segment| segment.ident.to_string())
        .ok_or_else(|| darling::Error::custom("empty path").with_span(path))
}

/// Parses the arguments of one helper attribute.
pub fn parse_args<T: FromMeta>(attr: &syn::Attribute) -> darling::Result<T> {
    match &attr.meta {
        syn::Meta::List(list) => {
            let items = NestedMeta::parse_meta_list(list.tokens.clone())?;
            T::from_list(&items)
        }
        syn::Meta::Path(_) => T::from_list(&[]),
        syn::Meta::NameValue(_) => {
            Err(darling::Error::custom("expected a parenthesized argument list").with_span(attr))
        }
    }
}
