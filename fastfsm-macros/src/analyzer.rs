//! Sync/async consistency analysis of callbacks.
//!
//! [`analyze`] classifies one callback's signature; [`AsyncMode`] folds the
//! classifications of a whole machine into its execution mode.

use syn::{GenericArgument, PathArguments, Type, TypeParamBound};

use crate::reader::{MethodFacts, Receiver};

/// What a callback is used as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackRole {
    Guard,
    Action,
    OnEntry,
    OnExit,
}

impl CallbackRole {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Guard => "guard",
            Self::Action => "action",
            Self::OnEntry => "on_entry",
            Self::OnExit => "on_exit",
        }
    }
}

/// Return-shape classification of a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeClass {
    SyncVoid,
    AsyncVoid,
    /// Spawns work and hands back a `JoinHandle`; nothing to await.
    InvalidAsyncVoid,
    SyncBool,
    AsyncBool,
    /// An async guard whose future does not resolve to `bool`.
    InvalidAsyncGuard,
    InvalidOther,
}

impl ShapeClass {
    /// Execution mode the callback imposes, if it is usable at all.
    pub fn mode(self) -> Option<CallbackMode> {
        match self {
            Self::SyncVoid | Self::SyncBool | Self::InvalidAsyncVoid => Some(CallbackMode::Sync),
            Self::AsyncVoid | Self::AsyncBool => Some(CallbackMode::Async),
            Self::InvalidAsyncGuard | Self::InvalidOther => None,
        }
    }
}

/// How a callback receives the trigger payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadParam {
    None,
    /// `&P`: only callable when a payload of type `P` is present.
    Required(Type),
    /// `Option<&P>`: callable with or without a payload.
    Optional(Type),
    /// A parameter that is neither form, e.g. `P` by value.
    Invalid(Type),
}

impl PayloadParam {
    pub fn ty(&self) -> Option<&Type> {
        match self {
            Self::None => None,
            Self::Required(ty) | Self::Optional(ty) | Self::Invalid(ty) => Some(ty),
        }
    }
}

/// How a callback receives the cancellation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenParam {
    None,
    Owned,
    Borrowed,
}

/// Full classification of one callback signature.
#[derive(Debug, Clone)]
pub struct CallbackShape {
    pub class: ShapeClass,
    /// Returns `Result<_, E>`.
    pub fallible: bool,
    pub receiver: Receiver,
    pub payload: PayloadParam,
    pub token: TokenParam,
    /// Parameters beyond one payload and one trailing token.
    pub extra_params: usize,
}

pub fn analyze(method: &MethodFacts, role: CallbackRole) -> CallbackShape {
    let (class, fallible) = classify_return(method, role);

    let mut params: &[Type] = &method.params;
    let mut token = TokenParam::None;
    if let Some((last, rest)) = params.split_last()
        && let Some(kind) = token_kind(last)
    {
        token = kind;
        params = rest;
    }

    let payload = match params.first() {
        None => PayloadParam::None,
        Some(ty) => payload_param(ty),
    };

    CallbackShape {
        class,
        fallible,
        receiver: method.receiver,
        payload,
        token,
        extra_params: params.len().saturating_sub(1),
    }
}

enum Inner {
    Unit,
    Bool,
    Other,
}

fn classify_return(method: &MethodFacts, role: CallbackRole) -> (ShapeClass, bool) {
    let guard = role == CallbackRole::Guard;

    if method.is_async {
        let (inner, fallible) = inner_shape(method.output.as_ref());
        return (async_class(inner, guard), fallible);
    }

    let Some(output) = method.output.as_ref() else {
        let class = if guard { ShapeClass::InvalidOther } else { ShapeClass::SyncVoid };
        return (class, false);
    };

    if is_named(output, "JoinHandle") {
        let class = if guard { ShapeClass::InvalidAsyncGuard } else { ShapeClass::InvalidAsyncVoid };
        return (class, false);
    }

    if let Some(future_output) = future_output(output) {
        return match future_output {
            Some(ty) => {
                let (inner, fallible) = inner_shape(Some(&ty));
                (async_class(inner, guard), fallible)
            }
            None => {
                let class = if guard { ShapeClass::InvalidAsyncGuard } else { ShapeClass::InvalidOther };
                (class, false)
            }
        };
    }

    let (inner, fallible) = inner_shape(Some(output));
    let class = match (inner, guard) {
        (Inner::Bool, true) => ShapeClass::SyncBool,
        (Inner::Unit, false) => ShapeClass::SyncVoid,
        _ => ShapeClass::InvalidOther,
    };
    (class, fallible)
}

fn async_class(inner: Inner, guard: bool) -> ShapeClass {
    match (inner, guard) {
        (Inner::Bool, true) => ShapeClass::AsyncBool,
        (_, true) => ShapeClass::InvalidAsyncGuard,
        (Inner::Unit, false) => ShapeClass::AsyncVoid,
        (_, false) => ShapeClass::InvalidOther,
    }
}

/// Classifies `T` or `Result<T, E>`.
fn inner_shape(ty: Option<&Type>) -> (Inner, bool) {
    let Some(ty) = ty else {
        return (Inner::Unit, false);
    };
    if let Some(ok) = result_ok_type(ty) {
        return (plain_shape(ok), true);
    }
    (plain_shape(ty), false)
}

fn plain_shape(ty: &Type) -> Inner {
    match ty {
        Type::Tuple(tuple) if tuple.elems.is_empty() => Inner::Unit,
        Type::Paren(paren) => plain_shape(&paren.elem),
        Type::Group(group) => plain_shape(&group.elem),
        Type::Path(path) if path.qself.is_none() && path.path.is_ident("bool") => Inner::Bool,
        _ => Inner::Other,
    }
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(path) if path.qself.is_none() => path.path.segments.last(),
        Type::Group(group) => last_segment(&group.elem),
        _ => None,
    }
}

fn is_named(ty: &Type, name: &str) -> bool {
    last_segment(ty).is_some_and(|segment| segment.ident == name)
}

fn generic_types(segment: &syn::PathSegment) -> Vec<&Type> {
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn result_ok_type(ty: &Type) -> Option<&Type> {
    let segment = last_segment(ty)?;
    if segment.ident != "Result" {
        return None;
    }
    generic_types(segment).first().copied()
}

/// `Some(Some(T))` for a future resolving to `T`, `Some(None)` for a future
/// whose output cannot be read, `None` when `ty` is not a future.
fn future_output(ty: &Type) -> Option<Option<Type>> {
    match ty {
        Type::ImplTrait(impl_trait) => future_bound_output(impl_trait.bounds.iter()),
        Type::TraitObject(object) => future_bound_output(object.bounds.iter()),
        Type::Paren(paren) => future_output(&paren.elem),
        Type::Group(group) => future_output(&group.elem),
        Type::Path(_) => {
            let segment = last_segment(ty)?;
            if segment.ident == "BoxFuture" || segment.ident == "LocalBoxFuture" {
                return Some(generic_types(segment).first().map(|ty| (*ty).clone()));
            }
            if segment.ident == "Pin" || segment.ident == "Box" {
                let inner = generic_types(segment).first().copied()?;
                return future_output(inner);
            }
            None
        }
        _ => None,
    }
}

fn future_bound_output<'a>(
    mut bounds: impl Iterator<Item = &'a TypeParamBound>,
) -> Option<Option<Type>> {
    bounds.find_map(|bound| {
        let TypeParamBound::Trait(trait_bound) = bound else {
            return None;
        };
        let segment = trait_bound.path.segments.last()?;
        if segment.ident != "Future" {
            return None;
        }
        let output = match &segment.arguments {
            PathArguments::AngleBracketed(args) => args.args.iter().find_map(|arg| match arg {
                GenericArgument::AssocType(assoc) if assoc.ident == "Output" => {
                    Some(assoc.ty.clone())
                }
                _ => None,
            }),
            _ => None,
        };
        Some(output)
    })
}

fn token_kind(ty: &Type) -> Option<TokenParam> {
    match ty {
        Type::Reference(reference) if is_named(&reference.elem, "CancellationToken") => {
            Some(TokenParam::Borrowed)
        }
        _ if is_named(ty, "CancellationToken") => Some(TokenParam::Owned),
        _ => None,
    }
}

fn payload_param(ty: &Type) -> PayloadParam {
    match ty {
        Type::Reference(reference) if reference.mutability.is_none() => {
            PayloadParam::Required((*reference.elem).clone())
        }
        _ => {
            if let Some(segment) = last_segment(ty)
                && segment.ident == "Option"
                && let Some(Type::Reference(reference)) = generic_types(segment).first().copied()
                && reference.mutability.is_none()
            {
                return PayloadParam::Optional((*reference.elem).clone());
            }
            PayloadParam::Invalid(ty.clone())
        }
    }
}

/// Execution mode imposed by a single callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackMode {
    Sync,
    Async,
}

/// Machine-wide execution mode.
///
/// The first classified callback fixes the mode. An async machine accepts
/// sync callbacks; a sync machine rejects async ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AsyncMode {
    #[default]
    Unset,
    Sync,
    Async,
}

/// An async callback met a machine already fixed as synchronous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeConflict;

impl AsyncMode {
    pub fn observe(self, callback: CallbackMode) -> Result<Self, ModeConflict> {
        match (self, callback) {
            (Self::Unset, CallbackMode::Sync) => Ok(Self::Sync),
            (Self::Unset, CallbackMode::Async) => Ok(Self::Async),
            (Self::Sync, CallbackMode::Sync) => Ok(Self::Sync),
            (Self::Sync, CallbackMode::Async) => Err(ModeConflict),
            (Self::Async, _) => Ok(Self::Async),
        }
    }

    pub fn is_async(self) -> bool {
        self == Self::Async
    }
}
