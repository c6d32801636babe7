//! Callback signature rules.

use quote::ToTokens;
use syn::Type;

use super::{Outcome, Rule, Severity};
use crate::analyzer::{CallbackRole, CallbackShape, PayloadParam, ShapeClass, TokenParam};
use crate::reader::Receiver;

/// Payload a callback is expected to accept.
#[derive(Debug, Clone, Copy)]
pub enum ExpectedPayload<'a> {
    /// The machine carries no payload.
    None,
    /// Any single payload type is acceptable.
    Any,
    Type(&'a Type),
}

/// A callback as resolved against the machine's methods.
pub struct CallbackSignature<'a> {
    pub method: &'a str,
    pub role: CallbackRole,
    /// `None` when no method of that name exists.
    pub shape: Option<&'a CallbackShape>,
    pub expected: ExpectedPayload<'a>,
    /// A generation variant was forced on the machine.
    pub variant_forced: bool,
}

pub fn callback_signature(cx: &CallbackSignature<'_>) -> Vec<Outcome> {
    let Some(shape) = cx.shape else {
        return vec![invalid(cx, "method not found")];
    };
    let mut outcomes = Vec::new();

    match (shape.receiver, cx.role) {
        (Receiver::None | Receiver::Value, _) => {
            outcomes.push(invalid(cx, "must take &self or &mut self"));
        }
        (Receiver::RefMut, CallbackRole::Guard) => {
            outcomes.push(invalid(cx, "guards must take &self"));
        }
        _ => {}
    }

    match shape.class {
        ShapeClass::InvalidAsyncGuard => outcomes.push(Outcome::new(
            Rule::InvalidGuardFutureReturn,
            format!(
                "Guard method '{}' returns a future that does not resolve to bool. Async guards must return bool or Result<bool, E>.",
                cx.method
            ),
        )),
        ShapeClass::InvalidAsyncVoid => outcomes.push(Outcome::new(
            Rule::InvalidAsyncVoid,
            format!(
                "Method '{}' used as {} returns a JoinHandle; the spawned work is detached and its outcome is never observed.",
                cx.method,
                cx.role.describe()
            ),
        )),
        ShapeClass::InvalidOther => outcomes.push(invalid(cx, "unsupported return type")),
        ShapeClass::SyncVoid | ShapeClass::AsyncVoid | ShapeClass::SyncBool | ShapeClass::AsyncBool => {}
    }

    if shape.extra_params > 0 {
        let count = shape.extra_params + 1;
        outcomes.push(invalid(cx, &format!("found {count} parameters")));
        return outcomes;
    }

    outcomes.extend(payload_parameter(cx, &shape.payload));
    outcomes
}

fn payload_parameter(cx: &CallbackSignature<'_>, payload: &PayloadParam) -> Vec<Outcome> {
    let Some(found) = payload.ty() else {
        return Vec::new();
    };

    match (cx.expected, cx.role) {
        (ExpectedPayload::None, CallbackRole::Guard) => {
            let severity = if cx.variant_forced {
                Severity::Warning
            } else {
                Severity::Error
            };
            vec![
                Outcome::new(
                    Rule::GuardWithPayloadInNonPayloadMachine,
                    format!(
                        "Guard method '{}' expects a payload but the machine declares no payload type.",
                        cx.method
                    ),
                )
                .with_severity(severity),
            ]
        }
        (ExpectedPayload::None, _) => vec![invalid(cx, "must be parameterless")],
        _ if matches!(payload, PayloadParam::Invalid(_)) => vec![invalid(
            cx,
            &format!("payload must be taken as &P or Option<&P>, found {}", type_text(found)),
        )],
        (ExpectedPayload::Type(expected), _) if !same_type(expected, found) => vec![invalid(
            cx,
            &format!("found parameter type: {}", type_text(found)),
        )],
        _ => Vec::new(),
    }
}

/// A cancellation token parameter outside an async machine.
pub struct TokenParameter<'a> {
    pub method: &'a str,
    pub role: CallbackRole,
    pub token: TokenParam,
    pub machine_is_async: bool,
}

pub fn token_parameter(cx: &TokenParameter<'_>) -> Vec<Outcome> {
    if cx.token == TokenParam::None || cx.machine_is_async {
        return Vec::new();
    }
    vec![Outcome::new(
        Rule::InvalidMethodSignature,
        format!(
            "Method '{}' used as {} has an invalid signature. Expected: no CancellationToken parameter in a synchronous machine.",
            cx.method,
            cx.role.describe()
        ),
    )]
}

fn invalid(cx: &CallbackSignature<'_>, detail: &str) -> Outcome {
    Outcome::new(
        Rule::InvalidMethodSignature,
        format!(
            "Method '{}' used as {} has an invalid signature. Expected: '{}' ({detail}).",
            cx.method,
            cx.role.describe(),
            expected_signature(cx.role, cx.expected)
        ),
    )
}

fn expected_signature(role: CallbackRole, payload: ExpectedPayload<'_>) -> String {
    let receiver = match role {
        CallbackRole::Guard => "&self",
        _ => "&mut self",
    };
    let params = match payload {
        ExpectedPayload::None => String::new(),
        ExpectedPayload::Any => ", [&P]".to_string(),
        ExpectedPayload::Type(ty) => format!(", [&{}]", type_text(ty)),
    };
    let output = match role {
        CallbackRole::Guard => " -> bool",
        _ => "",
    };
    format!("fn({receiver}{params}){output}")
}

pub fn type_text(ty: &Type) -> String {
    ty.to_token_stream().to_string().replace(' ', "")
}

/// Textual type equality, tolerant of path qualification.
pub fn same_type(a: &Type, b: &Type) -> bool {
    if type_text(a) == type_text(b) {
        return true;
    }
    match (a, b) {
        (Type::Path(a), Type::Path(b)) => match (a.path.segments.last(), b.path.segments.last()) {
            (Some(a), Some(b)) => {
                a.ident == b.ident
                    && a.arguments.to_token_stream().to_string()
                        == b.arguments.to_token_stream().to_string()
            }
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn shape(class: ShapeClass, receiver: Receiver, payload: PayloadParam) -> CallbackShape {
        CallbackShape {
            class,
            fallible: false,
            receiver,
            payload,
            token: TokenParam::None,
            extra_params: 0,
        }
    }

    fn check(
        role: CallbackRole,
        shape: Option<&CallbackShape>,
        expected: ExpectedPayload<'_>,
    ) -> Vec<Outcome> {
        callback_signature(&CallbackSignature {
            method: "cb",
            role,
            shape,
            expected,
            variant_forced: false,
        })
    }

    #[test]
    fn missing_method() {
        let outcomes = check(CallbackRole::Action, None, ExpectedPayload::None);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].rule, Rule::InvalidMethodSignature);
        assert!(outcomes[0].message.ends_with("(method not found)."));
    }

    #[test]
    fn well_formed_callbacks_pass() {
        let guard = shape(ShapeClass::SyncBool, Receiver::Ref, PayloadParam::None);
        assert!(check(CallbackRole::Guard, Some(&guard), ExpectedPayload::None).is_empty());

        let payment: Type = parse_quote!(Payment);
        let action = shape(
            ShapeClass::AsyncVoid,
            Receiver::RefMut,
            PayloadParam::Required(parse_quote!(crate::Payment)),
        );
        assert!(check(CallbackRole::Action, Some(&action), ExpectedPayload::Type(&payment)).is_empty());
    }

    #[test]
    fn mutable_guard_is_rejected() {
        let guard = shape(ShapeClass::SyncBool, Receiver::RefMut, PayloadParam::None);
        let outcomes = check(CallbackRole::Guard, Some(&guard), ExpectedPayload::None);
        assert!(outcomes[0].message.contains("guards must take &self"));
    }

    #[test]
    fn too_many_parameters() {
        let mut action = shape(ShapeClass::SyncVoid, Receiver::RefMut, PayloadParam::None);
        action.extra_params = 1;
        let outcomes = check(CallbackRole::Action, Some(&action), ExpectedPayload::Any);
        assert!(outcomes[0].message.contains("found 2 parameters"));
    }

    #[test]
    fn payload_type_mismatch() {
        let expected: Type = parse_quote!(Payment);
        let action = shape(
            ShapeClass::SyncVoid,
            Receiver::RefMut,
            PayloadParam::Required(parse_quote!(Refund)),
        );
        let outcomes = check(CallbackRole::Action, Some(&action), ExpectedPayload::Type(&expected));
        assert!(outcomes[0].message.contains("found parameter type: Refund"));
    }

    #[test]
    fn guard_payload_without_machine_payload() {
        let guard = shape(
            ShapeClass::SyncBool,
            Receiver::Ref,
            PayloadParam::Required(parse_quote!(u32)),
        );
        let outcomes = check(CallbackRole::Guard, Some(&guard), ExpectedPayload::None);
        assert_eq!(outcomes[0].rule, Rule::GuardWithPayloadInNonPayloadMachine);
        assert!(outcomes[0].is_error());

        let forced = callback_signature(&CallbackSignature {
            method: "cb",
            role: CallbackRole::Guard,
            shape: Some(&guard),
            expected: ExpectedPayload::None,
            variant_forced: true,
        });
        assert_eq!(forced[0].severity, Severity::Warning);
    }

    #[test]
    fn async_shapes_map_to_their_rules() {
        let guard = shape(ShapeClass::InvalidAsyncGuard, Receiver::Ref, PayloadParam::None);
        let outcomes = check(CallbackRole::Guard, Some(&guard), ExpectedPayload::None);
        assert_eq!(outcomes[0].rule, Rule::InvalidGuardFutureReturn);

        let action = shape(ShapeClass::InvalidAsyncVoid, Receiver::RefMut, PayloadParam::None);
        let outcomes = check(CallbackRole::Action, Some(&action), ExpectedPayload::None);
        assert_eq!(outcomes[0].rule, Rule::InvalidAsyncVoid);
        assert_eq!(outcomes[0].severity, Severity::Warning);
    }

    #[test]
    fn token_needs_async_machine() {
        let outcomes = token_parameter(&TokenParameter {
            method: "cb",
            role: CallbackRole::Action,
            token: TokenParam::Owned,
            machine_is_async: false,
        });
        assert_eq!(outcomes.len(), 1);
        assert!(
            token_parameter(&TokenParameter {
                method: "cb",
                role: CallbackRole::Action,
                token: TokenParam::Owned,
                machine_is_async: true,
            })
            .is_empty()
        );
    }
}
