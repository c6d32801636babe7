//! Rules about the machine declaration itself and its generation variant.

use super::{Outcome, Rule};
use crate::model::{Features, GenerationVariant, PayloadKind};

/// What is wrong with the primary declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationProblem {
    MissingAttribute,
    MissingArgument(&'static str),
    DuplicateAttribute,
    NotExtensible,
}

pub struct PrimaryDeclaration<'a> {
    pub machine: &'a str,
    pub problem: Option<DeclarationProblem>,
}

pub fn primary_declaration(cx: &PrimaryDeclaration<'_>) -> Vec<Outcome> {
    let Some(problem) = cx.problem else {
        return Vec::new();
    };
    let message = match problem {
        DeclarationProblem::MissingAttribute => format!(
            "Struct '{}' declares transitions or states but has no #[state_machine(state = .., trigger = ..)] attribute; no code is generated for it.",
            cx.machine
        ),
        DeclarationProblem::MissingArgument(argument) => format!(
            "#[state_machine] on '{}' is missing the '{argument}' argument; no code is generated for it.",
            cx.machine
        ),
        DeclarationProblem::DuplicateAttribute => format!(
            "Struct '{}' has more than one #[state_machine] attribute; only the first is used.",
            cx.machine
        ),
        DeclarationProblem::NotExtensible => format!(
            "State machine '{}' must be a struct with named fields or a unit struct so the generator can add its fields; no code is generated for it.",
            cx.machine
        ),
    };
    vec![Outcome::new(Rule::MissingStateMachineAttribute, message)]
}

/// The types named as state and trigger, and whether each is an enum of the module.
pub struct EnumTypes<'a> {
    pub state: &'a str,
    pub trigger: &'a str,
    pub state_is_enum: bool,
    pub trigger_is_enum: bool,
}

pub fn enum_types(cx: &EnumTypes<'_>) -> Vec<Outcome> {
    if cx.state_is_enum && cx.trigger_is_enum {
        return Vec::new();
    }
    vec![Outcome::new(
        Rule::InvalidTypesInAttribute,
        format!(
            "State and Trigger types must be enums declared in the #[fsm] module. '{}' or '{}' is not an enum.",
            cx.state, cx.trigger
        ),
    )]
}

/// A payload type declared again for a scope that already has one.
pub struct PayloadRedeclaration<'a> {
    /// `None` for the machine-wide default.
    pub trigger: Option<&'a str>,
    pub existing: &'a str,
    pub declared: &'a str,
    /// Declared on a method rather than on the struct.
    pub on_method: Option<&'a str>,
}

pub fn payload_redeclaration(cx: &PayloadRedeclaration<'_>) -> Vec<Outcome> {
    if cx.existing == cx.declared {
        return Vec::new();
    }
    let scope = match cx.trigger {
        Some(trigger) => format!("trigger '{trigger}'"),
        None => "the machine".to_string(),
    };
    let outcome = match cx.on_method {
        Some(method) => Outcome::new(
            Rule::InvalidMethodSignature,
            format!(
                "Method '{method}' declares payload type '{}' for {scope}, which already uses '{}'.",
                cx.declared, cx.existing
            ),
        ),
        None => Outcome::new(
            Rule::ConflictingPayloadConfiguration,
            format!(
                "Payload type '{}' conflicts with '{}' already declared for {scope}.",
                cx.declared, cx.existing
            ),
        ),
    };
    vec![outcome]
}

/// A forced variant and the features the declarations actually use.
pub struct ForcedVariant {
    pub forced: GenerationVariant,
    pub features: Features,
}

pub fn forced_variant(cx: &ForcedVariant) -> Vec<Outcome> {
    let forced = cx.forced;
    let features = &cx.features;
    let has_payload = features.payload != PayloadKind::None;

    let mut outcomes = Vec::new();
    let conflict = |feature: &str, fix: &str| {
        Outcome::new(
            Rule::InvalidForcedVariant,
            format!("Forced '{forced}' variant conflicts with {feature}. {fix}"),
        )
    };

    match forced {
        GenerationVariant::Pure => {
            if has_payload {
                outcomes.push(conflict(
                    "payload types",
                    "Remove the payload declarations or use WithPayload, WithMultiPayload or Full.",
                ));
            }
            if features.extensions {
                outcomes.push(conflict(
                    "extensions",
                    "Remove `extensions = true` or use WithExtensions or Full.",
                ));
            }
            if features.entry_exit {
                outcomes.push(conflict(
                    "on_entry/on_exit callbacks",
                    "Remove on_entry/on_exit or use Basic, WithExtensions or Full.",
                ));
            }
        }
        GenerationVariant::Basic => {
            if has_payload {
                outcomes.push(conflict(
                    "payload types",
                    "Remove the payload declarations or use WithPayload, WithMultiPayload or Full.",
                ));
            }
            if features.extensions {
                outcomes.push(conflict(
                    "extensions",
                    "Remove `extensions = true` or use WithExtensions or Full.",
                ));
            }
        }
        GenerationVariant::WithExtensions => {
            if has_payload {
                outcomes.push(conflict(
                    "payload types",
                    "Remove the payload declarations or use Full.",
                ));
            }
        }
        GenerationVariant::WithPayload => {
            if !has_payload {
                outcomes.push(missing_payload(forced));
            }
            if features.payload == PayloadKind::Multi {
                outcomes.push(Outcome::new(
                    Rule::ConflictingPayloadConfiguration,
                    format!(
                        "Forced 'WithPayload' variant expects a single payload type but found {} trigger-specific types. Use WithMultiPayload or remove the trigger-specific declarations.",
                        features.trigger_payloads
                    ),
                ));
            }
            if features.extensions {
                outcomes.push(conflict("extensions", "Use Full instead."));
            }
        }
        GenerationVariant::WithMultiPayload => {
            if !has_payload {
                outcomes.push(missing_payload(forced));
            }
            if features.extensions {
                outcomes.push(conflict("extensions", "Use Full instead."));
            }
        }
        GenerationVariant::Full => {
            if !has_payload {
                outcomes.push(missing_payload(forced));
            }
            if !features.extensions {
                outcomes.push(Outcome::new(
                    Rule::InvalidForcedVariant,
                    "Forced 'Full' variant requires extensions. Set `extensions = true` or use WithPayload or WithMultiPayload.",
                ));
            }
        }
    }
    outcomes
}

fn missing_payload(forced: GenerationVariant) -> Outcome {
    Outcome::new(
        Rule::MissingPayloadType,
        format!(
            "Forced '{forced}' variant requires a payload type. Add `payload = ..` to #[state_machine] or a #[payload_type(..)] declaration."
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(payload: PayloadKind, entry_exit: bool, extensions: bool) -> Features {
        Features {
            payload,
            trigger_payloads: if payload == PayloadKind::Multi { 2 } else { 0 },
            entry_exit,
            extensions,
        }
    }

    fn forced(variant: GenerationVariant, features: Features) -> Vec<Outcome> {
        forced_variant(&ForcedVariant {
            forced: variant,
            features,
        })
    }

    #[test]
    fn pure_with_entry_callback_is_one_error() {
        let outcomes = forced(
            GenerationVariant::Pure,
            features(PayloadKind::None, true, false),
        );
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].rule, Rule::InvalidForcedVariant);
        assert!(outcomes[0].message.contains("on_entry/on_exit"));
    }

    #[test]
    fn payload_under_payload_free_variants() {
        for variant in [
            GenerationVariant::Pure,
            GenerationVariant::Basic,
            GenerationVariant::WithExtensions,
        ] {
            let outcomes = forced(variant, features(PayloadKind::Single, false, false));
            assert_eq!(outcomes.len(), 1, "{variant}");
            assert_eq!(outcomes[0].rule, Rule::InvalidForcedVariant);
        }
    }

    #[test]
    fn payload_variants_need_a_payload() {
        for variant in [
            GenerationVariant::WithPayload,
            GenerationVariant::WithMultiPayload,
            GenerationVariant::Full,
        ] {
            let outcomes = forced(variant, features(PayloadKind::None, false, false));
            assert_eq!(outcomes[0].rule, Rule::MissingPayloadType, "{variant}");
        }
    }

    #[test]
    fn with_payload_rejects_trigger_specific_types_and_extensions() {
        let outcomes = forced(
            GenerationVariant::WithPayload,
            features(PayloadKind::Multi, false, true),
        );
        let rules: Vec<_> = outcomes.iter().map(|o| o.rule).collect();
        assert_eq!(
            rules,
            vec![Rule::ConflictingPayloadConfiguration, Rule::InvalidForcedVariant]
        );
    }

    #[test]
    fn full_without_extensions_is_rejected() {
        let outcomes = forced(
            GenerationVariant::Full,
            features(PayloadKind::Single, false, false),
        );
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].rule, Rule::InvalidForcedVariant);
        assert!(outcomes[0].is_error());
        assert!(outcomes[0].message.contains("requires extensions"));
    }

    #[test]
    fn consistent_forcing_is_silent() {
        assert!(forced(GenerationVariant::Full, features(PayloadKind::Single, true, true)).is_empty());
        assert!(forced(GenerationVariant::Basic, features(PayloadKind::None, true, false)).is_empty());
        assert!(forced(GenerationVariant::Pure, features(PayloadKind::None, false, false)).is_empty());
    }

    #[test]
    fn non_enum_types() {
        let outcomes = enum_types(&EnumTypes {
            state: "State",
            trigger: "Command",
            state_is_enum: true,
            trigger_is_enum: false,
        });
        assert_eq!(outcomes[0].rule, Rule::InvalidTypesInAttribute);
        assert!(outcomes[0].is_error());
    }

    #[test]
    fn method_level_payload_conflict_is_a_signature_error() {
        let outcomes = payload_redeclaration(&PayloadRedeclaration {
            trigger: Some("Pay"),
            existing: "Payment",
            declared: "Refund",
            on_method: Some("charge"),
        });
        assert_eq!(outcomes[0].rule, Rule::InvalidMethodSignature);

        let outcomes = payload_redeclaration(&PayloadRedeclaration {
            trigger: None,
            existing: "Payment",
            declared: "Refund",
            on_method: None,
        });
        assert_eq!(outcomes[0].rule, Rule::ConflictingPayloadConfiguration);
    }

    #[test]
    fn missing_attribute_is_a_warning() {
        let outcomes = primary_declaration(&PrimaryDeclaration {
            machine: "Door",
            problem: Some(DeclarationProblem::MissingArgument("trigger")),
        });
        assert_eq!(outcomes[0].rule, Rule::MissingStateMachineAttribute);
        assert!(!outcomes[0].is_error());
    }
}
