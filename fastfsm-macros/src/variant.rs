//! Generation variant selection.

use crate::model::{Features, GenerationVariant, PayloadKind, StateMachineModel};
use crate::rules::{self, Outcome};

/// Picks the variant for a finished model.
///
/// A forced variant is checked against the observed features; any mismatch
/// is returned as outcomes and the machine must not be emitted.
pub fn select(model: &StateMachineModel) -> Result<GenerationVariant, Vec<Outcome>> {
    let features = model.features();
    let Some(forced) = model.config.forced else {
        return Ok(auto_select(&features));
    };

    let outcomes = rules::config::forced_variant(&rules::config::ForcedVariant { forced, features });
    if outcomes.iter().any(Outcome::is_error) {
        return Err(outcomes);
    }
    Ok(forced)
}

pub fn auto_select(features: &Features) -> GenerationVariant {
    match (features.payload, features.extensions, features.entry_exit) {
        (PayloadKind::Single | PayloadKind::Multi, true, _) => GenerationVariant::Full,
        (PayloadKind::Multi, false, _) => GenerationVariant::WithMultiPayload,
        (PayloadKind::Single, false, _) => GenerationVariant::WithPayload,
        (PayloadKind::None, true, _) => GenerationVariant::WithExtensions,
        (PayloadKind::None, false, true) => GenerationVariant::Basic,
        (PayloadKind::None, false, false) => GenerationVariant::Pure,
    }
}

/// Payload shape the emitted code uses for a chosen variant.
pub fn emitted_payload(variant: GenerationVariant, model: &StateMachineModel) -> PayloadKind {
    match variant {
        GenerationVariant::WithMultiPayload => PayloadKind::Multi,
        GenerationVariant::WithPayload => PayloadKind::Single,
        GenerationVariant::Full => match model.payload_kind() {
            PayloadKind::Multi => PayloadKind::Multi,
            _ => PayloadKind::Single,
        },
        GenerationVariant::Pure | GenerationVariant::Basic | GenerationVariant::WithExtensions => {
            PayloadKind::None
        }
    }
}
