//! Machine-wide sync/async consistency rules.

use super::{Outcome, Rule};

/// An async callback rejected because the machine was already synchronous.
pub struct ModeConflict<'a> {
    pub method: &'a str,
    /// The callback that fixed the synchronous mode.
    pub established_by: &'a str,
    /// No conflict was reported for this machine before.
    pub first_conflict: bool,
}

pub fn mode_conflict(cx: &ModeConflict<'_>) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(2);
    if cx.first_conflict {
        outcomes.push(Outcome::new(
            Rule::MixedSyncAsyncCallbacks,
            format!(
                "State machine mixes synchronous and asynchronous callbacks: '{}' is synchronous but '{}' is async. Make every callback async or none of them.",
                cx.established_by, cx.method
            ),
        ));
    }
    outcomes.push(
        Outcome::new(
            Rule::AsyncCallbackInSyncMachine,
            format!(
                "Async method '{}' cannot be used: the machine was fixed as synchronous by '{}'.",
                cx.method, cx.established_by
            ),
        )
        .about(cx.method),
    );
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_conflict_reports_mixed_mode_once() {
        let first = mode_conflict(&ModeConflict {
            method: "load",
            established_by: "check",
            first_conflict: true,
        });
        let rules: Vec<_> = first.iter().map(|o| o.rule).collect();
        assert_eq!(
            rules,
            vec![Rule::MixedSyncAsyncCallbacks, Rule::AsyncCallbackInSyncMachine]
        );
        assert!(first.iter().all(Outcome::is_error));

        let later = mode_conflict(&ModeConflict {
            method: "save",
            established_by: "check",
            first_conflict: false,
        });
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].rule, Rule::AsyncCallbackInSyncMachine);
    }
}
