//! Located diagnostics and how they surface through rustc.

use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote_spanned};

use crate::rules::{Outcome, Rule, Severity};

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub rule: Rule,
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn text(&self) -> String {
        format!("{}: {}", self.rule.id(), self.message)
    }

    /// Errors become `compile_error!`. Warnings become a use of a
    /// `#[deprecated]` marker so rustc prints them at the right location.
    /// Info diagnostics produce nothing.
    pub fn to_tokens(&self) -> TokenStream {
        let text = self.text();
        match self.severity {
            Severity::Error => syn::Error::new(self.span, text).to_compile_error(),
            Severity::Warning => {
                let marker = format_ident!("{}", self.rule.id(), span = self.span);
                quote_spanned! {self.span=>
                    const _: () = {
                        #[deprecated(note = #text)]
                        #[allow(non_camel_case_types, dead_code)]
                        struct #marker;
                        let _ = #marker;
                    };
                }
            }
            Severity::Info => TokenStream::new(),
        }
    }
}

/// Diagnostics of one machine, in the order they were found.
#[derive(Debug, Default)]
pub struct Report {
    diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub fn push(&mut self, outcome: Outcome, span: Span) {
        self.diagnostics.push(Diagnostic {
            rule: outcome.rule,
            severity: outcome.severity,
            message: outcome.message,
            span,
        });
    }

    pub fn extend(&mut self, outcomes: Vec<Outcome>, span: Span) {
        for outcome in outcomes {
            self.push(outcome, span);
        }
    }

    /// Adds outcomes, locating each by its subject when `locate` knows it.
    pub fn extend_located(
        &mut self,
        outcomes: Vec<Outcome>,
        fallback: Span,
        locate: impl Fn(&str) -> Option<Span>,
    ) {
        for outcome in outcomes {
            let span = outcome
                .subject
                .as_deref()
                .and_then(&locate)
                .unwrap_or(fallback);
            self.push(outcome, span);
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diagnostic| diagnostic.severity == Severity::Error)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn count(&self, rule: Rule) -> usize {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.rule == rule)
            .count()
    }

    pub fn to_tokens(&self) -> TokenStream {
        self.diagnostics.iter().map(Diagnostic::to_tokens).collect()
    }
}
