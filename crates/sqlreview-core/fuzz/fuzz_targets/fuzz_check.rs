//! Fuzz target for the review orchestrator.
//!
//! `check()` must hand back advice, never panic, for arbitrary input.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sqlreview_core::advisor::RuleTemplate;
use sqlreview_core::{check, Dialect, ReviewContext};
use std::sync::OnceLock;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    sql: String,
    dialect_idx: u8,
}

impl FuzzInput {
    fn dialect(&self) -> Dialect {
        Dialect::ALL[usize::from(self.dialect_idx) % Dialect::ALL.len()]
    }
}

fn template() -> &'static RuleTemplate {
    static TEMPLATE: OnceLock<RuleTemplate> = OnceLock::new();
    TEMPLATE.get_or_init(|| RuleTemplate::builtin().expect("built-in template"))
}

fuzz_target!(|input: FuzzInput| {
    let advice = check(
        &input.sql,
        input.dialect(),
        &template().rules,
        &ReviewContext::default(),
    )
    .expect("built-in rules always build");
    assert!(!advice.is_empty());
});
