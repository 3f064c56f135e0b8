//! Fuzz target for the row-limit rewriter.
//!
//! Every input must come back rewritten, with the precise path falling back
//! to the wrapper instead of panicking.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sqlreview_core::{limit_query, Dialect};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    sql: String,
    dialect_idx: u8,
    max_rows: u64,
    modern: bool,
}

fuzz_target!(|input: FuzzInput| {
    let dialect = Dialect::ALL[usize::from(input.dialect_idx) % Dialect::ALL.len()];
    let version = if input.modern { "19.0" } else { "11.2" };
    let _rewritten = limit_query(dialect, &input.sql, input.max_rows, Some(version));
});
