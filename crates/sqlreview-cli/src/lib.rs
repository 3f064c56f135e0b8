//! sqlreview CLI library.
//!
//! This module exposes internal types for testing purposes.
//! The main entry point is the `sqlreview` binary.

pub mod cli;
pub mod input;
pub mod logging;
pub mod output;

pub use cli::Args;
