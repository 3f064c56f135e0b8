//! Output formatting modules.

pub mod json;
pub mod table;
pub mod text;

pub use json::format_json;
pub use table::format_table;
pub use text::format_text;

use sqlreview_core::{Advice, AdviceStatus};

/// Advice produced for one input source.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FileReport {
    pub name: String,
    pub advice: Vec<Advice>,
}

impl FileReport {
    /// Findings only, without the OK placeholder.
    pub fn findings(&self) -> impl Iterator<Item = &Advice> {
        self.advice
            .iter()
            .filter(|advice| advice.status != AdviceStatus::Ok)
    }

    pub fn has_errors(&self) -> bool {
        self.advice
            .iter()
            .any(|advice| advice.status == AdviceStatus::Error)
    }
}
