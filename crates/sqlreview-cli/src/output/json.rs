//! JSON output formatting.

use super::FileReport;

/// Format the reports as JSON.
///
/// If `compact` is true, outputs minified JSON without whitespace.
pub fn format_json(reports: &[FileReport], compact: bool) -> serde_json::Result<String> {
    if compact {
        serde_json::to_string(reports)
    } else {
        serde_json::to_string_pretty(reports)
    }
}
