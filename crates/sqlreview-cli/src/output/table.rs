//! Bordered table output.

use super::FileReport;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct Row<'a> {
    #[tabled(rename = "File")]
    file: &'a str,
    #[tabled(rename = "Line")]
    line: String,
    #[tabled(rename = "Col")]
    column: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Code")]
    code: i32,
    #[tabled(rename = "Rule")]
    title: &'a str,
    #[tabled(rename = "Message")]
    content: &'a str,
}

/// Format every finding as one table row. Returns a short note when there is
/// nothing to report.
pub fn format_table(reports: &[FileReport]) -> String {
    let rows: Vec<Row<'_>> = reports
        .iter()
        .flat_map(|report| {
            report.findings().map(move |advice| Row {
                file: &report.name,
                line: cell(advice.line),
                column: cell(advice.column),
                status: advice.status.to_string(),
                code: advice.code,
                title: &advice.title,
                content: &advice.content,
            })
        })
        .collect();

    if rows.is_empty() {
        return "No findings.\n".to_string();
    }

    let mut table = Table::new(rows);
    table.with(Style::sharp());
    format!("{table}\n")
}

fn cell(value: Option<usize>) -> String {
    value.map_or_else(String::new, |value| value.to_string())
}
