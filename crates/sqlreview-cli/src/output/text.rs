//! Line-per-advice text output.

use super::FileReport;
use owo_colors::OwoColorize;
use sqlreview_core::{Advice, AdviceStatus};
use std::fmt::Write;
use std::time::Duration;

/// Format reports as `L:<line> | P:<col> | <code> | <title>: <content>`
/// lines grouped per file, followed by a summary.
pub fn format_text(reports: &[FileReport], colored: bool, elapsed: Duration) -> String {
    let mut out = String::new();

    let mut passed = 0usize;
    let mut failed = 0usize;
    let mut errors = 0usize;
    let mut warnings = 0usize;

    for report in reports {
        let mut findings: Vec<&Advice> = report.findings().collect();
        if findings.is_empty() {
            passed += 1;
        } else {
            failed += 1;
        }
        findings.sort_by_key(|advice| (advice.line, advice.column));

        let status = match (findings.is_empty(), colored) {
            (true, true) => "PASS".green().to_string(),
            (true, false) => "PASS".to_string(),
            (false, true) => "FAIL".red().to_string(),
            (false, false) => "FAIL".to_string(),
        };
        let _ = writeln!(out, "== [{}] {}", report.name, status);

        for advice in findings {
            match advice.status {
                AdviceStatus::Error => errors += 1,
                AdviceStatus::Warning => warnings += 1,
                AdviceStatus::Ok => {}
            }
            let code = advice.code.to_string();
            let code = match (advice.status, colored) {
                (AdviceStatus::Error, true) => code.red().to_string(),
                (AdviceStatus::Warning, true) => code.yellow().to_string(),
                _ => code,
            };
            let _ = writeln!(
                out,
                "L:{:>4} | P:{:>4} | {} | {}: {}",
                position(advice.line),
                position(advice.column),
                code,
                advice.title,
                advice.content
            );
        }
    }

    let _ = writeln!(out, "All Finished in {}!", format_elapsed(elapsed));
    let _ = writeln!(
        out,
        "  {} passed. {} failed. {} errors, {} warnings found.",
        count(passed, colored, Tone::Good),
        count(failed, colored, Tone::Bad),
        errors,
        warnings
    );

    out
}

fn position(value: Option<usize>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}

enum Tone {
    Good,
    Bad,
}

fn count(value: usize, colored: bool, tone: Tone) -> String {
    if !colored || value == 0 {
        return value.to_string();
    }
    match tone {
        Tone::Good => value.green().to_string(),
        Tone::Bad => value.red().to_string(),
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs >= 1.0 {
        format!("{secs:.2}s")
    } else if elapsed.as_millis() >= 1 {
        format!("{}ms", elapsed.as_millis())
    } else {
        format!("{}µs", elapsed.as_micros())
    }
}
