//! sqlreview CLI - multi-dialect SQL review

use sqlreview_cli::cli::{Args, CheckArgs, Command, LimitArgs, OutputFormat};
use sqlreview_cli::input::{self, SourceFile};
use sqlreview_cli::logging;
use sqlreview_cli::output::{format_json, format_table, format_text, FileReport};

use anyhow::{Context, Result};
use clap::Parser;
use is_terminal::IsTerminal;
use sqlreview_core::{check, limit_query, Dialect, ReviewContext};
use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, info};

/// Error advice found.
const EXIT_FAILURE: u8 = 1;
/// Unreadable input or invalid configuration.
const EXIT_CONFIG_ERROR: u8 = 66;

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    let result = match args.command {
        Command::Check(check_args) => run_check(check_args),
        Command::Limit(limit_args) => run_limit(limit_args).map(|()| false),
    };

    match result {
        Ok(true) => ExitCode::from(EXIT_FAILURE),
        Ok(false) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("sqlreview: error: {e:#}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

/// Reviews every source; returns whether any error advice was produced.
fn run_check(args: CheckArgs) -> Result<bool> {
    let started_at = Instant::now();

    let rules = input::load_rules(args.rules.as_deref(), args.overrides.as_deref())?;
    let schema = args
        .schema
        .as_deref()
        .map(input::load_schema)
        .transpose()?;
    let sources = input::read_input(&args.files)?;
    let dialect: Dialect = args.dialect.into();

    let context = ReviewContext {
        current_database: args.database.clone(),
        current_schema: args.current_schema.clone(),
        schema,
        change_type: args.change_type.into(),
        ..ReviewContext::default()
    };

    let mut reports = Vec::with_capacity(sources.len());
    for SourceFile { name, content } in sources {
        debug!(file = %name, %dialect, "reviewing");
        let advice = check(&content, dialect, &rules, &context)
            .with_context(|| format!("Failed to review {name}"))?;
        reports.push(FileReport { name, advice });
    }
    info!(
        files = reports.len(),
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        "review finished"
    );

    let rendered = match args.format {
        OutputFormat::Text => {
            let colored = io::stdout().is_terminal();
            format_text(&reports, colored, started_at.elapsed())
        }
        OutputFormat::Json => {
            let mut json =
                format_json(&reports, args.compact).context("Failed to serialize advice")?;
            json.push('\n');
            json
        }
        OutputFormat::Table => format_table(&reports),
    };
    write_stdout(&rendered)?;

    Ok(reports.iter().any(FileReport::has_errors))
}

fn run_limit(args: LimitArgs) -> Result<()> {
    let source = input::read_single(args.file.as_deref())?;
    let rewritten = limit_query(
        args.dialect.into(),
        &source.content,
        args.max_rows,
        args.db_version.as_deref(),
    );
    write_stdout(&format!("{rewritten}\n"))
}

fn write_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .context("Failed to write output")?;
    stdout.flush().context("Failed to write output")
}
