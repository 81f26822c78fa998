use std::process::ExitCode;

use clap::Parser;
use colsync::{
    ChangeKind, Connection, DatabaseConfig, Event, OnError, Progress, ReconcileReport, SchemaDiff,
};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

mod args;

use args::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before parsing so the COLSYNC_* fallbacks can see it
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let default_directive = if cli.verbose {
        "colsync=debug"
    } else {
        "colsync=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> colsync::Result<ExitCode> {
    match cli.command {
        Commands::Diff { databases, filter } => {
            let reference = open(databases.reference(), "reference").await?;
            let target = open(databases.target(), "target").await?;

            let diff = filter.reconciler().plan(&reference, &target).await?;
            print_diff(&diff, target.dialect());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Sync {
            databases,
            filter,
            abort_on_error,
            no_validate,
        } => {
            let reference = open(databases.reference(), "reference").await?;
            let target = open(databases.target(), "target").await?;

            let on_error = if abort_on_error {
                OnError::Abort
            } else {
                OnError::Continue
            };
            let reconciler = filter
                .reconciler()
                .on_error(on_error)
                .validate_fragments(!no_validate);

            let report = reconciler
                .reconcile(&reference, &target, &mut PrintProgress)
                .await?;
            print_report(&report);

            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

async fn open(config: DatabaseConfig, role: &str) -> colsync::Result<impl Connection> {
    println!("{} {}: {}", "Connecting".dimmed(), role, config);
    tracing::debug!(role, database = ?config, "connecting");
    config.connect().await
}

fn print_diff(diff: &SchemaDiff, dialect: colsync::Dialect) {
    if diff.is_empty() {
        println!("{}", "Target columns match the reference.".green());
        return;
    }

    for table_diff in &diff.table_diffs {
        if table_diff.missing_in_target {
            println!(
                "{} {}",
                table_diff.table.bold(),
                "(missing on target)".yellow()
            );
        } else {
            println!("{}", table_diff.table.bold());
        }
        for change in &table_diff.changes {
            let line = change.to_string();
            match change.kind() {
                ChangeKind::Add => println!("  {}", line.green()),
                ChangeKind::Modify => println!("  {}", line.yellow()),
                ChangeKind::Drop => println!("  {}", line.red()),
            }
        }
    }

    println!();
    println!("{}", "SQL:".bold());
    print!("{}", diff.to_sql(dialect));
    println!();
    println!(
        "{} change(s) in {} table(s).",
        diff.change_count(),
        diff.table_diffs.len()
    );
}

fn print_report(report: &ReconcileReport) {
    println!();
    let summary = format!(
        "Processed {} table(s): {} change(s) applied, {} failure(s).",
        report.tables_processed,
        report.applied.len(),
        report.failures.len()
    );
    if report.is_success() {
        println!("{}", summary.green().bold());
    } else {
        println!("{}", summary.red().bold());
        for failure in &report.failures {
            println!("  {} {}", "failed:".red(), failure);
        }
    }
    if report.aborted {
        println!("{}", "Aborted after the first failure.".red());
    }
}

/// Print each event as it happens.
struct PrintProgress;

impl Progress for PrintProgress {
    fn on_event(&mut self, event: &Event) {
        match event {
            Event::TableStarted { table } => println!("{}", table.bold()),
            Event::ColumnAdded { column, .. } => println!("  {} {}", "+".green(), column),
            Event::ColumnModified { column, .. } => println!("  {} {}", "~".yellow(), column),
            Event::ColumnDropped { column, .. } => println!("  {} {}", "-".red(), column),
            Event::OperationFailed {
                column,
                kind,
                error,
                ..
            } => println!(
                "  {} {} {}: {}",
                "!".red().bold(),
                kind,
                column,
                error.red()
            ),
            Event::TableFailed { error, .. } => {
                println!("  {} skipped: {}", "!".red().bold(), error.red())
            }
            Event::TableFinished { .. } => {}
        }
    }
}
