//! Run command - Execute a SQL script through an instrumented mock connection.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Serialize;

use sqlspy::prelude::*;
use sqlspy_mock::{MockConnection, MockScript};
use sqlspy_observe::SqlMetricsSnapshot;

use crate::OutputFormat;

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Path to the SQL script (statements separated by `;`)
    #[arg(required = true)]
    pub script: PathBuf,

    /// Queue all statements and execute them as one batch
    #[arg(long, conflicts_with = "prepared")]
    pub batch: bool,

    /// Prepare each statement before executing it
    #[arg(long)]
    pub prepared: bool,

    /// Fail statements containing this text (repeatable)
    #[arg(long = "fail-on")]
    pub fail_on: Vec<String>,

    /// Simulated driver latency per execution in milliseconds
    #[arg(long, default_value = "0")]
    pub latency_ms: u64,

    /// Show statement metrics
    #[arg(long)]
    pub metrics: bool,

    /// Disable ANSI colours in console output
    #[arg(long)]
    pub no_color: bool,
}

/// Run result.
#[derive(Debug, Serialize)]
struct RunReport {
    script: String,
    statements: usize,
    executions: usize,
    failed: usize,
    events: Vec<SqlEventRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<SqlMetricsSnapshot>,
}

/// Split a script into statements, dropping `--` comment lines.
fn split_statements(text: &str) -> Vec<String> {
    let without_comments: String = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    without_comments
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn mock_script(args: &RunArgs) -> MockScript {
    args.fail_on.iter().fold(
        MockScript::new().with_latency(Duration::from_millis(args.latency_ms)),
        |script, pattern| script.fail_on(pattern.clone(), format!("matched --fail-on '{pattern}'")),
    )
}

fn run_each(
    conn: &mut SpyConnection<MockConnection>,
    statements: &[String],
    prepared: bool,
) -> Result<()> {
    for sql in statements {
        let result = if prepared {
            conn.prepare_statement(sql)
                .context("Failed to prepare statement")?
                .execute_prepared()
        } else {
            conn.create_statement()
                .context("Failed to create statement")?
                .execute(sql)
        };
        if let Err(e) = result {
            tracing::debug!(sql = sql.as_str(), error = %e, "Statement failed");
        }
    }
    Ok(())
}

fn run_batch(conn: &mut SpyConnection<MockConnection>, statements: &[String]) -> Result<()> {
    let mut stmt = conn
        .create_statement()
        .context("Failed to create statement")?;
    for sql in statements {
        stmt.add_batch(sql).context("Failed to queue statement")?;
    }
    if let Err(e) = stmt.execute_batch() {
        tracing::debug!(entries = statements.len(), error = %e, "Batch failed");
    }
    Ok(())
}

/// Execute the run command.
pub fn execute(
    args: RunArgs,
    config: SpyConfig,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let text = std::fs::read_to_string(&args.script)
        .with_context(|| format!("Failed to read script '{}'", args.script.display()))?;
    let statements = split_statements(&text);
    if statements.is_empty() {
        bail!("No statements found in '{}'", args.script.display());
    }

    // Console output only makes sense for humans
    let human = matches!(format, OutputFormat::Human);
    let color = config.console.color && !args.no_color;
    let metrics_enabled = config.metrics.enabled || args.metrics;
    let config = config
        .with_console(human && !quiet)
        .with_color(color)
        .with_metrics(metrics_enabled);

    let collector = Arc::new(CollectingListener::new(statements.len()));
    let spy = SqlSpy::builder()
        .with_config(config)
        .with_listener(collector.clone())
        .build()
        .context("Failed to configure spy")?;

    if !quiet {
        tracing::info!(
            script = %args.script.display(),
            statements = statements.len(),
            batch = args.batch,
            prepared = args.prepared,
            "Running script"
        );
    }

    let mut conn = spy.wrap_connection(MockConnection::new(mock_script(&args)));
    if args.batch {
        run_batch(&mut conn, &statements)?;
    } else {
        run_each(&mut conn, &statements, args.prepared)?;
    }

    let events = collector.drain();
    let failed = events.iter().filter(|e| !e.success).count();
    let report = RunReport {
        script: args.script.display().to_string(),
        statements: statements.len(),
        executions: events.len(),
        failed,
        events,
        metrics: spy.metrics().map(|m| m.snapshot()),
    };

    // Output results
    match format {
        OutputFormat::Human => {
            if !quiet {
                println!(
                    "\n{} statements, {} executions, {} failed",
                    report.statements, report.executions, report.failed
                );
            }
            if let Some(metrics) = &report.metrics {
                print_metrics(metrics);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::JsonCompact => {
            println!("{}", serde_json::to_string(&report)?);
        }
    }

    if failed > 0 {
        bail!("{} of {} executions failed", failed, report.executions);
    }
    Ok(())
}

fn print_metrics(metrics: &SqlMetricsSnapshot) {
    println!("\nMetrics:");
    println!("  Statements: {}", metrics.total_statements);
    println!("  Failed: {}", metrics.failed_statements);
    println!("  Batched rows: {}", metrics.batched_rows);
    println!("  Slow: {}", metrics.slow_statements);
    if metrics.untracked_statements > 0 {
        println!("  Untracked SQL texts: {}", metrics.untracked_statements);
    }
    println!(
        "  Elapsed: total {} ms, min {} ms, max {} ms, avg {:.2} ms",
        metrics.total_elapsed_ms,
        metrics.min_elapsed_ms,
        metrics.max_elapsed_ms,
        metrics.avg_elapsed_ms
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_statements() {
        let script = "
            -- seed data
            INSERT INTO t VALUES (1);
            INSERT INTO t VALUES (2);;

            SELECT * FROM t
        ";

        assert_eq!(
            split_statements(script),
            vec![
                "INSERT INTO t VALUES (1)",
                "INSERT INTO t VALUES (2)",
                "SELECT * FROM t",
            ]
        );
    }

    #[test]
    fn test_split_empty_script() {
        assert!(split_statements("-- nothing here\n  \n;").is_empty());
    }
}
