//! Operations command - List the intercepted operations.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use sqlspy_core::{Category, Operation};

use crate::OutputFormat;

/// Arguments for the operations command.
#[derive(Args)]
pub struct OperationsArgs {
    /// Only list operations that execute SQL
    #[arg(long)]
    pub execute_only: bool,
}

#[derive(Debug, Serialize)]
struct OperationDisplay {
    name: &'static str,
    category: Category,
    reported: bool,
}

impl From<Operation> for OperationDisplay {
    fn from(op: Operation) -> Self {
        Self {
            name: op.name(),
            category: op.category(),
            reported: op.is_execute(),
        }
    }
}

/// Execute the operations command.
pub fn execute(args: OperationsArgs, format: OutputFormat) -> Result<()> {
    let operations: Vec<OperationDisplay> = Operation::ALL
        .into_iter()
        .filter(|op| !args.execute_only || op.is_execute())
        .map(OperationDisplay::from)
        .collect();

    match format {
        OutputFormat::Human => {
            println!("Intercepted operations ({}):", operations.len());
            for op in &operations {
                let marker = if op.reported { " (reported)" } else { "" };
                println!("  {:<22} {}{}", op.name, op.category, marker);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&operations)?);
        }
        OutputFormat::JsonCompact => {
            println!("{}", serde_json::to_string(&operations)?);
        }
    }

    Ok(())
}
