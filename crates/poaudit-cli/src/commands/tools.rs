//! Tools command - run ledger tools against a saved ledger snapshot.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;
use serde_json::Value;

use poaudit_core::tools::{APPLY_CORRECTION, tool_definitions};
use poaudit_core::{Ledger, Session, ToolCall, ToolDispatcher};

/// Arguments for the tools command.
#[derive(Args)]
pub struct ToolsArgs {
    #[command(subcommand)]
    command: ToolsCommand,
}

#[derive(Subcommand)]
enum ToolsCommand {
    /// List available tools
    List {
        /// Print full input schemas as JSON
        #[arg(long)]
        schema: bool,
    },

    /// Call one tool and print its JSON result
    Call(CallArgs),
}

#[derive(Args)]
struct CallArgs {
    /// Ledger snapshot written by `batch --format json`
    #[arg(short, long)]
    ledger: PathBuf,

    /// Tool name
    name: String,

    /// Tool arguments as a JSON object
    #[arg(short, long, default_value = "{}")]
    args: String,

    /// Write the ledger back after a successful correction
    #[arg(long)]
    save: bool,
}

pub async fn run(args: ToolsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    match args.command {
        ToolsCommand::List { schema } => list_tools(schema),
        ToolsCommand::Call(call_args) => call_tool(call_args, config_path),
    }
}

fn list_tools(schema: bool) -> anyhow::Result<()> {
    let definitions = tool_definitions();

    if schema {
        println!("{}", serde_json::to_string_pretty(&definitions)?);
        return Ok(());
    }

    for definition in &definitions {
        println!(
            "{:<24} {}",
            style(definition["name"].as_str().unwrap_or_default()).cyan(),
            definition["description"].as_str().unwrap_or_default()
        );
    }
    Ok(())
}

fn call_tool(args: CallArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let ledger = Ledger::load(&args.ledger)?;
    let session = Session::with_ledger(config, ledger)?;

    let arguments: Value = serde_json::from_str(&args.args)
        .map_err(|e| anyhow::anyhow!("--args is not valid JSON: {}", e))?;
    let call = ToolCall::new(args.name, arguments);

    let result = ToolDispatcher::new(&session).dispatch(&call);
    let value = match result {
        Ok(value) => value,
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&e.to_json())?);
            anyhow::bail!("{}", e);
        }
    };
    println!("{}", serde_json::to_string_pretty(&value)?);

    if call.name == APPLY_CORRECTION {
        if args.save {
            session.snapshot().save(&args.ledger)?;
            eprintln!(
                "{} Saved ledger to {}",
                style("✓").green(),
                args.ledger.display()
            );
        } else {
            eprintln!(
                "{} Correction not saved, pass --save to keep it",
                style("ℹ").blue()
            );
        }
    }

    Ok(())
}
