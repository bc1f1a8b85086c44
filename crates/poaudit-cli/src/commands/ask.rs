//! Ask command - answer a question about a saved ledger through the agent loop.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use console::style;

use poaudit_core::agent::system_prompt_with_documents;
use poaudit_core::{AgentLoop, Ledger, Session, ToolDispatcher};

use crate::llm::HttpLanguageModel;

/// Arguments for the ask command.
#[derive(Args)]
pub struct AskArgs {
    /// Ledger snapshot written by `batch --format json`
    #[arg(short, long)]
    ledger: PathBuf,

    /// Chat endpoint (overrides agent.endpoint)
    #[arg(long)]
    endpoint: Option<String>,

    /// Write the ledger back if the answer applied corrections
    #[arg(long)]
    save: bool,

    /// The question
    #[arg(required = true)]
    question: Vec<String>,
}

pub async fn run(args: AskArgs, config_path: Option<&str>, show_tools: bool) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let endpoint = args
        .endpoint
        .clone()
        .or_else(|| config.agent.endpoint.clone())
        .ok_or_else(|| {
            anyhow::anyhow!("No chat endpoint configured. Set agent.endpoint or pass --endpoint.")
        })?;

    let model = HttpLanguageModel::new(
        &endpoint,
        Duration::from_secs(config.agent.model_timeout_seconds),
    )?;

    let ledger = Ledger::load(&args.ledger)?;
    let session = Session::with_ledger(config, ledger)?;

    let prompt = {
        let ledger = session.read();
        system_prompt_with_documents(ledger.documents().iter().map(|d| d.document_name.as_str()))
    };
    let agent = AgentLoop::from_config(&session.config().agent).with_system_prompt(prompt);
    let dispatcher = ToolDispatcher::new(&session);

    let question = args.question.join(" ");
    let answer = agent.run(&model, &dispatcher, &[], &question).await?;

    if show_tools {
        for invocation in &answer.tool_calls {
            let marker = if invocation.succeeded {
                style("→").cyan()
            } else {
                style("✗").red()
            };
            eprintln!("{} {} {}", marker, invocation.call.name, invocation.call.arguments);
        }
    }

    println!("{}", answer.text);

    let corrected = answer
        .tool_calls
        .iter()
        .any(|i| i.succeeded && i.call.name == poaudit_core::tools::APPLY_CORRECTION);
    if corrected && args.save {
        session.snapshot().save(&args.ledger)?;
        eprintln!(
            "{} Saved ledger to {}",
            style("✓").green(),
            args.ledger.display()
        );
    }

    Ok(())
}
