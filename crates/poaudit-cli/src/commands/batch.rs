//! Batch command: extract, audit and export a set of documents.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use poaudit_core::export::{write_csv, write_xlsx};
use poaudit_core::{
    PoauditConfig, ProcessingTask, ProgressCallback, Recognizer, Session, SourceDocument,
    TaskState,
};

use crate::recognizer::RoutingRecognizer;

/// Extensions picked up from the input pattern.
const SUPPORTED_EXTENSIONS: [&str; 8] = ["pdf", "png", "jpg", "jpeg", "tif", "tiff", "webp", "json"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    /// Spreadsheet with line item and failure sheets
    Xlsx,
    /// CSV with line item and failure sections
    Csv,
    /// Ledger snapshot, reloadable by `tools` and `ask`
    Json,
}

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: Vec<String>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Export formats
    #[arg(
        short,
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = [ExportFormat::Xlsx, ExportFormat::Json]
    )]
    format: Vec<ExportFormat>,

    /// Number of parallel workers (overrides pool.max_concurrency)
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Per-document recognition timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Split size/model text off item names
    #[arg(long)]
    split_names: bool,

    /// Exit with an error if any document failed
    #[arg(long)]
    fail_on_error: bool,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    apply_overrides(&mut config, &args);

    let files = collect_files(&args.input)?;
    if files.is_empty() {
        anyhow::bail!("No matching files found for: {}", args.input.join(" "));
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    let mut documents = Vec::with_capacity(files.len());
    for path in &files {
        let document = SourceDocument::from_path(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path.display(), e))?;
        debug!("{} detected as {}", path.display(), document.media_type().as_mime());
        documents.push(document);
    }

    let recognizer = RoutingRecognizer::from_config(&config.recognition)?;
    if !recognizer.has_remote() {
        warn!("No recognition endpoint configured, only JSON payload files can be processed");
    }
    let recognizer: Arc<dyn Recognizer> = Arc::new(recognizer);

    fs::create_dir_all(&args.output_dir)?;

    let session = Session::new(config)?;

    let pb = ProgressBar::new(documents.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );
    let bar = pb.clone();
    let progress: ProgressCallback = Arc::new(move |task: &ProcessingTask| {
        bar.set_message(task.document_name.clone());
        bar.inc(1);
    });

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let report = session
        .ingest(recognizer, documents, Some(progress), &cancel)
        .await?;
    pb.finish_with_message("Complete");

    let summary = session.summary();
    let export_config = session.config().export.clone();
    let ledger = session.close();

    for format in &args.format {
        let path = output_path(&args.output_dir, *format);
        match format {
            ExportFormat::Xlsx => write_xlsx(&ledger, &export_config, &path)?,
            ExportFormat::Csv => write_csv(&ledger, &path)?,
            ExportFormat::Json => ledger.save(&path)?,
        }
        println!("{} Wrote {}", style("✓").green(), path.display());
    }

    let stats = &report.stats;
    println!();
    println!(
        "{} Processed {} documents in {} ms ({:.2} docs/s)",
        style("✓").green(),
        stats.total_documents,
        stats.duration_ms,
        stats.documents_per_second()
    );
    println!(
        "   {} succeeded, {} failed",
        style(stats.succeeded).green(),
        style(stats.failed).red()
    );
    println!(
        "   {} line items: {} OK, {} WARN, {} ERROR",
        summary.line_items,
        style(summary.severity.ok).green(),
        style(summary.severity.warn).yellow(),
        style(summary.severity.error).red()
    );

    if stats.failed > 0 {
        println!();
        println!("{}", style("Failed documents:").red());
        for failed in ledger.failures() {
            println!(
                "  - {}: {} ({})",
                failed.document_name, failed.message, failed.kind
            );
        }
    }

    if args.fail_on_error {
        let failed = report
            .documents
            .iter()
            .filter(|d| d.state == TaskState::Failed)
            .count();
        if failed > 0 {
            anyhow::bail!("{} documents failed", failed);
        }
    }

    Ok(())
}

fn apply_overrides(config: &mut PoauditConfig, args: &BatchArgs) {
    if let Some(jobs) = args.jobs {
        config.pool.max_concurrency = jobs;
    }
    if let Some(timeout) = args.timeout {
        config.pool.task_timeout_seconds = timeout;
    }
    if args.split_names {
        config.extraction.name_spec_split = true;
    }
}

/// Expand patterns and keep files with a supported extension, in sorted order.
fn collect_files(patterns: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        for path in glob(pattern)?.filter_map(|r| r.ok()) {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            if path.is_file() && SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
                files.push(path);
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn output_path(dir: &Path, format: ExportFormat) -> PathBuf {
    let extension = match format {
        ExportFormat::Xlsx => "xlsx",
        ExportFormat::Csv => "csv",
        ExportFormat::Json => "json",
    };
    dir.join(format!("ledger.{}", extension))
}
