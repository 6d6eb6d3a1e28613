//! # `kbc` Library Crate
//!
//! Argument parsing and command dispatch for the `kbc` CLI. The `elicit`
//! command drives batch elicitation of triples; the `evaluate` command scores
//! elicited triples against web snippets or the Wikidata gold reference.

pub mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kbc::eval::Judge;
use kbc::providers::ai::OpenAiChatProvider;
use kbc::providers::batch::OpenAiBatchProvider;
use kbc::providers::reference::WikidataClient;
use kbc::providers::search::BraveSearchProvider;
use kbc::sampling::seeded_rng;
use kbc::tracker::status_report;
use kbc::{
    BatchTracker, ElicitationMode, Elicitor, EvalReport, EvalSettings, Evaluator, FsJobStore,
    MetricKind, StatusReport, StorePaths, SubjectCatalog, VerificationMethod,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::config::{load_config, AppConfig};

// --- CLI Argument Structs ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit, collect or inspect triple elicitation batches
    Elicit(ElicitArgs),
    /// Score elicited triples and write a precision or recall summary
    Evaluate(EvaluateArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Submit,
    Verify,
    Status,
}

impl From<ModeArg> for ElicitationMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Submit => ElicitationMode::Submit,
            ModeArg::Verify => ElicitationMode::Verify,
            ModeArg::Status => ElicitationMode::Status,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodArg {
    Web,
    Wikidata,
}

impl From<MethodArg> for VerificationMethod {
    fn from(value: MethodArg) -> Self {
        match value {
            MethodArg::Web => VerificationMethod::Web,
            MethodArg::Wikidata => VerificationMethod::Wikidata,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricArg {
    Precision,
    Recall,
}

impl From<MetricArg> for MetricKind {
    fn from(value: MetricArg) -> Self {
        match value {
            MetricArg::Precision => MetricKind::Precision,
            MetricArg::Recall => MetricKind::Recall,
        }
    }
}

#[derive(Parser, Debug)]
pub struct ElicitArgs {
    /// Model named in every batch request.
    #[arg(long)]
    pub model: String,
    /// Directory of prompt templates, one batch per file.
    #[arg(long, default_value = "templates")]
    pub template_dir: PathBuf,
    /// JSON file mapping categories to subject lists. Required to submit.
    #[arg(long, required_if_eq("mode", "submit"))]
    pub subjects: Option<PathBuf>,
    /// Directory receiving `wikidata_triples_<index>.csv` files.
    #[arg(long, default_value = "triples")]
    pub output_dir: PathBuf,
    #[arg(long, value_enum)]
    pub mode: ModeArg,
    /// Root of the job store (`progress_dir/`, `completed_dir/`, ...).
    #[arg(long, default_value = ".")]
    pub work_dir: PathBuf,
    /// Submit only N subjects drawn without replacement.
    #[arg(long)]
    pub sample: Option<usize>,
    #[arg(long, default_value = "42")]
    pub seed: String,
    /// Re-download and rewrite every completed batch, not only new ones.
    #[arg(long)]
    pub reprocess_all: bool,
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct EvaluateArgs {
    /// Directory of elicited triples CSV files.
    #[arg(long)]
    pub triples_dir: PathBuf,
    /// JSON file mapping categories to subject lists.
    #[arg(long)]
    pub subjects: PathBuf,
    #[arg(long)]
    pub judge_model: String,
    #[arg(long, default_value = "42")]
    pub seed: String,
    #[arg(long, value_enum)]
    pub method: MethodArg,
    /// Number of triples judged per source file; -1 judges all of them.
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub sample_size: i64,
    #[arg(long, value_enum)]
    pub metric: MetricArg,
    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,
    /// Root of the gold reference and snippet caches.
    #[arg(long, default_value = ".")]
    pub work_dir: PathBuf,
    /// Evaluate all source files as a single pool.
    #[arg(long)]
    pub pool: bool,
    #[arg(long)]
    pub config: Option<PathBuf>,
}

// --- Main Logic ---

pub async fn run(cli: Cli) -> Result<()> {
    dotenvy::dotenv().ok();
    match cli.command {
        Commands::Elicit(args) => run_elicit(args).await,
        Commands::Evaluate(args) => run_evaluate(args).await,
    }
}

async fn run_elicit(args: ElicitArgs) -> Result<()> {
    let app_config = load_config(args.config.as_deref())?;
    let store = FsJobStore::new(StorePaths::under(&args.work_dir, &args.output_dir));
    let mode = ElicitationMode::from(args.mode);

    if mode == ElicitationMode::Status {
        let report = status_report(&store)?;
        print_status(&report);
        return Ok(());
    }

    let catalog = match (mode, &args.subjects) {
        (ElicitationMode::Submit, Some(path)) => {
            if !args.template_dir.is_dir() {
                bail!(
                    "Template directory '{}' does not exist",
                    args.template_dir.display()
                );
            }
            Some(SubjectCatalog::from_path(path).with_context(|| {
                format!("Failed to load subjects from '{}'", path.display())
            })?)
        }
        (ElicitationMode::Submit, None) => bail!("--subjects is required to submit"),
        _ => None,
    };

    let provider = OpenAiBatchProvider::new(
        &app_config.openai.base_url,
        app_config.openai_api_key().unwrap_or_default(),
    )?;
    let tracker = BatchTracker::new(&provider, &store, app_config.tracker_settings());
    let elicitor = Elicitor::new(tracker, &args.model, &args.template_dir, &args.output_dir);

    match catalog {
        Some(catalog) => {
            let mut rng = seeded_rng(&args.seed);
            let records = elicitor.submit(&catalog, args.sample, &mut rng).await?;
            for record in &records {
                println!(
                    "Submitted batch {} for '{}' (index {}).",
                    record.batch_id, record.source_template_name, record.source_index
                );
            }
            println!("{} batches submitted.", records.len());
        }
        None => {
            let report = elicitor.verify(args.reprocess_all).await?;
            for batch in &report.collected {
                println!(
                    "Wrote {} triples to '{}'.",
                    batch.triple_count,
                    batch.triples_path.display()
                );
            }
            for batch in &report.failed {
                println!(
                    "Could not collect batch {} (index {}): {}",
                    batch.record.batch_id, batch.record.source_index, batch.error
                );
            }
            println!("{} batches collected.", report.collected.len());
            if !report.failed.is_empty() {
                bail!(
                    "{} completed batches could not be collected; run verify again to retry them",
                    report.failed.len()
                );
            }
        }
    }
    Ok(())
}

fn print_status(report: &StatusReport) {
    println!(
        "{} in progress, {} completed.",
        report.in_progress.len(),
        report.completed.len()
    );
    for (stage, records) in [
        ("in progress", &report.in_progress),
        ("completed", &report.completed),
    ] {
        for record in records {
            println!(
                "  [{stage}] #{} {} '{}' ({})",
                record.source_index, record.batch_id, record.source_template_name, record.status
            );
        }
    }
}

async fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    let method = VerificationMethod::from(args.method);
    let metric = MetricKind::from(args.metric);
    Evaluator::check_preconditions(&args.triples_dir, method, metric)?;

    let app_config = load_config(args.config.as_deref())?;
    let catalog = SubjectCatalog::from_path(&args.subjects)
        .with_context(|| format!("Failed to load subjects from '{}'", args.subjects.display()))?;
    let subjects = catalog.all_subjects();

    let judge = Judge::new(Box::new(OpenAiChatProvider::new(
        &app_config.openai.base_url,
        app_config.openai_api_key(),
        &args.judge_model,
    )?));
    let settings = eval_settings(&args, &app_config);
    info!(
        "Evaluating '{}' with {method}/{metric}, seed '{}'.",
        args.triples_dir.display(),
        settings.seed
    );

    let report = match method {
        VerificationMethod::Web => {
            let search = BraveSearchProvider::new(
                &app_config.brave.search_url,
                app_config.brave_token().unwrap_or_default(),
                settings.snippet_top_k,
            )?;
            Evaluator::new(judge, settings)
                .with_search(&search)
                .run(&args.triples_dir, &subjects, method, metric, &args.results_dir)
                .await?
        }
        VerificationMethod::Wikidata => {
            let reference = WikidataClient::new(
                &app_config.wikidata.api_url,
                &app_config.wikidata.entity_data_url,
            )?
            .with_language(&app_config.wikidata.language);
            Evaluator::new(judge, settings)
                .with_reference(&reference)
                .run(&args.triples_dir, &subjects, method, metric, &args.results_dir)
                .await?
        }
    };

    print_report(&report);
    Ok(())
}

fn eval_settings(args: &EvaluateArgs, app_config: &AppConfig) -> EvalSettings {
    let mut settings = EvalSettings::under(&args.work_dir, &args.seed);
    settings.sample_size = EvalSettings::sample_size_from_arg(args.sample_size);
    settings.search_delay = Duration::from_secs(app_config.eval.search_delay_secs);
    settings.snippet_top_k = app_config.brave.top_k;
    settings.pool_files = args.pool;
    if let Some(gold_path) = &app_config.eval.gold_path {
        settings.gold_path = gold_path.clone();
    }
    if let Some(snippet_dir) = &app_config.eval.snippet_dir {
        settings.snippet_dir = snippet_dir.clone();
    }
    settings
}

fn print_report(report: &EvalReport) {
    for row in &report.rows {
        println!(
            "{} [{}] true {:.3} | plausible {:.3} | implausible {:.3} | false {:.3} | {} triples",
            row.source,
            row.metric,
            row.true_fraction,
            row.plausible_fraction,
            row.implausible_fraction,
            row.false_fraction,
            row.total
        );
    }
    println!("Summary written to '{}'.", report.output_path.display());
}
