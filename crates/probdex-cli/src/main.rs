//! ProbDex: exam problem indexing and similar-problem search.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use probdex_core::{ProbdexConfig, Taxonomy};
use probdex_extract::{CancellationToken, Extractor, ExtractorConfig, GeminiClient};
use probdex_runtime::{initialize_corpus, Pipeline};

mod report;

/// Which flow to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum Mode {
    /// Maintain the corpus: catalogue, extract, merge, sync
    System,
    /// Search the corpus for problems similar to a user document
    #[default]
    User,
}

#[derive(Parser, Debug)]
#[command(name = "probdex")]
#[command(about = "Exam problem extraction and similar-problem search")]
#[command(version)]
struct Args {
    /// Run mode
    #[arg(long, value_enum, default_value_t = Mode::User)]
    mode: Mode,

    /// [user] PDF in the user folder to analyze (default: all of them)
    #[arg(long)]
    file: Option<String>,

    /// [system] Reset the corpus store and rebuild the dataset skeleton
    #[arg(long)]
    init: bool,

    /// Data directory
    #[arg(long, env = "PROBDEX_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Recommendations per problem
    #[arg(long)]
    top_k: Option<usize>,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

fn resolve_data_dir(arg: Option<PathBuf>) -> PathBuf {
    arg.unwrap_or_else(|| {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()));
        if let Some(dir) = exe_dir {
            let assets = dir.join("assets");
            if assets.exists() {
                return assets;
            }
        }
        PathBuf::from("assets")
    })
}

/// Ask on stdin; only `y` confirms.
fn confirm(question: &str) -> Result<bool> {
    print!("{} (y/n): ", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let data_dir = resolve_data_dir(args.data_dir.clone());
    let mut config = ProbdexConfig::from_env(&data_dir)
        .with_context(|| format!("Failed to prepare data directory {}", data_dir.display()))?;
    if let Some(top_k) = args.top_k {
        config.top_k = top_k.max(1);
    }
    info!("Data directory: {}", data_dir.display());

    let taxonomy = Arc::new(Taxonomy::standard());

    if args.mode == Mode::System && args.init {
        println!("[warning] Corpus initialization deletes the corpus database and every analysis in the dataset.");
        if !confirm("Initialize the corpus?")? {
            println!("Initialization cancelled.");
            return Ok(());
        }
        let report = initialize_corpus(&config, taxonomy)
            .map_err(|e| anyhow::anyhow!("Corpus initialization failed: {}", e))?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        println!(
            "Corpus initialized: {} skeleton rows from {} page images.",
            report.skeleton_rows, report.images
        );
        return Ok(());
    }

    let llm = ExtractorConfig::load(&config.data_paths.llm_config_file);
    let client = GeminiClient::from_config(&llm).map_err(|e| anyhow::anyhow!("{}", e))?;
    info!("Extraction model: {}", client.model());
    let extractor = Extractor::from_config(&llm, Arc::new(client), taxonomy.clone())
        .with_concurrency(llm.concurrency.max(config.concurrency));

    let cancel = CancellationToken::new();
    let (sender, mut events) = tokio::sync::mpsc::unbounded_channel();
    let pipeline = Pipeline::new(config, taxonomy, extractor)
        .with_events(sender)
        .with_cancellation(cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current call");
            cancel.cancel();
        }
    });
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            report::print_event(&event);
        }
    });

    let outcome = run(&pipeline, &args).await;
    drop(pipeline);
    let _ = printer.await;
    outcome
}

async fn run(pipeline: &Pipeline, args: &Args) -> Result<()> {
    match args.mode {
        Mode::System => {
            let report = pipeline
                .maintain_corpus()
                .await
                .map_err(|e| anyhow::anyhow!("Corpus run failed: {}", e))?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report::print_corpus(&report);
            }
        }
        Mode::User => {
            let files = match &args.file {
                Some(file) => vec![file.clone()],
                None => {
                    let files = pipeline
                        .user_documents()
                        .map_err(|e| anyhow::anyhow!("{}", e))?;
                    if files.is_empty() {
                        bail!(
                            "No PDF files in {}",
                            pipeline.config().data_paths.user_pdfs.display()
                        );
                    }
                    info!("No file given, processing all {} user documents", files.len());
                    files
                }
            };

            for (index, file) in files.iter().enumerate() {
                if pipeline.cancellation().is_cancelled() {
                    break;
                }
                println!("\n[{}/{}] {}", index + 1, files.len(), file);
                match pipeline.search(file).await {
                    Ok(report) if args.json => println!("{}", serde_json::to_string_pretty(&report)?),
                    Ok(report) => report::print_search(&report),
                    // One failed document does not stop the rest.
                    Err(e) => error!("{}: {}", file, e),
                }
            }
        }
    }
    Ok(())
}
