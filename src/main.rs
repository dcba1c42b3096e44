use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use futures::future::join_all;
use tracing::info;
use tracing_subscriber::EnvFilter;

use job_stats::common::read_input_lines;
use job_stats::map_reduce_apps::{select, VARIANTS};
use job_stats::mr_parallel::{default_workers, DEFAULT_CHUNK_LINES};
use job_stats::sink::{metric_map, MemoryStore, ResultStore, TsvSink};
use job_stats::{
    AnalysisApp, Input, MapReduce, MapReduceApp, NormalizerConfig, ParallelMapReduce,
    RecordNormalizer, RunReport, SequentialMapReduce,
};

#[derive(Parser, Debug)]
#[command(about = "Grouped statistics over job-posting exports")]
struct Args {
    /// Input file or directory; repeatable
    #[arg(long, required_unless_present = "list")]
    input: Vec<PathBuf>,
    /// Output directory, one `<variant>.tsv` per analysis
    #[arg(long, default_value = "output")]
    output: PathBuf,
    /// Analysis to run; repeatable, all when omitted
    #[arg(long)]
    variant: Vec<String>,
    /// Worker threads; 0 or 1 runs sequentially
    #[arg(long, default_value_t = default_workers())]
    workers: usize,
    /// Lines per map task
    #[arg(long, default_value_t = DEFAULT_CHUNK_LINES)]
    chunk_lines: usize,
    /// JSON file overriding normalizer constants
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the available analyses and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    if args.list {
        for variant in VARIANTS.iter() {
            println!(
                "{}\t{}\t{}",
                variant.name,
                variant.description,
                variant.columns.join(",")
            );
        }
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => NormalizerConfig::load(path)?,
        None => NormalizerConfig::default(),
    };
    let variants = select(&args.variant)?;
    let lines = read_input_lines(&args.input)?;
    info!("read {} lines from {} inputs", lines.len(), args.input.len());

    let input = Input::new(lines, RecordNormalizer::new(config.clone()));
    let runs = variants.into_iter().map(|variant| {
        let app: Arc<dyn MapReduceApp> = Arc::new(AnalysisApp::new(variant, config.clone()));
        run_variant(input.clone(), app, args.workers, args.chunk_lines)
    });
    let reports = join_all(runs).await;

    let sink = TsvSink::new(&args.output);
    let mut store = MemoryStore::default();
    for report in reports {
        let report = report?;
        let path = sink.write(&report.variant, &report.output)?;
        store.upsert(&report.variant, &metric_map(&report.output))?;
        info!(
            "`{}`: {} rows to {}, {} keys stored, counters={}",
            report.variant,
            report.output.len(),
            path.display(),
            store.table(&report.variant).map_or(0, |t| t.len()),
            report.counters
        );
    }
    Ok(())
}

async fn run_variant(
    input: Input,
    app: Arc<dyn MapReduceApp>,
    workers: usize,
    chunk_lines: usize,
) -> Result<RunReport> {
    if workers <= 1 {
        SequentialMapReduce::new(input, app).run().await
    } else {
        ParallelMapReduce::new(input, app)
            .with_workers(workers)
            .with_chunk_lines(chunk_lines)
            .run()
            .await
    }
}
