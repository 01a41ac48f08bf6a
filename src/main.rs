use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use buoycam_service::analysis::label::LabelExtractor;
use buoycam_service::config::ServiceConfig;
use buoycam_service::ingest::ndbc::NdbcClient;
use buoycam_service::logging::init_logger;
use buoycam_service::model::TextKind;
use buoycam_service::ocr::{TesseractCli, TextDetector};
use buoycam_service::pipeline::{Collaborators, StationPipeline};
use buoycam_service::report;
use buoycam_service::storage::local::LocalBlobStore;
use buoycam_service::storage::memory::{MemoryBlobStore, MemoryRecordStore};
use buoycam_service::storage::postgres::PostgresRecordStore;
use buoycam_service::storage::{BlobStore, RecordStore};

#[derive(Parser, Debug)]
#[command(author, version, about = "NDBC buoy camera and meteo log ingest", long_about = None)]
struct Cli {
    /// Config file (defaults to ./buoycam.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one ingest pass over every configured station
    Run(RunArgs),
    /// Print the caption label read from a local image file
    InspectLabel(InspectLabelArgs),
    /// Create the record table if it does not exist
    EnsureTable,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Process images even when they match the last stored capture
    #[arg(long)]
    force: bool,
    /// Keep archives and records in memory instead of writing them
    #[arg(long)]
    dry_run: bool,
    /// Print a summary table instead of the JSON report
    #[arg(long)]
    summary: bool,
}

#[derive(Args, Debug)]
struct InspectLabelArgs {
    /// JPEG captured from a buoycam
    image: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ServiceConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_logger(&config.logging).context("failed to initialise logging")?;

    match cli.command {
        Command::Run(args) => handle_run(config, args),
        Command::InspectLabel(args) => handle_inspect_label(args),
        Command::EnsureTable => handle_ensure_table(&config),
    }
}

fn handle_run(config: ServiceConfig, args: RunArgs) -> Result<()> {
    let mut pipeline_config = config.pipeline_config();
    if args.force {
        pipeline_config.force_process = true;
    }
    pipeline_config.validate()?;

    let client = NdbcClient::new(config.sources.timeout()).context("failed to build HTTP client")?;
    let (blobs, records): (Box<dyn BlobStore>, Box<dyn RecordStore>) = if args.dry_run {
        info!("dry run: archives and records stay in memory");
        (Box::new(MemoryBlobStore::new()), Box::new(MemoryRecordStore::new()))
    } else {
        (
            Box::new(LocalBlobStore::new(&config.storage.blob_root)),
            Box::new(connect_record_store(&config)?),
        )
    };

    let collaborators = Collaborators {
        images: Box::new(client.clone()),
        logs: Box::new(client),
        ocr: Box::new(TesseractCli::default()),
        blobs,
        records,
    };
    let pipeline = StationPipeline::new(pipeline_config, collaborators);
    let run_report = pipeline.run()?;

    if args.summary {
        report::print_summary(&run_report);
    } else {
        println!("{}", serde_json::to_string_pretty(&run_report)?);
    }

    if run_report.summary.total > 0 && run_report.summary.failed == run_report.summary.total {
        bail!("every station failed");
    }
    Ok(())
}

fn handle_inspect_label(args: InspectLabelArgs) -> Result<()> {
    let image = std::fs::read(&args.image)
        .with_context(|| format!("failed to read {}", args.image.display()))?;

    let detections = TesseractCli::default()
        .detect_text(&image)
        .context("text detection failed")?;
    for detection in detections.iter().filter(|d| d.kind == TextKind::Line) {
        println!("{:>5.1}\t{}", detection.confidence, detection.text);
    }

    let label = LabelExtractor::new().extract_from_detections(&detections);
    println!("{}", serde_json::to_string_pretty(&label)?);
    Ok(())
}

fn handle_ensure_table(config: &ServiceConfig) -> Result<()> {
    let store = connect_record_store(config)?;
    store.ensure_table()?;
    println!("Record table '{}' is ready.", store.table());
    Ok(())
}

fn connect_record_store(config: &ServiceConfig) -> Result<PostgresRecordStore> {
    let database_url = config
        .storage
        .database_url
        .as_deref()
        .context("DATABASE_URL (or storage.database_url) must be set")?;
    let table = config
        .pipeline
        .table
        .as_deref()
        .context("BUOYCAM_TABLE (or pipeline.table) must be set")?;
    PostgresRecordStore::connect(database_url, table).context("failed to connect to record store")
}
