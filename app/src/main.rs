// ==============================================================================
// main.rs - Genome Search Entry Point
// ==============================================================================
// Description: Command-line front end for ingestion and report queries
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use genome_search::{
    GenomeStore, IngestRequest, IngestionQueue, Ingestor, QueryFilter, QueryService, Settings,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load an association corpus (defaults to SNP_PAIRS_FILE_PATH)
    LoadCorpus {
        path: Option<PathBuf>,
    },
    /// Queue a genome file for ingestion and wait for its completion event
    Ingest {
        /// Genome file path, or "default" for GENOME_FILE_PATH
        source: String,
        #[arg(long)]
        patient_id: Option<String>,
    },
    /// List patients
    Patients(FilterArgs),
    /// List associations
    Associations(FilterArgs),
    /// List genotype calls
    Genotypes(FilterArgs),
    /// List genotype calls with patient names
    Expanded(FilterArgs),
    /// Full report with genotype match flags
    Report(FilterArgs),
    /// Row counts per table
    Stats,
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Patient id, or "default" for the demo patient
    #[arg(long)]
    patient_id: Option<String>,

    /// rsid, or "default" for the demo variant
    #[arg(long)]
    rsid: Option<String>,

    #[arg(long, default_value_t = 0)]
    offset: u32,
}

impl From<FilterArgs> for QueryFilter {
    fn from(args: FilterArgs) -> Self {
        QueryFilter {
            patient_id: args.patient_id,
            variant_id: args.rsid,
            offset: args.offset,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "genome_search=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = cli.settings;

    let store = Arc::new(
        GenomeStore::from_settings(&settings)
            .with_context(|| format!("Failed to open store at {}", settings.database_path))?,
    );
    let ingestor = Arc::new(Ingestor::new(Arc::clone(&store), settings.clone()));
    let queries = QueryService::new(Arc::clone(&store), &settings);

    if !matches!(cli.command, Command::LoadCorpus { .. }) {
        if let Some(report) = ingestor
            .load_configured_corpus()
            .context("Failed to load configured association corpus")?
        {
            info!(
                "Association corpus ready: {} rows from {}",
                report.rows_ingested, report.source
            );
        }
    }

    match cli.command {
        Command::LoadCorpus { path } => {
            let path = path
                .or_else(|| settings.snp_pairs_file.clone())
                .context("No corpus path given and SNP_PAIRS_FILE_PATH is not set")?;
            let report = ingestor.load_corpus(&path)?;
            for issue in &report.rejected {
                warn!("Line {}: {}", issue.line, issue.reason);
            }
            print_json(&report)?;
        }
        Command::Ingest { source, patient_id } => {
            let queue = IngestionQueue::start(Arc::clone(&ingestor));
            let mut events = queue.subscribe();

            let mut request = IngestRequest::new(source);
            request.patient_id = patient_id;
            let ack = queue.submit(request)?;
            print_json(&ack)?;

            let event = events
                .recv()
                .await
                .context("Ingestion worker stopped before reporting")?;
            print_json(&event)?;
            queue.shutdown().await;

            if !event.is_completed() {
                anyhow::bail!("Ingestion job {} failed", event.job_id);
            }
        }
        Command::Patients(filter) => print_json(&queries.patients(&filter.into())?)?,
        Command::Associations(filter) => print_json(&queries.associations(&filter.into())?)?,
        Command::Genotypes(filter) => print_json(&queries.genotype_calls(&filter.into())?)?,
        Command::Expanded(filter) => {
            print_json(&queries.expanded_genotype_calls(&filter.into())?)?
        }
        Command::Report(filter) => print_json(&queries.full_report(&filter.into())?)?,
        Command::Stats => print_json(&queries.stats()?)?,
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
