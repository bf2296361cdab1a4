// ==============================================================================
// ingest.rs - Ingestion Pipeline and Background Queue
// ==============================================================================
// Description: file → parser → normalizer → store, plus a single-worker job
//              queue that runs genome loads off the query path
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// Job lifecycle:
//   submit()  → IngestAck { job_id, status: "started" } returned immediately
//   worker    → spawn_blocking(load_genome) one job at a time (FIFO)
//   finish    → exactly one IngestionEvent on the broadcast channel
// ==============================================================================

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{Settings, SENTINEL};
use crate::error::{GenomeError, Result, RowIssue};
use crate::normalizer::AssociationNormalizer;
use crate::parsers::{AssociationParser, Genome23Parser};
use crate::store::GenomeStore;
use crate::validator::FileValidator;

const EVENT_CAPACITY: usize = 64;

/// A request to load one genome file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestRequest {
    /// File path, or "default" for the configured demo genome
    pub source: String,
    /// Explicit patient id; derived from file content when absent
    pub patient_id: Option<String>,
}

impl IngestRequest {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            patient_id: None,
        }
    }

    pub fn with_patient_id(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }
}

/// Outcome of one association corpus load
#[derive(Debug, Clone, Serialize)]
pub struct CorpusLoadReport {
    pub source: String,
    pub rows_read: usize,
    pub rows_ingested: usize,
    /// Rows that are not variant entries (e.g., gene or genoset keys)
    pub rows_filtered: usize,
    pub rejected: Vec<RowIssue>,
}

/// Outcome of one genome load
#[derive(Debug, Clone, Serialize)]
pub struct GenomeLoadSummary {
    pub source: String,
    pub patient_id: String,
    pub patient_name: String,
    pub hash_sha256: String,
    /// Size of the source file in bytes
    pub file_size: u64,
    /// Distinct genotype calls written for the patient
    pub rows_ingested: usize,
    pub skipped: Vec<RowIssue>,
}

/// Synchronous ingestion pipeline over one store
pub struct Ingestor {
    store: Arc<GenomeStore>,
    settings: Settings,
    validator: FileValidator,
    genome_parser: Genome23Parser,
    corpus_parser: AssociationParser,
    normalizer: AssociationNormalizer,
}

impl Ingestor {
    pub fn new(store: Arc<GenomeStore>, settings: Settings) -> Self {
        Self {
            validator: FileValidator::with_max_size(settings.max_file_size),
            genome_parser: settings.genome_parser(),
            store,
            settings,
            corpus_parser: AssociationParser::new(),
            normalizer: AssociationNormalizer::new(),
        }
    }

    /// Load the configured association corpus, if any
    pub fn load_configured_corpus(&self) -> Result<Option<CorpusLoadReport>> {
        match &self.settings.snp_pairs_file {
            Some(path) => self.load_corpus(path).map(Some),
            None => {
                debug!("No association corpus configured");
                Ok(None)
            }
        }
    }

    /// Parse, normalize and upsert an association corpus
    pub fn load_corpus(&self, path: impl AsRef<Path>) -> Result<CorpusLoadReport> {
        let path = path.as_ref();
        let source = path.display().to_string();

        let rows = self.corpus_parser.parse(path)?;
        let rows_read = rows.len();
        let corpus = self.normalizer.normalize(rows);
        let rows_ingested = self.store.ingest_association_batch(&corpus.associations)?;

        info!(
            "Loaded corpus {}: {} ingested, {} rejected, {} filtered",
            source,
            rows_ingested,
            corpus.rejected.len(),
            corpus.filtered
        );

        Ok(CorpusLoadReport {
            source,
            rows_read,
            rows_ingested,
            rows_filtered: corpus.filtered,
            rejected: corpus.rejected,
        })
    }

    /// Validate, parse and upsert one genome file as a single batch
    ///
    /// # Arguments
    /// * `request` - File path (or "default") and an optional patient id
    ///
    /// # Returns
    /// * `Ok(GenomeLoadSummary)` - Patient id used, calls written, rows skipped
    /// * `Err(GenomeError::MalformedInput)` - File rejected by validation or unreadable
    /// * `Err(GenomeError::ConflictWrite)` - Batch could not be committed
    ///
    /// Without an explicit patient id the id is derived from the file's
    /// SHA-256, so loading the same content twice updates the same patient.
    /// Calls outside the configured chromosome restriction are not loaded.
    pub fn load_genome(&self, request: &IngestRequest) -> Result<GenomeLoadSummary> {
        let (path, default_patient) = self.resolve_source(&request.source)?;
        info!("Loading genome from {}", path.display());

        let validated = self.validator.validate(&path)?;
        debug!(
            "Validated .{} genome file ({} bytes)",
            validated.extension, validated.size
        );
        let patient_id = request
            .patient_id
            .clone()
            .or(default_patient)
            .unwrap_or_else(|| derive_patient_id(&validated.hash_sha256));
        let patient_name = path.display().to_string();

        let parsed = self.genome_parser.parse(&path)?;
        let rows_ingested =
            self.store
                .ingest_genome_batch(&parsed.records, &patient_id, &patient_name)?;

        if !parsed.skipped.is_empty() {
            warn!(
                "Skipped {} malformed rows in {}",
                parsed.skipped.len(),
                patient_name
            );
        }

        Ok(GenomeLoadSummary {
            source: request.source.clone(),
            patient_id,
            patient_name,
            hash_sha256: validated.hash_sha256,
            file_size: validated.size,
            rows_ingested,
            skipped: parsed.skipped,
        })
    }

    fn resolve_source(&self, source: &str) -> Result<(PathBuf, Option<String>)> {
        let source = source.trim();
        if source != SENTINEL {
            return Ok((PathBuf::from(source), None));
        }

        let path = self.settings.default_genome_file.clone().ok_or_else(|| {
            GenomeError::malformed(SENTINEL, "no default genome file configured")
        })?;
        Ok((path, Some(self.settings.default_patient_id.clone())))
    }
}

/// Stable patient id for a genome file's content digest
pub fn derive_patient_id(hash_sha256: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, hash_sha256.as_bytes()).to_string()
}

// ==============================================================================
// Background queue
// ==============================================================================

/// Immediate reply to a genome ingestion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestAck {
    pub job_id: Uuid,
    pub source: String,
    pub status: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestionStatus {
    Completed,
    Failed { error: String },
}

/// Completion notice published once per job
#[derive(Debug, Clone, Serialize)]
pub struct IngestionEvent {
    pub job_id: Uuid,
    pub source: String,
    pub patient_id: Option<String>,
    pub rows_ingested: usize,
    pub rows_skipped: usize,
    #[serde(flatten)]
    pub status: IngestionStatus,
    pub finished_at: DateTime<Utc>,
}

impl IngestionEvent {
    fn from_outcome(job_id: Uuid, request: &IngestRequest, outcome: Result<GenomeLoadSummary>) -> Self {
        match outcome {
            Ok(summary) => Self {
                job_id,
                source: summary.source,
                patient_id: Some(summary.patient_id),
                rows_ingested: summary.rows_ingested,
                rows_skipped: summary.skipped.len(),
                status: IngestionStatus::Completed,
                finished_at: Utc::now(),
            },
            Err(e) => Self {
                job_id,
                source: request.source.clone(),
                patient_id: request.patient_id.clone(),
                rows_ingested: 0,
                rows_skipped: 0,
                status: IngestionStatus::Failed {
                    error: e.to_string(),
                },
                finished_at: Utc::now(),
            },
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == IngestionStatus::Completed
    }
}

struct IngestJob {
    job_id: Uuid,
    request: IngestRequest,
}

/// Single-worker queue; genome loads run one at a time in submission order
pub struct IngestionQueue {
    jobs: mpsc::UnboundedSender<IngestJob>,
    events: broadcast::Sender<IngestionEvent>,
    worker: JoinHandle<()>,
}

impl IngestionQueue {
    /// Spawn the worker task; must be called inside a tokio runtime
    pub fn start(ingestor: Arc<Ingestor>) -> Self {
        let (jobs, receiver) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let worker = tokio::spawn(run_worker(ingestor, receiver, events.clone()));

        Self {
            jobs,
            events,
            worker,
        }
    }

    /// Queue a genome load and return without waiting for it
    pub fn submit(&self, request: IngestRequest) -> Result<IngestAck> {
        let job_id = Uuid::new_v4();
        let ack = IngestAck {
            job_id,
            source: request.source.clone(),
            status: "started",
        };

        self.jobs
            .send(IngestJob { job_id, request })
            .map_err(|_| GenomeError::ConflictWrite("ingestion worker has stopped".to_string()))?;

        info!("Queued ingestion job {} for {}", job_id, ack.source);
        Ok(ack)
    }

    /// Receive completion events for jobs finishing after this call
    pub fn subscribe(&self) -> broadcast::Receiver<IngestionEvent> {
        self.events.subscribe()
    }

    /// Stop accepting jobs and wait for queued ones to finish
    pub async fn shutdown(self) {
        drop(self.jobs);
        if let Err(e) = self.worker.await {
            error!("Ingestion worker panicked: {}", e);
        }
    }
}

async fn run_worker(
    ingestor: Arc<Ingestor>,
    mut jobs: mpsc::UnboundedReceiver<IngestJob>,
    events: broadcast::Sender<IngestionEvent>,
) {
    while let Some(IngestJob { job_id, request }) = jobs.recv().await {
        info!("Starting ingestion job {} ({})", job_id, request.source);

        let outcome = tokio::task::spawn_blocking({
            let ingestor = Arc::clone(&ingestor);
            let request = request.clone();
            move || ingestor.load_genome(&request)
        })
        .await
        .unwrap_or_else(|e| Err(GenomeError::ConflictWrite(format!("ingestion task failed: {}", e))));

        let event = IngestionEvent::from_outcome(job_id, &request, outcome);
        match &event.status {
            IngestionStatus::Completed => info!(
                "Ingestion job {} completed: {} rows ({} skipped)",
                job_id, event.rows_ingested, event.rows_skipped
            ),
            IngestionStatus::Failed { error } => {
                error!("Ingestion job {} failed: {}", job_id, error)
            }
        }

        if events.send(event).is_err() {
            debug!("No subscribers for ingestion job {}", job_id);
        }
    }

    debug!("Ingestion worker stopped");
}
