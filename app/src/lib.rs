// ==============================================================================
// lib.rs - Genome Search Library
// ==============================================================================
// Description: Genotype ingestion, association matching and report queries
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================

pub mod config;
pub mod error;
pub mod ingest;
pub mod matcher;
pub mod models;
pub mod normalizer;
pub mod parsers;
pub mod query;
pub mod store;
pub mod validator;

pub use config::Settings;
pub use error::{GenomeError, NotFoundFilter, Result, RowIssue};
pub use ingest::{IngestAck, IngestRequest, IngestionEvent, IngestionQueue, Ingestor};
pub use matcher::MatchEngine;
pub use models::QueryFilter;
pub use query::QueryService;
pub use store::GenomeStore;
