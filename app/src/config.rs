// ==============================================================================
// config.rs - Service Settings
// ==============================================================================
// Description: Paths and demo identifiers shared by ingestion and queries
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================

use std::path::PathBuf;

use clap::Args;

use crate::parsers::Genome23Parser;

/// Literal token callers pass to request the canned demo record
pub const SENTINEL: &str = "default";

/// Fixed page size for every list operation
pub const PAGE_SIZE: u32 = 25;

pub const MAX_FILE_SIZE: u64 = 500 * 1024 * 1024; // 500 MB

/// Service settings, read from flags or environment
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// SQLite database path (":memory:" for a throwaway store)
    #[arg(long, env = "GENOME_DB_PATH", default_value = "./data/genomes/genome.db")]
    pub database_path: String,

    /// Association corpus loaded when the service starts
    #[arg(long, env = "SNP_PAIRS_FILE_PATH")]
    pub snp_pairs_file: Option<PathBuf>,

    /// Genome file used when ingestion is asked for "default"
    #[arg(long, env = "GENOME_FILE_PATH")]
    pub default_genome_file: Option<PathBuf>,

    /// rsid substituted for the "default" variant filter
    #[arg(long, env = "DEFAULT_VARIANT_ID", default_value = "rs10516809")]
    pub default_variant_id: String,

    /// patient_id substituted for the "default" patient filter
    #[arg(long, env = "DEFAULT_PATIENT_ID", default_value = "demo-patient")]
    pub default_patient_id: String,

    /// Largest genome file accepted for ingestion, in bytes
    #[arg(long, env = "MAX_GENOME_FILE_SIZE", default_value_t = MAX_FILE_SIZE)]
    pub max_file_size: u64,

    /// Chromosomes kept from genome files (comma-separated; empty keeps all)
    #[arg(long = "chromosomes", env = "INCLUDE_CHROMOSOMES", value_delimiter = ',')]
    pub include_chromosomes: Vec<String>,

    /// Keep only chromosomes 1-22 from genome files
    #[arg(long, env = "AUTOSOMAL_ONLY")]
    pub autosomal_only: bool,
}

impl Settings {
    pub fn in_memory() -> Self {
        Self {
            database_path: ":memory:".to_string(),
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path == ":memory:"
    }

    /// Genome parser honoring the chromosome restriction
    pub fn genome_parser(&self) -> Genome23Parser {
        let parser = Genome23Parser::new();
        if self.autosomal_only {
            parser.autosomal_only()
        } else {
            parser.with_chromosomes(
                self.include_chromosomes
                    .iter()
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect(),
            )
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: "./data/genomes/genome.db".to_string(),
            snp_pairs_file: None,
            default_genome_file: None,
            default_variant_id: "rs10516809".to_string(),
            default_patient_id: "demo-patient".to_string(),
            max_file_size: MAX_FILE_SIZE,
            include_chromosomes: Vec::new(),
            autosomal_only: false,
        }
    }
}
