// ==============================================================================
// association.rs - Association Corpus Parser
// ==============================================================================
// Description: Reads published SNP-genotype risk rows using the file's header
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// Format: Delimited text with a header row (comma by default, tab for .tsv)
// Example:
//   RSID_Genotypes,magnitude,risk,notes
//   Rs1050828(A;G),2.5,1,example
//   Rs1050828(G;G),0,0,common in clinvar
// ==============================================================================

use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info, warn};

use super::open_reader;
use crate::error::{GenomeError, Result, RowIssue};

const PACKED_COLUMN: &str = "rsid_genotypes";

/// One corpus row as read, before normalization
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawAssociationRow {
    /// 1-based line number in the source file
    pub line: u64,
    pub rsid_genotypes: String,
    pub magnitude: Option<String>,
    pub risk: Option<String>,
    pub notes: Option<String>,
}

/// Column positions resolved from the header row
#[derive(Debug, Clone, Copy)]
struct HeaderIndex {
    rsid_genotypes: usize,
    magnitude: Option<usize>,
    risk: Option<usize>,
    notes: Option<usize>,
}

impl HeaderIndex {
    fn resolve(headers: &StringRecord) -> Option<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };

        Some(Self {
            rsid_genotypes: find(PACKED_COLUMN)?,
            magnitude: find("magnitude"),
            risk: find("risk"),
            notes: find("notes"),
        })
    }
}

/// Parser for association corpus files (raw mode: embedded header)
#[derive(Debug, Clone, Default)]
pub struct AssociationParser;

impl AssociationParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a corpus file
    ///
    /// # Arguments
    /// * `path` - Corpus file (.csv, .tsv, optionally gzipped)
    ///
    /// # Returns
    /// * `Ok(rows)` - One entry per data row, in file order
    /// * `Err(GenomeError::MalformedInput)` - Unreadable file or no `RSID_Genotypes` column
    ///
    /// Individual undecodable rows come back as `Err(RowIssue)` entries so
    /// the caller can record and skip them.
    pub fn parse(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Vec<std::result::Result<RawAssociationRow, RowIssue>>> {
        let path = path.as_ref();
        let label = path.display().to_string();
        info!("Parsing association corpus: {}", label);

        let delimiter = infer_delimiter(path);
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(open_reader(path)?);

        let headers = reader
            .headers()
            .map_err(|e| GenomeError::malformed(label.clone(), e))?
            .clone();
        let index = HeaderIndex::resolve(&headers).ok_or_else(|| {
            GenomeError::malformed(label.clone(), "missing RSID_Genotypes column")
        })?;

        let mut rows = Vec::new();
        for result in reader.records() {
            match result {
                Ok(record) => {
                    let line = record.position().map(|p| p.line()).unwrap_or(0);
                    rows.push(Ok(build_row(&record, index, line)));
                }
                Err(e) if e.is_io_error() => {
                    return Err(GenomeError::malformed(label, e));
                }
                Err(e) => {
                    let line = e.position().map(|p| p.line()).unwrap_or(0);
                    warn!("Undecodable corpus row at line {}: {}", line, e);
                    rows.push(Err(RowIssue::new(line, e.to_string())));
                }
            }
        }

        debug!("Read {} corpus rows from {}", rows.len(), label);
        Ok(rows)
    }
}

fn infer_delimiter(path: &Path) -> u8 {
    let name = path.to_string_lossy().to_ascii_lowercase();
    if name.ends_with(".tsv") || name.ends_with(".tsv.gz") {
        b'\t'
    } else {
        b','
    }
}

fn build_row(record: &StringRecord, index: HeaderIndex, line: u64) -> RawAssociationRow {
    let cell = |idx: Option<usize>| {
        idx.and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    RawAssociationRow {
        line,
        rsid_genotypes: cell(Some(index.rsid_genotypes)).unwrap_or_default(),
        magnitude: cell(index.magnitude),
        risk: cell(index.risk),
        notes: cell(index.notes),
    }
}
