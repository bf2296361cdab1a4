// ==============================================================================
// normalizer.rs - Association Row Normalization
// ==============================================================================
// Description: Extracts rsid and allele pair from packed RSID_Genotypes keys
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// Algorithm:
//   Rs1050828(A;G) → rsid "rs1050828", allele1 "A", allele2 "G"
//   - rows whose key does not start with "Rs" are dropped (corpus filtering)
//   - rows that fail extraction, numeric coercion or shape checks are
//     recorded as row issues; the batch always continues
// ==============================================================================

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{GenomeError, RowIssue};
use crate::models::Association;
use crate::parsers::RawAssociationRow;

const VARIANT_PREFIX: &str = "Rs";

/// Allele symbols accepted in a documented genotype
const ALLELE_ALPHABET: &[char] = &['A', 'C', 'G', 'T', 'D', 'I', '-'];

/// Outcome of normalizing one corpus batch
#[derive(Debug, Default)]
pub struct NormalizedCorpus {
    pub associations: Vec<Association>,
    /// Rows that failed validation, with line and reason
    pub rejected: Vec<RowIssue>,
    /// Rows dropped because they are not variant entries
    pub filtered: usize,
}

pub struct AssociationNormalizer {
    packed: Regex,
}

impl Default for AssociationNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl AssociationNormalizer {
    pub fn new() -> Self {
        Self {
            packed: Regex::new(r"^(Rs\d+)\(([^;]+);([^)]+)\)")
                .expect("invalid regex in source code"),
        }
    }

    /// Normalize a parsed batch, collecting per-row failures
    pub fn normalize(
        &self,
        rows: Vec<std::result::Result<RawAssociationRow, RowIssue>>,
    ) -> NormalizedCorpus {
        let mut corpus = NormalizedCorpus::default();

        for row in rows {
            let row = match row {
                Ok(row) => row,
                Err(issue) => {
                    corpus.rejected.push(issue);
                    continue;
                }
            };

            match self.normalize_row(&row) {
                Ok(Some(association)) => corpus.associations.push(association),
                Ok(None) => corpus.filtered += 1,
                Err(issue) => {
                    warn!("Rejected corpus row: {}", GenomeError::from(issue.clone()));
                    corpus.rejected.push(issue);
                }
            }
        }

        debug!(
            "Normalized {} associations ({} rejected, {} filtered)",
            corpus.associations.len(),
            corpus.rejected.len(),
            corpus.filtered
        );

        corpus
    }

    /// Normalize one row; `Ok(None)` means the row is not a variant entry
    pub fn normalize_row(
        &self,
        row: &RawAssociationRow,
    ) -> std::result::Result<Option<Association>, RowIssue> {
        let packed = row.rsid_genotypes.trim();
        if !packed.starts_with(VARIANT_PREFIX) {
            return Ok(None);
        }

        let captures = self.packed.captures(packed).ok_or_else(|| {
            RowIssue::new(row.line, format!("cannot extract rsid and alleles from '{}'", packed))
        })?;

        let association = Association {
            rsid_genotypes: packed.to_string(),
            magnitude: parse_number(row.magnitude.as_deref(), "magnitude", row.line)?,
            risk: parse_number(row.risk.as_deref(), "risk", row.line)?,
            notes: row.notes.clone().unwrap_or_default(),
            rsid: captures[1].to_lowercase(),
            allele1: captures[2].trim().to_ascii_uppercase(),
            allele2: captures[3].trim().to_ascii_uppercase(),
        };

        validate_shape(&association).map_err(|reason| RowIssue::new(row.line, reason))?;
        Ok(Some(association))
    }
}

fn parse_number(
    value: Option<&str>,
    column: &str,
    line: u64,
) -> std::result::Result<Option<f64>, RowIssue> {
    let Some(value) = value else {
        return Ok(None);
    };

    match value.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(RowIssue::new(
            line,
            format!("{} '{}' is not a finite number", column, value),
        )),
    }
}

/// Check an association against the persisted shape
pub fn validate_shape(association: &Association) -> std::result::Result<(), String> {
    if association.rsid_genotypes.is_empty() {
        return Err("empty rsid_genotypes key".to_string());
    }

    let rsid_digits = association.rsid.strip_prefix("rs").unwrap_or("");
    if rsid_digits.is_empty() || !rsid_digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("invalid rsid '{}'", association.rsid));
    }

    for (name, allele) in [("allele1", &association.allele1), ("allele2", &association.allele2)] {
        let mut chars = allele.chars();
        let valid = match (chars.next(), chars.next()) {
            (Some(c), None) => ALLELE_ALPHABET.contains(&c.to_ascii_uppercase()),
            _ => false,
        };
        if !valid {
            return Err(format!("{} '{}' is not a single allele", name, allele));
        }
    }

    Ok(())
}
