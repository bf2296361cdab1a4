// ==============================================================================
// matcher.rs - Genotype Match Engine
// ==============================================================================
// Description: Joins patient genotype calls with published associations and
//              flags which documented risk genotypes the patient carries
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// Algorithm:
//   Given a call genotype G and an association pair (A1, A2):
//   - match if G == A1+A2 or G == A2+A1 (allele order is not significant)
//   - AG vs (A;G) → true, GA vs (A;G) → true, AG vs (A;T) → false
//   Non-matching joined rows are returned with the flag cleared.
// ==============================================================================

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::models::{JoinedRow, ReportRow};
use crate::store::{GenomeStore, PageRequest};

/// Order-independent comparison of a call against a documented allele pair
///
/// # Examples
/// ```
/// use genome_search::matcher::genotype_matches;
///
/// assert!(genotype_matches("AG", "A", "G"));
/// assert!(genotype_matches("GA", "A", "G"));
/// assert!(!genotype_matches("AG", "A", "T"));
/// ```
pub fn genotype_matches(genotype: &str, allele1: &str, allele2: &str) -> bool {
    genotype == format!("{}{}", allele1, allele2) || genotype == format!("{}{}", allele2, allele1)
}

/// Computes full report rows from the store; recomputes the join per call
#[derive(Clone)]
pub struct MatchEngine {
    store: Arc<GenomeStore>,
}

impl MatchEngine {
    pub fn new(store: Arc<GenomeStore>) -> Self {
        Self { store }
    }

    /// One page of patient × call × association rows with the match flag
    pub fn report(&self, page: &PageRequest) -> Result<Vec<ReportRow>> {
        let rows: Vec<ReportRow> = self
            .store
            .joined_rows(page)?
            .into_iter()
            .map(evaluate)
            .collect();

        debug!(
            "Report page at offset {}: {} rows, {} matches",
            page.offset,
            rows.len(),
            rows.iter().filter(|r| r.genotype_match).count()
        );

        Ok(rows)
    }
}

fn evaluate(row: JoinedRow) -> ReportRow {
    let JoinedRow { call, association } = row;
    let genotype_match =
        genotype_matches(&call.genotype, &association.allele1, &association.allele2);

    ReportRow {
        patient_id: call.patient_id,
        patient_name: call.patient_name,
        rsid: call.rsid,
        chromosome: call.chromosome,
        position: call.position,
        genotype: call.genotype,
        rsid_genotypes: association.rsid_genotypes,
        magnitude: association.magnitude,
        risk: association.risk,
        notes: association.notes,
        allele1: association.allele1,
        allele2: association.allele2,
        genotype_match,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Association;
    use crate::parsers::Genome23Record;

    #[test]
    fn test_match_is_order_independent() {
        assert!(genotype_matches("AG", "A", "G"));
        assert!(genotype_matches("AG", "G", "A"));
        assert!(genotype_matches("GA", "A", "G"));
        assert!(genotype_matches("TT", "T", "T"));
    }

    #[test]
    fn test_mismatches() {
        assert!(!genotype_matches("AG", "A", "T"));
        assert!(!genotype_matches("AA", "A", "G"));
        assert!(!genotype_matches("--", "A", "G"));
        assert!(!genotype_matches("A", "A", "G"));
        assert!(!genotype_matches("", "A", "G"));
    }

    #[test]
    fn test_report_flags_each_joined_row() {
        let store = Arc::new(GenomeStore::in_memory().unwrap());
        store
            .ingest_genome_batch(
                &[Genome23Record {
                    rsid: "rs1050828".to_string(),
                    chromosome: "1".to_string(),
                    position: 1000,
                    genotype: "GA".to_string(),
                }],
                "p1",
                "genome.txt",
            )
            .unwrap();

        let assoc = |key: &str, a1: &str, a2: &str| Association {
            rsid_genotypes: key.to_string(),
            magnitude: Some(1.0),
            risk: Some(1.0),
            notes: String::new(),
            rsid: "rs1050828".to_string(),
            allele1: a1.to_string(),
            allele2: a2.to_string(),
        };
        store
            .ingest_association_batch(&[
                assoc("Rs1050828(A;A)", "A", "A"),
                assoc("Rs1050828(A;G)", "A", "G"),
            ])
            .unwrap();

        let engine = MatchEngine::new(store);
        let rows = engine.report(&PageRequest::default()).unwrap();

        assert_eq!(rows.len(), 2);
        let flags: Vec<(&str, bool)> = rows
            .iter()
            .map(|r| (r.rsid_genotypes.as_str(), r.genotype_match))
            .collect();
        assert_eq!(
            flags,
            vec![("Rs1050828(A;A)", false), ("Rs1050828(A;G)", true)]
        );
    }
}
