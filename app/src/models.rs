// ==============================================================================
// models.rs - Persisted Record Types
// ==============================================================================
// Description: Patients, genotype calls, associations and joined report rows
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};

/// Patient identity, one row per genome source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: String,
    /// Source file label the genome was loaded from
    pub patient_name: String,
}

/// One observed genotype at one SNP for one patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenotypeCall {
    pub patient_id: String,
    /// Lowercased rsid (join key)
    pub rsid: String,
    pub chromosome: String,
    pub position: u64,
    /// Two-character genotype (e.g., "AG")
    pub genotype: String,
}

/// Published finding linking one genotype at an rsid to a risk annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    /// Packed source key as published (e.g., "Rs1050828(A;G)")
    pub rsid_genotypes: String,
    pub magnitude: Option<f64>,
    pub risk: Option<f64>,
    pub notes: String,
    /// Lowercased rsid (join key)
    pub rsid: String,
    pub allele1: String,
    pub allele2: String,
}

/// Genotype call joined with its patient's identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedGenotypeCall {
    pub patient_id: String,
    pub patient_name: String,
    pub rsid: String,
    pub chromosome: String,
    pub position: u64,
    pub genotype: String,
}

/// Patient × genotype call × association, before match evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub call: ExpandedGenotypeCall,
    pub association: Association,
}

/// Full report row with the genotype match flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub patient_id: String,
    pub patient_name: String,
    pub rsid: String,
    pub chromosome: String,
    pub position: u64,
    pub genotype: String,
    pub rsid_genotypes: String,
    pub magnitude: Option<f64>,
    pub risk: Option<f64>,
    pub notes: String,
    pub allele1: String,
    pub allele2: String,
    pub genotype_match: bool,
}

/// Optional filters plus page offset, as supplied by a caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub patient_id: Option<String>,
    pub variant_id: Option<String>,
    #[serde(default)]
    pub offset: u32,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patient(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }

    pub fn variant(mut self, variant_id: impl Into<String>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_filter_builder() {
        let filter = QueryFilter::new().patient("p1").variant("rs1").offset(25);
        assert_eq!(filter.patient_id.as_deref(), Some("p1"));
        assert_eq!(filter.variant_id.as_deref(), Some("rs1"));
        assert_eq!(filter.offset, 25);

        assert_eq!(QueryFilter::new(), QueryFilter::default());
    }

    #[test]
    fn test_report_row_serde() {
        let row = ReportRow {
            patient_id: "p1".to_string(),
            patient_name: "genome.txt".to_string(),
            rsid: "rs1050828".to_string(),
            chromosome: "1".to_string(),
            position: 1000,
            genotype: "AG".to_string(),
            rsid_genotypes: "Rs1050828(A;G)".to_string(),
            magnitude: Some(2.5),
            risk: None,
            notes: String::new(),
            allele1: "A".to_string(),
            allele2: "G".to_string(),
            genotype_match: true,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["genotype_match"], true);
        assert!(json["risk"].is_null());
    }
}
