// ==============================================================================
// error.rs - Classified Error Kinds
// ==============================================================================
// Description: The four error kinds surfaced by ingestion, storage and queries
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Which query filter produced an empty result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "filter", rename_all = "snake_case")]
pub enum NotFoundFilter {
    /// No filter was supplied and nothing is loaded
    Unfiltered,
    Patient { patient_id: String },
    Variant { rsid: String },
    PatientAndVariant { patient_id: String, rsid: String },
}

impl NotFoundFilter {
    pub fn from_parts(patient_id: Option<&str>, rsid: Option<&str>) -> Self {
        match (patient_id, rsid) {
            (None, None) => NotFoundFilter::Unfiltered,
            (Some(p), None) => NotFoundFilter::Patient {
                patient_id: p.to_string(),
            },
            (None, Some(r)) => NotFoundFilter::Variant {
                rsid: r.to_string(),
            },
            (Some(p), Some(r)) => NotFoundFilter::PatientAndVariant {
                patient_id: p.to_string(),
                rsid: r.to_string(),
            },
        }
    }
}

impl fmt::Display for NotFoundFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundFilter::Unfiltered => write!(f, "no records loaded"),
            NotFoundFilter::Patient { patient_id } => {
                write!(f, "no match for patient_id '{}'", patient_id)
            }
            NotFoundFilter::Variant { rsid } => write!(f, "no match for rsid '{}'", rsid),
            NotFoundFilter::PatientAndVariant { patient_id, rsid } => write!(
                f,
                "no match for patient_id '{}' with rsid '{}'",
                patient_id, rsid
            ),
        }
    }
}

/// Errors raised by the genome search library
#[derive(Error, Debug)]
pub enum GenomeError {
    /// Input file could not be opened, decoded or lacks its expected layout
    #[error("Malformed input '{source_label}': {details}")]
    MalformedInput {
        source_label: String,
        details: String,
    },

    /// A single record failed its shape contract
    #[error("Validation failed at line {line}: {reason}")]
    Validation { line: u64, reason: String },

    /// A query's filters matched zero rows
    #[error("Not found ({what}): {filter}")]
    NotFound {
        what: &'static str,
        filter: NotFoundFilter,
    },

    /// Storage-layer failure (write conflict, I/O fault, lock poisoning)
    #[error("Storage operation failed: {0}")]
    ConflictWrite(String),
}

impl GenomeError {
    pub fn malformed(source_label: impl Into<String>, details: impl fmt::Display) -> Self {
        GenomeError::MalformedInput {
            source_label: source_label.into(),
            details: details.to_string(),
        }
    }

    pub fn not_found(what: &'static str, patient_id: Option<&str>, rsid: Option<&str>) -> Self {
        GenomeError::NotFound {
            what,
            filter: NotFoundFilter::from_parts(patient_id, rsid),
        }
    }
}

impl From<rusqlite::Error> for GenomeError {
    fn from(e: rusqlite::Error) -> Self {
        GenomeError::ConflictWrite(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GenomeError>;

/// A per-row problem recorded during bulk ingestion
///
/// Bulk loads collect these instead of raising; converting one yields the
/// `GenomeError::Validation` kind, which is how rejected rows are logged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowIssue {
    pub line: u64,
    pub reason: String,
}

impl RowIssue {
    pub fn new(line: u64, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

impl From<RowIssue> for GenomeError {
    fn from(issue: RowIssue) -> Self {
        GenomeError::Validation {
            line: issue.line,
            reason: issue.reason,
        }
    }
}
