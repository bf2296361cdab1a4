// ==============================================================================
// query.rs - Query Service
// ==============================================================================
// Description: Filtered, paginated reads over patients, genotype calls,
//              associations and the full match report
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// Filter resolution (applied before any store access):
//   - values are trimmed; blank values mean "no filter"
//   - variant "default" → configured demo rsid, then lowercased
//   - patient "default" → configured demo patient_id
//   - an empty page is reported as NotFound naming the resolved filters
// ==============================================================================

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{Settings, SENTINEL};
use crate::error::{GenomeError, Result};
use crate::matcher::MatchEngine;
use crate::models::{Association, ExpandedGenotypeCall, GenotypeCall, Patient, QueryFilter, ReportRow};
use crate::store::{GenomeStore, PageRequest, StoreStats};

/// Read-side entry point; cheap to clone and safe to share across tasks
#[derive(Clone)]
pub struct QueryService {
    store: Arc<GenomeStore>,
    engine: MatchEngine,
    default_variant_id: String,
    default_patient_id: String,
}

impl QueryService {
    pub fn new(store: Arc<GenomeStore>, settings: &Settings) -> Self {
        Self {
            engine: MatchEngine::new(Arc::clone(&store)),
            store,
            default_variant_id: settings.default_variant_id.to_lowercase(),
            default_patient_id: settings.default_patient_id.clone(),
        }
    }

    /// Resolve caller filters into the store's page request
    pub fn resolve(&self, filter: &QueryFilter) -> PageRequest {
        let patient_id = clean(filter.patient_id.as_deref()).map(|p| {
            if p == SENTINEL {
                self.default_patient_id.clone()
            } else {
                p.to_string()
            }
        });

        let rsid = clean(filter.variant_id.as_deref()).map(|v| {
            if v == SENTINEL {
                self.default_variant_id.clone()
            } else {
                v.to_lowercase()
            }
        });

        PageRequest {
            patient_id,
            rsid,
            offset: filter.offset,
        }
    }

    pub fn patients(&self, filter: &QueryFilter) -> Result<Vec<Patient>> {
        let page = self.resolve(filter);
        non_empty("patients", &page, self.store.patients(&page)?)
    }

    pub fn associations(&self, filter: &QueryFilter) -> Result<Vec<Association>> {
        let page = self.resolve(filter);
        non_empty("associations", &page, self.store.associations(&page)?)
    }

    pub fn genotype_calls(&self, filter: &QueryFilter) -> Result<Vec<GenotypeCall>> {
        let page = self.resolve(filter);
        non_empty("genotype calls", &page, self.store.genotype_calls(&page)?)
    }

    pub fn expanded_genotype_calls(&self, filter: &QueryFilter) -> Result<Vec<ExpandedGenotypeCall>> {
        let page = self.resolve(filter);
        non_empty(
            "expanded genotype calls",
            &page,
            self.store.expanded_genotype_calls(&page)?,
        )
    }

    /// Patient × call × association rows with `genotype_match` computed
    ///
    /// # Arguments
    /// * `filter` - Optional patient and variant (either may be "default")
    ///   plus the page offset
    ///
    /// # Returns
    /// * `Ok(rows)` - Up to 25 rows ordered by patient, rsid and packed key
    /// * `Err(GenomeError::NotFound)` - Nothing matched; names the resolved filters
    pub fn full_report(&self, filter: &QueryFilter) -> Result<Vec<ReportRow>> {
        let page = self.resolve(filter);
        let rows = non_empty("report", &page, self.engine.report(&page)?)?;

        info!(
            "Report page returned {} rows ({} matches)",
            rows.len(),
            rows.iter().filter(|r| r.genotype_match).count()
        );
        Ok(rows)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.store.stats()
    }
}

fn clean(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn non_empty<T>(what: &'static str, page: &PageRequest, rows: Vec<T>) -> Result<Vec<T>> {
    if rows.is_empty() {
        debug!("Empty {} page at offset {}", what, page.offset);
        return Err(GenomeError::not_found(
            what,
            page.patient_id.as_deref(),
            page.rsid.as_deref(),
        ));
    }
    Ok(rows)
}
