// ==============================================================================
// store.rs - Genome Store (SQLite)
// ==============================================================================
// Description: Durable storage for patients, genotype calls and associations
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// Concurrency:
//   - one writer connection behind a mutex; every mutation is serialized
//   - file-backed stores run in WAL mode with a separate read-only
//     connection, so queries see only committed batches and are not held
//     up by a long genome ingestion
//   - in-memory stores share the writer connection for reads
// ==============================================================================

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, Row};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{Settings, PAGE_SIZE};
use crate::error::{GenomeError, Result};
use crate::models::{Association, ExpandedGenotypeCall, GenotypeCall, JoinedRow, Patient};
use crate::parsers::Genome23Record;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS patients (
        patient_id TEXT PRIMARY KEY,
        patient_name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS genotype_calls (
        patient_id TEXT NOT NULL REFERENCES patients(patient_id),
        rsid TEXT NOT NULL,
        chromosome TEXT NOT NULL,
        position INTEGER NOT NULL CHECK (position >= 0),
        genotype TEXT NOT NULL,
        PRIMARY KEY (patient_id, rsid)
    );

    CREATE INDEX IF NOT EXISTS idx_genotype_calls_rsid ON genotype_calls (rsid);

    CREATE TABLE IF NOT EXISTS associations (
        rsid_genotypes TEXT PRIMARY KEY,
        magnitude REAL,
        risk REAL,
        notes TEXT NOT NULL DEFAULT '',
        rsid TEXT NOT NULL,
        allele1 TEXT NOT NULL,
        allele2 TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_associations_rsid ON associations (rsid);
";

const UPSERT_PATIENT_SQL: &str = "
    INSERT INTO patients (patient_id, patient_name)
    VALUES (?1, ?2)
    ON CONFLICT (patient_id) DO UPDATE SET patient_name = excluded.patient_name";

const UPSERT_GENOTYPE_CALL_SQL: &str = "
    INSERT INTO genotype_calls (patient_id, rsid, chromosome, position, genotype)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT (patient_id, rsid) DO UPDATE SET
        chromosome = excluded.chromosome,
        position = excluded.position,
        genotype = excluded.genotype";

const UPSERT_ASSOCIATION_SQL: &str = "
    INSERT INTO associations (rsid_genotypes, magnitude, risk, notes, rsid, allele1, allele2)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT (rsid_genotypes) DO UPDATE SET
        magnitude = excluded.magnitude,
        risk = excluded.risk,
        notes = excluded.notes,
        rsid = excluded.rsid,
        allele1 = excluded.allele1,
        allele2 = excluded.allele2";

const JOINED_SELECT_SQL: &str = "
    SELECT p.patient_id, p.patient_name, g.rsid, g.chromosome, g.position, g.genotype,
           a.rsid_genotypes, a.magnitude, a.risk, a.notes, a.rsid, a.allele1, a.allele2
    FROM patients p
    JOIN genotype_calls g ON g.patient_id = p.patient_id
    JOIN associations a ON a.rsid = g.rsid";

/// Filter predicates the store knows how to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterPredicate {
    Patient(String),
    Variant(String),
}

/// Row source a read is anchored on; decides how predicates bind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    /// `patients p`
    Patients,
    /// `genotype_calls g`, possibly joined with patients and associations
    GenotypeCalls,
    /// `associations a`
    Associations,
}

impl Relation {
    fn predicate_sql(self, predicate: &FilterPredicate) -> &'static str {
        match (self, predicate) {
            (Relation::Patients, FilterPredicate::Patient(_)) => "p.patient_id = ?",
            (Relation::Patients, FilterPredicate::Variant(_)) => {
                "EXISTS (SELECT 1 FROM genotype_calls g WHERE g.patient_id = p.patient_id AND g.rsid = ?)"
            }
            (Relation::GenotypeCalls, FilterPredicate::Patient(_)) => "g.patient_id = ?",
            (Relation::GenotypeCalls, FilterPredicate::Variant(_)) => "g.rsid = ?",
            (Relation::Associations, FilterPredicate::Patient(_)) => {
                "EXISTS (SELECT 1 FROM genotype_calls g WHERE g.rsid = a.rsid AND g.patient_id = ?)"
            }
            (Relation::Associations, FilterPredicate::Variant(_)) => "a.rsid = ?",
        }
    }
}

/// Resolved filters and page offset for one read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub patient_id: Option<String>,
    /// Lowercased rsid
    pub rsid: Option<String>,
    pub offset: u32,
}

impl PageRequest {
    pub fn predicates(&self) -> Vec<FilterPredicate> {
        let mut predicates = Vec::with_capacity(2);
        if let Some(patient_id) = &self.patient_id {
            predicates.push(FilterPredicate::Patient(patient_id.clone()));
        }
        if let Some(rsid) = &self.rsid {
            predicates.push(FilterPredicate::Variant(rsid.clone()));
        }
        predicates
    }
}

/// Row counts per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub patients: u64,
    pub genotype_calls: u64,
    pub associations: u64,
}

/// SQLite-backed store for the three record kinds
pub struct GenomeStore {
    writer: Mutex<Connection>,
    reader: Option<Mutex<Connection>>,
}

impl GenomeStore {
    /// Open (or create) a store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                GenomeError::ConflictWrite(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let writer = Connection::open(path)?;
        let journal_mode: String =
            writer.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        writer.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;
        writer.busy_timeout(BUSY_TIMEOUT)?;
        writer.execute_batch(SCHEMA_SQL)?;
        debug!("Store journal mode: {}", journal_mode);

        let reader = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        reader.busy_timeout(BUSY_TIMEOUT)?;

        info!("Opened genome store at {}", path.display());

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Some(Mutex::new(reader)),
        })
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            writer: Mutex::new(conn),
            reader: None,
        })
    }

    /// Open the store named by the settings (":memory:" stays in memory)
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        if settings.is_in_memory() {
            Self::in_memory()
        } else {
            Self::open(&settings.database_path)
        }
    }

    /// Re-run schema creation; safe on every start
    pub fn ensure_schema(&self) -> Result<()> {
        self.write_conn()?.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn write_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| GenomeError::ConflictWrite("store writer lock poisoned".to_string()))
    }

    fn read_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        match &self.reader {
            Some(reader) => reader
                .lock()
                .map_err(|_| GenomeError::ConflictWrite("store reader lock poisoned".to_string())),
            None => self.write_conn(),
        }
    }

    // --------------------------------------------------------------------------
    // Writes
    // --------------------------------------------------------------------------

    pub fn upsert_patient(&self, patient: &Patient) -> Result<()> {
        let conn = self.write_conn()?;
        upsert_patient(&conn, &patient.patient_id, &patient.patient_name)
    }

    pub fn upsert_genotype_call(&self, call: &GenotypeCall) -> Result<()> {
        let conn = self.write_conn()?;
        upsert_genotype_call(
            &conn,
            &call.patient_id,
            &call.rsid,
            &call.chromosome,
            call.position,
            &call.genotype,
        )
    }

    pub fn upsert_association(&self, association: &Association) -> Result<()> {
        let conn = self.write_conn()?;
        upsert_association(&conn, association)
    }

    /// Upsert the patient and all of its genotype calls as one transaction
    ///
    /// # Arguments
    /// * `rows` - Parsed genotype calls; a repeated rsid keeps its last row
    /// * `patient_id` - Owner of every call in the batch
    /// * `patient_name` - Source label stored on the patient row
    ///
    /// # Returns
    /// * `Ok(n)` - Number of distinct calls written (one per rsid)
    /// * `Err(GenomeError::ConflictWrite)` - Nothing from the batch is visible
    ///
    /// Readers on the WAL connection see either none of the batch or all of
    /// it, never a patient row without its calls.
    pub fn ingest_genome_batch(
        &self,
        rows: &[Genome23Record],
        patient_id: &str,
        patient_name: &str,
    ) -> Result<usize> {
        let mut conn = self.write_conn()?;
        let tx = conn.transaction()?;

        upsert_patient(&tx, patient_id, patient_name)?;
        for row in rows {
            upsert_genotype_call(
                &tx,
                patient_id,
                &row.rsid,
                &row.chromosome,
                row.position,
                &row.genotype,
            )?;
        }

        tx.commit()?;

        let distinct = rows
            .iter()
            .map(|row| row.rsid.as_str())
            .collect::<HashSet<_>>()
            .len();
        info!(
            "Committed {} genotype calls for patient {} ({} rows read)",
            distinct,
            patient_id,
            rows.len()
        );
        Ok(distinct)
    }

    /// Upsert every normalized association as one transaction
    pub fn ingest_association_batch(&self, rows: &[Association]) -> Result<usize> {
        let mut conn = self.write_conn()?;
        let tx = conn.transaction()?;

        for row in rows {
            upsert_association(&tx, row)?;
        }

        tx.commit()?;
        info!("Committed {} associations", rows.len());
        Ok(rows.len())
    }

    // --------------------------------------------------------------------------
    // Reads (25 rows per page)
    // --------------------------------------------------------------------------

    pub fn patients(&self, page: &PageRequest) -> Result<Vec<Patient>> {
        self.select_page(
            "SELECT p.patient_id, p.patient_name FROM patients p",
            Relation::Patients,
            "p.patient_id",
            page,
            |row| {
                Ok(Patient {
                    patient_id: row.get(0)?,
                    patient_name: row.get(1)?,
                })
            },
        )
    }

    pub fn genotype_calls(&self, page: &PageRequest) -> Result<Vec<GenotypeCall>> {
        self.select_page(
            "SELECT g.patient_id, g.rsid, g.chromosome, g.position, g.genotype FROM genotype_calls g",
            Relation::GenotypeCalls,
            "g.patient_id, g.rsid",
            page,
            |row| {
                Ok(GenotypeCall {
                    patient_id: row.get(0)?,
                    rsid: row.get(1)?,
                    chromosome: row.get(2)?,
                    position: row.get::<_, i64>(3)? as u64,
                    genotype: row.get(4)?,
                })
            },
        )
    }

    pub fn expanded_genotype_calls(&self, page: &PageRequest) -> Result<Vec<ExpandedGenotypeCall>> {
        self.select_page(
            "SELECT p.patient_id, p.patient_name, g.rsid, g.chromosome, g.position, g.genotype
             FROM patients p
             JOIN genotype_calls g ON g.patient_id = p.patient_id",
            Relation::GenotypeCalls,
            "g.patient_id, g.rsid",
            page,
            expanded_from_row,
        )
    }

    pub fn associations(&self, page: &PageRequest) -> Result<Vec<Association>> {
        self.select_page(
            "SELECT a.rsid_genotypes, a.magnitude, a.risk, a.notes, a.rsid, a.allele1, a.allele2
             FROM associations a",
            Relation::Associations,
            "a.rsid, a.rsid_genotypes",
            page,
            |row| association_from_row(row, 0),
        )
    }

    /// Patient ⋈ genotype calls ⋈ associations (on rsid), one page
    pub fn joined_rows(&self, page: &PageRequest) -> Result<Vec<JoinedRow>> {
        self.select_page(
            JOINED_SELECT_SQL,
            Relation::GenotypeCalls,
            "g.patient_id, g.rsid, a.rsid_genotypes",
            page,
            |row| {
                Ok(JoinedRow {
                    call: expanded_from_row(row)?,
                    association: association_from_row(row, 6)?,
                })
            },
        )
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.read_conn()?;
        let count = |table: &str| -> Result<u64> {
            let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?;
            Ok(n as u64)
        };

        Ok(StoreStats {
            patients: count("patients")?,
            genotype_calls: count("genotype_calls")?,
            associations: count("associations")?,
        })
    }

    fn select_page<T, F>(
        &self,
        base_sql: &str,
        relation: Relation,
        order_by: &str,
        page: &PageRequest,
        map_row: F,
    ) -> Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let predicates = page.predicates();
        let mut sql = base_sql.to_string();
        let mut values: Vec<Value> = Vec::with_capacity(predicates.len() + 2);

        if !predicates.is_empty() {
            let clauses: Vec<&str> = predicates
                .iter()
                .map(|p| relation.predicate_sql(p))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        for predicate in predicates {
            match predicate {
                FilterPredicate::Patient(v) | FilterPredicate::Variant(v) => {
                    values.push(Value::Text(v))
                }
            }
        }

        sql.push_str(&format!(" ORDER BY {} LIMIT ? OFFSET ?", order_by));
        values.push(Value::Integer(i64::from(PAGE_SIZE)));
        values.push(Value::Integer(i64::from(page.offset)));

        debug!("Store query: {} ({} params)", sql.trim(), values.len());

        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), map_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn upsert_patient(conn: &Connection, patient_id: &str, patient_name: &str) -> Result<()> {
    conn.prepare_cached(UPSERT_PATIENT_SQL)?
        .execute(params![patient_id, patient_name])?;
    Ok(())
}

fn upsert_genotype_call(
    conn: &Connection,
    patient_id: &str,
    rsid: &str,
    chromosome: &str,
    position: u64,
    genotype: &str,
) -> Result<()> {
    let position = i64::try_from(position).map_err(|_| {
        GenomeError::ConflictWrite(format!("position {} out of range for {}", position, rsid))
    })?;

    conn.prepare_cached(UPSERT_GENOTYPE_CALL_SQL)?
        .execute(params![patient_id, rsid, chromosome, position, genotype])?;
    Ok(())
}

fn upsert_association(conn: &Connection, a: &Association) -> Result<()> {
    conn.prepare_cached(UPSERT_ASSOCIATION_SQL)?.execute(params![
        a.rsid_genotypes,
        a.magnitude,
        a.risk,
        a.notes,
        a.rsid,
        a.allele1,
        a.allele2
    ])?;
    Ok(())
}

fn expanded_from_row(row: &Row<'_>) -> rusqlite::Result<ExpandedGenotypeCall> {
    Ok(ExpandedGenotypeCall {
        patient_id: row.get(0)?,
        patient_name: row.get(1)?,
        rsid: row.get(2)?,
        chromosome: row.get(3)?,
        position: row.get::<_, i64>(4)? as u64,
        genotype: row.get(5)?,
    })
}

fn association_from_row(row: &Row<'_>, start: usize) -> rusqlite::Result<Association> {
    Ok(Association {
        rsid_genotypes: row.get(start)?,
        magnitude: row.get(start + 1)?,
        risk: row.get(start + 2)?,
        notes: row.get(start + 3)?,
        rsid: row.get(start + 4)?,
        allele1: row.get(start + 5)?,
        allele2: row.get(start + 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(rsid: &str, genotype: &str) -> Genome23Record {
        Genome23Record {
            rsid: rsid.to_string(),
            chromosome: "1".to_string(),
            position: 1000,
            genotype: genotype.to_string(),
        }
    }

    fn association(key: &str, rsid: &str, a1: &str, a2: &str) -> Association {
        Association {
            rsid_genotypes: key.to_string(),
            magnitude: Some(2.5),
            risk: Some(1.0),
            notes: "note".to_string(),
            rsid: rsid.to_string(),
            allele1: a1.to_string(),
            allele2: a2.to_string(),
        }
    }

    #[test]
    fn test_schema_creation_is_idempotent() {
        let store = GenomeStore::in_memory().unwrap();
        store.ensure_schema().unwrap();
        store.ensure_schema().unwrap();
        assert_eq!(store.stats().unwrap(), StoreStats::default());
    }

    #[test]
    fn test_upsert_patient_overwrites_name() {
        let store = GenomeStore::in_memory().unwrap();
        store
            .upsert_patient(&Patient {
                patient_id: "patient1".to_string(),
                patient_name: "first.txt".to_string(),
            })
            .unwrap();
        store
            .upsert_patient(&Patient {
                patient_id: "patient1".to_string(),
                patient_name: "second.txt".to_string(),
            })
            .unwrap();

        let patients = store.patients(&PageRequest::default()).unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].patient_name, "second.txt");
    }

    #[test]
    fn test_upsert_genotype_call_last_write_wins() {
        let store = GenomeStore::in_memory().unwrap();
        store.ingest_genome_batch(&[record("rs1", "AA")], "p1", "genome.txt").unwrap();
        store
            .upsert_genotype_call(&GenotypeCall {
                patient_id: "p1".to_string(),
                rsid: "rs1".to_string(),
                chromosome: "2".to_string(),
                position: 42,
                genotype: "AG".to_string(),
            })
            .unwrap();

        let calls = store.genotype_calls(&PageRequest::default()).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].chromosome, "2");
        assert_eq!(calls[0].position, 42);
        assert_eq!(calls[0].genotype, "AG");
    }

    #[test]
    fn test_genome_batch_is_idempotent() {
        let store = GenomeStore::in_memory().unwrap();
        let rows = vec![record("rs1", "AA"), record("rs2", "CT"), record("rs3", "GG")];

        store.ingest_genome_batch(&rows, "p1", "genome.txt").unwrap();
        store.ingest_genome_batch(&rows, "p1", "genome.txt").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.patients, 1);
        assert_eq!(stats.genotype_calls, 3);
    }

    #[test]
    fn test_association_batch_is_idempotent() {
        let store = GenomeStore::in_memory().unwrap();
        let rows = vec![
            association("Rs1(A;A)", "rs1", "A", "A"),
            association("Rs1(A;G)", "rs1", "A", "G"),
        ];

        store.ingest_association_batch(&rows).unwrap();
        let once = store.associations(&PageRequest::default()).unwrap();
        store.ingest_association_batch(&rows).unwrap();
        let twice = store.associations(&PageRequest::default()).unwrap();

        assert_eq!(once.len(), 2);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_upsert_association_updates_fields() {
        let store = GenomeStore::in_memory().unwrap();
        store.upsert_association(&association("Rs1(A;A)", "rs1", "A", "A")).unwrap();

        let mut updated = association("Rs1(A;A)", "rs1", "A", "A");
        updated.magnitude = None;
        updated.notes = "revised".to_string();
        store.upsert_association(&updated).unwrap();

        let rows = store.associations(&PageRequest::default()).unwrap();
        assert_eq!(rows, vec![updated]);
    }

    #[test]
    fn test_filters_are_independent_dimensions() {
        let store = GenomeStore::in_memory().unwrap();
        store
            .ingest_genome_batch(&[record("rs1", "AA"), record("rs2", "CT")], "p1", "a.txt")
            .unwrap();
        store.ingest_genome_batch(&[record("rs2", "CC")], "p2", "b.txt").unwrap();

        let by_patient = PageRequest {
            patient_id: Some("p1".to_string()),
            ..Default::default()
        };
        assert_eq!(store.genotype_calls(&by_patient).unwrap().len(), 2);

        let by_variant = PageRequest {
            rsid: Some("rs2".to_string()),
            ..Default::default()
        };
        assert_eq!(store.genotype_calls(&by_variant).unwrap().len(), 2);
        assert_eq!(store.patients(&by_variant).unwrap().len(), 2);

        let both = PageRequest {
            patient_id: Some("p2".to_string()),
            rsid: Some("rs1".to_string()),
            offset: 0,
        };
        assert!(store.genotype_calls(&both).unwrap().is_empty());

        assert_eq!(store.genotype_calls(&PageRequest::default()).unwrap().len(), 3);
    }

    #[test]
    fn test_associations_filtered_by_patient() {
        let store = GenomeStore::in_memory().unwrap();
        store.ingest_genome_batch(&[record("rs1", "AA")], "p1", "a.txt").unwrap();
        store
            .ingest_association_batch(&[
                association("Rs1(A;A)", "rs1", "A", "A"),
                association("Rs9(C;C)", "rs9", "C", "C"),
            ])
            .unwrap();

        let page = PageRequest {
            patient_id: Some("p1".to_string()),
            ..Default::default()
        };
        let rows = store.associations(&page).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rsid, "rs1");
    }

    #[test]
    fn test_pagination_windows_are_disjoint() {
        let store = GenomeStore::in_memory().unwrap();
        let rows: Vec<Genome23Record> = (0..30)
            .map(|i| record(&format!("rs{:03}", i), "AA"))
            .collect();
        store.ingest_genome_batch(&rows, "p1", "genome.txt").unwrap();

        let first = store.genotype_calls(&PageRequest::default()).unwrap();
        let second = store
            .genotype_calls(&PageRequest {
                offset: 25,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(first.len(), 25);
        assert_eq!(second.len(), 5);

        let all: std::collections::BTreeSet<String> =
            first.iter().chain(second.iter()).map(|c| c.rsid.clone()).collect();
        assert_eq!(all.len(), 30);
    }

    #[test]
    fn test_filter_values_are_bound_not_spliced() {
        let store = GenomeStore::in_memory().unwrap();
        store.ingest_genome_batch(&[record("rs1", "AA")], "p1", "a.txt").unwrap();

        let page = PageRequest {
            patient_id: Some("p1' OR '1'='1".to_string()),
            ..Default::default()
        };
        assert!(store.patients(&page).unwrap().is_empty());
        assert_eq!(store.stats().unwrap().patients, 1);
    }

    #[test]
    fn test_joined_rows_fan_out_per_association() {
        let store = GenomeStore::in_memory().unwrap();
        store.ingest_genome_batch(&[record("rs1", "AG")], "p1", "a.txt").unwrap();
        store
            .ingest_association_batch(&[
                association("Rs1(A;A)", "rs1", "A", "A"),
                association("Rs1(A;G)", "rs1", "A", "G"),
                association("Rs1(G;G)", "rs1", "G", "G"),
            ])
            .unwrap();

        let rows = store.joined_rows(&PageRequest::default()).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.call.patient_name == "a.txt"));
    }

    #[test]
    fn test_genome_batch_counts_distinct_calls() {
        let store = GenomeStore::in_memory().unwrap();
        let rows = vec![record("rs1", "AA"), record("rs2", "CT"), record("rs1", "AG")];

        assert_eq!(store.ingest_genome_batch(&rows, "p1", "genome.txt").unwrap(), 2);

        let calls = store.genotype_calls(&PageRequest::default()).unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].genotype, "AG");
    }

    #[test]
    fn test_open_batch_is_invisible_to_readers() {
        let dir = tempfile::tempdir().unwrap();
        let store = GenomeStore::open(dir.path().join("genome.db")).unwrap();

        {
            let mut conn = store.write_conn().unwrap();
            let tx = conn.transaction().unwrap();
            upsert_patient(&tx, "p1", "genome.txt").unwrap();
            for i in 0..200u64 {
                upsert_genotype_call(&tx, "p1", &format!("rs{}", i), "1", i, "AA").unwrap();
            }

            // Patient row and calls are both pending
            assert_eq!(store.stats().unwrap(), StoreStats::default());
            assert!(store.patients(&PageRequest::default()).unwrap().is_empty());
            assert!(store.genotype_calls(&PageRequest::default()).unwrap().is_empty());

            tx.commit().unwrap();
        }

        let stats = store.stats().unwrap();
        assert_eq!(stats.patients, 1);
        assert_eq!(stats.genotype_calls, 200);
    }

    #[test]
    fn test_concurrent_reader_never_sees_partial_patient() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(GenomeStore::open(dir.path().join("genome.db")).unwrap());
        let rows: Vec<Genome23Record> = (0..5000)
            .map(|i| record(&format!("rs{}", i), "CT"))
            .collect();

        let writer = {
            let store = std::sync::Arc::clone(&store);
            std::thread::spawn(move || store.ingest_genome_batch(&rows, "p1", "big.txt").unwrap())
        };

        let reader = store.reader.as_ref().unwrap();
        loop {
            let (patients, calls): (i64, i64) = reader
                .lock()
                .unwrap()
                .query_row(
                    "SELECT (SELECT COUNT(*) FROM patients), (SELECT COUNT(*) FROM genotype_calls)",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .unwrap();

            if patients == 0 {
                assert_eq!(calls, 0);
                if writer.is_finished() {
                    break;
                }
            } else {
                assert_eq!(calls, 5000);
                break;
            }
        }

        assert_eq!(writer.join().unwrap(), 5000);
        assert_eq!(store.stats().unwrap().genotype_calls, 5000);
    }

    #[test]
    fn test_file_backed_store_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("genome.db");

        {
            let store = GenomeStore::open(&path).unwrap();
            store.ingest_genome_batch(&[record("rs1", "AA")], "p1", "a.txt").unwrap();
        }

        let store = GenomeStore::open(&path).unwrap();
        assert_eq!(store.stats().unwrap().genotype_calls, 1);
        assert_eq!(store.patients(&PageRequest::default()).unwrap().len(), 1);
    }
}
