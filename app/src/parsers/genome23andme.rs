// ==============================================================================
// genome23andme.rs - Genotype Call File Parser
// ==============================================================================
// Description: Parser for headerless, tab-delimited raw genotype files
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// Format: Tab-delimited text with comment lines
// Example:
//   # rsid    chromosome    position    genotype
//   rs548049170    1    69869    TT
//   rs13328684    1    74792    --
//   rs9283150    1    565508    AA
// ==============================================================================

use std::io::BufRead;
use std::path::Path;

use tracing::{debug, info, warn};

use super::open_reader;
use crate::error::{GenomeError, Result, RowIssue};

/// Named column of a genotype call file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenomeColumn {
    Rsid,
    Chromosome,
    Position,
    Genotype,
}

impl GenomeColumn {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "rsid" => Some(GenomeColumn::Rsid),
            "chromosome" => Some(GenomeColumn::Chromosome),
            "position" => Some(GenomeColumn::Position),
            "genotype" => Some(GenomeColumn::Genotype),
            _ => None,
        }
    }
}

/// Default positional layout: rsid, chromosome, position, genotype
pub const DEFAULT_COLUMNS: [GenomeColumn; 4] = [
    GenomeColumn::Rsid,
    GenomeColumn::Chromosome,
    GenomeColumn::Position,
    GenomeColumn::Genotype,
];

/// One parsed genotype call
#[derive(Debug, Clone, PartialEq)]
pub struct Genome23Record {
    /// SNP identifier, lowercased (e.g., "rs548049170")
    pub rsid: String,
    /// Chromosome ("1"-"22", "X", "Y", "MT")
    pub chromosome: String,
    /// Base pair position
    pub position: u64,
    /// Two-letter genotype, uppercased (e.g., "TT", "AG", "--" for no-call)
    pub genotype: String,
}

/// Result of parsing one genotype file
#[derive(Debug, Default)]
pub struct GenomeParse {
    pub records: Vec<Genome23Record>,
    /// Data lines that were skipped, with the reason
    pub skipped: Vec<RowIssue>,
}

/// Parser for raw genotype call files
#[derive(Debug, Clone)]
pub struct Genome23Parser {
    columns: [GenomeColumn; 4],
    /// Chromosomes to include; empty includes all
    pub include_chromosomes: Vec<String>,
}

impl Default for Genome23Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Genome23Parser {
    /// Create a new parser with the default column layout
    pub fn new() -> Self {
        Self {
            columns: DEFAULT_COLUMNS,
            include_chromosomes: Vec::new(),
        }
    }

    /// Create a parser for a caller-supplied column order
    pub fn with_columns(names: &[&str]) -> Result<Self> {
        let columns: Vec<GenomeColumn> = names
            .iter()
            .map(|name| {
                GenomeColumn::from_name(name).ok_or_else(|| {
                    GenomeError::malformed("column layout", format!("unknown column '{}'", name))
                })
            })
            .collect::<Result<_>>()?;

        let columns: [GenomeColumn; 4] = columns.try_into().map_err(|cols: Vec<GenomeColumn>| {
            GenomeError::malformed(
                "column layout",
                format!("expected 4 columns, got {}", cols.len()),
            )
        })?;

        for required in DEFAULT_COLUMNS {
            if !columns.contains(&required) {
                return Err(GenomeError::malformed(
                    "column layout",
                    format!("missing column {:?}", required),
                ));
            }
        }

        Ok(Self {
            columns,
            include_chromosomes: Vec::new(),
        })
    }

    /// Only include autosomal chromosomes (1-22)
    pub fn autosomal_only(mut self) -> Self {
        self.include_chromosomes = (1..=22).map(|n| n.to_string()).collect();
        self
    }

    /// Only include the given chromosomes
    pub fn with_chromosomes(mut self, chromosomes: Vec<String>) -> Self {
        self.include_chromosomes = chromosomes;
        self
    }

    /// Parse a genotype file
    ///
    /// # Arguments
    /// * `path` - Raw genotype file (genome_*.txt, optionally .gz)
    ///
    /// # Returns
    /// * `Ok(GenomeParse)` - Parsed calls plus the data lines that were skipped
    /// * `Err(GenomeError::MalformedInput)` - Unreadable file or no data rows
    ///
    /// # Format
    /// Tab-delimited, four columns in the parser's layout (default order):
    /// - rsid: SNP identifier, stored lowercased
    /// - chromosome: "1"-"22", "X", "Y" or "MT"
    /// - position: Base pair position
    /// - genotype: Exactly two characters, stored uppercased
    ///
    /// Lines starting with '#' and blank lines are ignored. Calls outside
    /// `include_chromosomes` are dropped without being recorded as skipped.
    pub fn parse(&self, path: impl AsRef<Path>) -> Result<GenomeParse> {
        let path = path.as_ref();
        let label = path.display().to_string();
        info!("Parsing genotype file: {}", label);

        let reader = open_reader(path)?;
        let mut parsed = GenomeParse::default();
        let mut line_number: u64 = 0;

        for line_result in reader.lines() {
            line_number += 1;
            let line = line_result.map_err(|e| GenomeError::malformed(label.clone(), e))?;

            let trimmed = line.trim();
            if trimmed.starts_with('#') || trimmed.is_empty() {
                continue;
            }

            match self.parse_line(&line, line_number) {
                Ok(record) => {
                    if !self.include_chromosomes.is_empty()
                        && !self.include_chromosomes.contains(&record.chromosome)
                    {
                        continue;
                    }
                    parsed.records.push(record);
                }
                Err(issue) => {
                    warn!("Skipping line {} of {}: {}", issue.line, label, issue.reason);
                    parsed.skipped.push(issue);
                }
            }
        }

        if parsed.records.is_empty() {
            return Err(GenomeError::malformed(
                label,
                "file is empty or contains only comments",
            ));
        }

        debug!(
            "Parsed {} genotype calls ({} skipped) from {}",
            parsed.records.len(),
            parsed.skipped.len(),
            label
        );

        Ok(parsed)
    }

    fn field<'a>(&self, fields: &[&'a str], column: GenomeColumn) -> &'a str {
        let idx = self.columns.iter().position(|c| *c == column).unwrap_or(0);
        fields[idx].trim()
    }

    fn parse_line(&self, line: &str, line_number: u64) -> std::result::Result<Genome23Record, RowIssue> {
        let fields: Vec<&str> = line.split('\t').collect();

        if fields.len() != 4 {
            return Err(RowIssue::new(
                line_number,
                format!("expected 4 tab-delimited fields, found {}", fields.len()),
            ));
        }

        let field = |column: GenomeColumn| self.field(&fields, column);

        let rsid = field(GenomeColumn::Rsid).to_ascii_lowercase();
        if rsid.is_empty() {
            return Err(RowIssue::new(line_number, "empty rsid"));
        }

        let position_str = field(GenomeColumn::Position);
        let position = position_str.parse::<u64>().map_err(|_| {
            RowIssue::new(line_number, format!("invalid position '{}'", position_str))
        })?;

        let genotype = field(GenomeColumn::Genotype).to_ascii_uppercase();
        if genotype.chars().count() != 2 {
            return Err(RowIssue::new(
                line_number,
                format!("genotype '{}' is not two characters", genotype),
            ));
        }

        Ok(Genome23Record {
            rsid,
            chromosome: field(GenomeColumn::Chromosome).to_string(),
            position,
            genotype,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Create a temporary test file with sample genotype data
    fn create_test_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_valid_file() {
        let contents = "\
# rsid\tchromosome\tposition\tgenotype
rs548049170\t1\t69869\tTT
rs13328684\t1\t74792\t--
RS9283150\t1\t565508\taa
rs12345678\t2\t100000\tAG
";
        let file = create_test_file(contents);
        let parsed = Genome23Parser::new().parse(file.path()).unwrap();

        assert_eq!(parsed.records.len(), 4);
        assert!(parsed.skipped.is_empty());

        assert_eq!(parsed.records[0].rsid, "rs548049170");
        assert_eq!(parsed.records[0].chromosome, "1");
        assert_eq!(parsed.records[0].position, 69869);
        assert_eq!(parsed.records[0].genotype, "TT");

        // No-call is kept as-is
        assert_eq!(parsed.records[1].genotype, "--");

        // rsid lowercased, genotype uppercased
        assert_eq!(parsed.records[2].rsid, "rs9283150");
        assert_eq!(parsed.records[2].genotype, "AA");
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let contents = "\
# rsid\tchromosome\tposition\tgenotype
rs1\t1\t100\tAA
rs2\t1\tNOT_A_NUMBER\tTT
rs3\t1\t300
rs4\tX\t400\tA
rs5\t2\t500\tCT
";
        let file = create_test_file(contents);
        let parsed = Genome23Parser::new().parse(file.path()).unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[1].rsid, "rs5");

        let lines: Vec<u64> = parsed.skipped.iter().map(|i| i.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
        assert!(parsed.skipped[0].reason.contains("NOT_A_NUMBER"));
    }

    #[test]
    fn test_parse_with_chromosome_filter() {
        let contents = "\
rs548049170\t1\t69869\tTT
rs12345678\t2\t100000\tAG
rs98765432\t3\t200000\tCC
";
        let file = create_test_file(contents);
        let parser = Genome23Parser::new().with_chromosomes(vec!["1".to_string(), "3".to_string()]);

        let parsed = parser.parse(file.path()).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].chromosome, "1");
        assert_eq!(parsed.records[1].chromosome, "3");
    }

    #[test]
    fn test_autosomal_only() {
        let contents = "\
rs548049170\t1\t69869\tTT
rs12345678\tX\t100000\tAG
rs98765432\t22\t200000\tCC
rs22222222\tMT\t400000\tAA
";
        let file = create_test_file(contents);
        let parsed = Genome23Parser::new().autosomal_only().parse(file.path()).unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[1].chromosome, "22");
    }

    #[test]
    fn test_custom_column_order() {
        let contents = "GT\t1\trs777\t1234\n";
        let file = create_test_file(contents);
        let parser =
            Genome23Parser::with_columns(&["genotype", "chromosome", "rsid", "position"]).unwrap();

        let parsed = parser.parse(file.path()).unwrap();
        assert_eq!(parsed.records[0].rsid, "rs777");
        assert_eq!(parsed.records[0].position, 1234);
        assert_eq!(parsed.records[0].genotype, "GT");
    }

    #[test]
    fn test_invalid_column_layout() {
        assert!(Genome23Parser::with_columns(&["rsid", "chromosome", "position"]).is_err());
        assert!(Genome23Parser::with_columns(&["rsid", "rsid", "position", "genotype"]).is_err());
        assert!(Genome23Parser::with_columns(&["rsid", "chr", "position", "genotype"]).is_err());
    }

    #[test]
    fn test_empty_file() {
        let contents = "\
# rsid\tchromosome\tposition\tgenotype
# Just comments, no data
";
        let file = create_test_file(contents);
        match Genome23Parser::new().parse(file.path()) {
            Err(GenomeError::MalformedInput { .. }) => {}
            other => panic!("Expected MalformedInput error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let result = Genome23Parser::new().parse("/nonexistent/genome.txt");
        assert!(matches!(result, Err(GenomeError::MalformedInput { .. })));
    }

    #[test]
    fn test_gzip_input() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genome.txt.gz");
        let mut encoder = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
        encoder.write_all(b"# header\nrs1\t1\t100\tAG\n").unwrap();
        encoder.finish().unwrap();

        let parsed = Genome23Parser::new().parse(&path).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].genotype, "AG");
    }

    #[test]
    fn test_whitespace_handling() {
        let contents = "  rs548049170  \t  1  \t  69869  \t  TT\n";
        let file = create_test_file(contents);

        let parsed = Genome23Parser::new().parse(file.path()).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].rsid, "rs548049170");
        assert_eq!(parsed.records[0].position, 69869);
    }
}
