//! Fixed-schema fusion call, one per report row.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{FusionError, Result};

/// Column names of a FusionMap report, in file order.
pub const REPORT_COLUMNS: [&str; 16] = [
    "ID",
    "UniqueCuttingPositionCount",
    "SeedCount",
    "RescuedCount",
    "Strand",
    "Chromosome1",
    "Position1",
    "Chromosome2",
    "Position2",
    "KnownGene1",
    "KnownGeneStrand1",
    "KnownGene2",
    "KnownGeneStrand2",
    "FusionJunctionSequence",
    "FusionGene",
    "Filter",
];

/// A single reported fusion call.
///
/// Records are built once from a report row and never modified; the merger
/// only keeps or discards them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FusionRecord {
    /// Report-assigned identifier
    pub id: String,
    pub unique_cutting_position_count: u64,
    pub seed_count: u64,
    pub rescued_count: u64,
    /// Orientation tag, e.g. "+-"
    pub strand: String,
    pub chromosome1: String,
    /// Breakpoint location, kept as written in the report
    pub position1: String,
    pub chromosome2: String,
    pub position2: String,
    pub known_gene1: String,
    pub known_gene_strand1: String,
    pub known_gene2: String,
    pub known_gene_strand2: String,
    /// Nucleotides spanning the breakpoint; compared case-insensitively
    pub fusion_junction_sequence: String,
    /// Combined gene-pair label, e.g. "BCR->ABL1"
    pub fusion_gene: String,
    /// Upstream pass/fail annotation
    pub filter: String,
}

/// Counters must be plain decimal digits; signs and padding are rejected.
fn parse_count(value: &str, field: &'static str, line: usize) -> Result<u64> {
    let invalid = || FusionError::InvalidField {
        line,
        field,
        value: value.to_string(),
    };
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    value.parse().map_err(|_| invalid())
}

impl FusionRecord {
    /// Build a record from the split columns of one report row.
    ///
    /// `line` is the 1-based line number in the report, used for error messages.
    pub fn from_fields(fields: &[&str], line: usize) -> Result<Self> {
        if fields.len() != REPORT_COLUMNS.len() {
            return Err(FusionError::Parse {
                line,
                expected: REPORT_COLUMNS.len(),
                found: fields.len(),
            });
        }

        Ok(FusionRecord {
            id: fields[0].to_string(),
            unique_cutting_position_count: parse_count(fields[1], REPORT_COLUMNS[1], line)?,
            seed_count: parse_count(fields[2], REPORT_COLUMNS[2], line)?,
            rescued_count: parse_count(fields[3], REPORT_COLUMNS[3], line)?,
            strand: fields[4].to_string(),
            chromosome1: fields[5].to_string(),
            position1: fields[6].to_string(),
            chromosome2: fields[7].to_string(),
            position2: fields[8].to_string(),
            known_gene1: fields[9].to_string(),
            known_gene_strand1: fields[10].to_string(),
            known_gene2: fields[11].to_string(),
            known_gene_strand2: fields[12].to_string(),
            fusion_junction_sequence: fields[13].to_string(),
            fusion_gene: fields[14].to_string(),
            filter: fields[15].to_string(),
        })
    }

    /// Ordered (Chromosome1, Chromosome2) pair used to partition records.
    pub fn chromosome_pair(&self) -> (&str, &str) {
        (&self.chromosome1, &self.chromosome2)
    }

    /// Ordered (KnownGene1, KnownGene2) pair.
    pub fn gene_pair(&self) -> (&str, &str) {
        (&self.known_gene1, &self.known_gene2)
    }

    /// The record's columns in report order.
    pub fn to_fields(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.unique_cutting_position_count.to_string(),
            self.seed_count.to_string(),
            self.rescued_count.to_string(),
            self.strand.clone(),
            self.chromosome1.clone(),
            self.position1.clone(),
            self.chromosome2.clone(),
            self.position2.clone(),
            self.known_gene1.clone(),
            self.known_gene_strand1.clone(),
            self.known_gene2.clone(),
            self.known_gene_strand2.clone(),
            self.fusion_junction_sequence.clone(),
            self.fusion_gene.clone(),
            self.filter.clone(),
        ]
    }

    pub fn to_tsv_line(&self) -> String {
        self.to_fields().join("\t")
    }
}
