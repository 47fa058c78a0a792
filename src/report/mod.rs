//! FusionMap report loading.
//!
//! A report is a tab-separated file with one header line followed by one
//! fusion call per line. [`FusionReport::load`] parses it, collapses duplicate
//! calls and, when paths are given, opens the fusion-read alignments and the
//! reference FASTA for downstream use.

pub mod record;

use std::fs::File;
use std::io::{BufRead, BufReader};

use log::{info, warn};

pub use record::{FusionRecord, REPORT_COLUMNS};

use crate::config::MergeConfig;
use crate::error::{FusionError, Result};
use crate::input::AlignmentStore;
use crate::reference::ReferenceAccessor;
use crate::var::merge::{FusionMerger, MergeOutcome, MergeStats, MergedCall};

/// Parse a report file into fusion records, in file order.
///
/// The first line is a header and is skipped without validation.
pub fn read_report(path: &str) -> Result<Vec<FusionRecord>> {
    let file = File::open(path).map_err(|e| FusionError::ReportFormat {
        path: path.to_string(),
        source: e,
    })?;
    read_report_from_reader(BufReader::new(file), path)
}

/// Parse report rows from any buffered reader. `source` names the input in errors.
pub fn read_report_from_reader<R: BufRead>(reader: R, source: &str) -> Result<Vec<FusionRecord>> {
    let mut fusions = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| FusionError::ReportFormat {
            path: source.to_string(),
            source: e,
        })?;
        if i == 0 {
            continue; // header
        }
        let line = line.strip_suffix('\r').unwrap_or(&line);

        let fields: Vec<&str> = line.split('\t').collect();
        fusions.push(FusionRecord::from_fields(&fields, i + 1)?);
    }

    Ok(fusions)
}

/// A loaded, deduplicated fusion report with its optional companion stores.
pub struct FusionReport {
    path: String,
    outcome: MergeOutcome,
    min_similarity: f64,
    alignments: Option<AlignmentStore>,
    reference: Option<ReferenceAccessor>,
}

impl FusionReport {
    /// Load a report with the default merge settings.
    ///
    /// `fusion_reads` (BAM/CRAM) and `reference` (indexed FASTA) are optional;
    /// when omitted the corresponding accessor is simply absent.
    pub fn load(report: &str, fusion_reads: Option<&str>, reference: Option<&str>) -> Result<Self> {
        Self::load_with_config(report, fusion_reads, reference, &MergeConfig::default())
    }

    pub fn load_with_config(
        report: &str,
        fusion_reads: Option<&str>,
        reference: Option<&str>,
        config: &MergeConfig,
    ) -> Result<Self> {
        let records = read_report(report)?;
        info!("Parsed {} fusion calls from {}", records.len(), report);

        let reference = reference.map(ReferenceAccessor::open).transpose()?;
        let alignments = fusion_reads
            .map(|path| AlignmentStore::open(path, reference.as_ref().map(|r| r.path())))
            .transpose()?;

        if let (Some(store), Some(refs)) = (&alignments, &reference) {
            let missing = store
                .reference_names()
                .iter()
                .filter(|name| refs.chromosome_length(name).is_none())
                .count();
            if missing > 0 {
                warn!(
                    "{} of {} alignment reference sequences are absent from {}",
                    missing,
                    store.reference_names().len(),
                    refs.path()
                );
            }
        }

        let merger = FusionMerger::from_config(config);
        let outcome = merger.merge(records);

        Ok(FusionReport {
            path: report.to_string(),
            outcome,
            min_similarity: merger.min_similarity(),
            alignments,
            reference,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Deduplicated fusion calls, in report order.
    pub fn fusions(&self) -> &[FusionRecord] {
        &self.outcome.fusions
    }

    pub fn into_fusions(self) -> Vec<FusionRecord> {
        self.outcome.fusions
    }

    /// Calls removed as duplicates.
    pub fn merged(&self) -> &[MergedCall] {
        &self.outcome.merged
    }

    pub fn outcome(&self) -> &MergeOutcome {
        &self.outcome
    }

    pub fn stats(&self) -> MergeStats {
        self.outcome.stats
    }

    pub fn min_similarity(&self) -> f64 {
        self.min_similarity
    }

    pub fn alignments(&self) -> Option<&AlignmentStore> {
        self.alignments.as_ref()
    }

    pub fn reference(&self) -> Option<&ReferenceAccessor> {
        self.reference.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "ID\tUniqueCuttingPositionCount\tSeedCount\tRescuedCount\tStrand\tChromosome1\tPosition1\tChromosome2\tPosition2\tKnownGene1\tKnownGeneStrand1\tKnownGene2\tKnownGeneStrand2\tFusionJunctionSequence\tFusionGene\tFilter";

    fn row(id: &str, chroms: (&str, &str), genes: (&str, &str), junction: &str) -> String {
        format!(
            "{}\t3\t5\t0\t+-\t{}\t1000\t{}\t2000\t{}\t+\t{}\t-\t{}\t{}->{}\tPASS",
            id, chroms.0, chroms.1, genes.0, genes.1, junction, genes.0, genes.1
        )
    }

    #[test]
    fn test_parse_rows_in_order() {
        let data = format!(
            "{}\n{}\n{}\n",
            HEADER,
            row("F1", ("chr1", "chr2"), ("BRCA1", "TP53"), "ACGT"),
            row("F2", ("chr3", "chr4"), ("EGFR", "MET"), "TTGA"),
        );
        let fusions = read_report_from_reader(Cursor::new(data), "test").unwrap();
        assert_eq!(fusions.len(), 2);
        assert_eq!(fusions[0].id, "F1");
        assert_eq!(fusions[1].id, "F2");
        assert_eq!(fusions[1].known_gene_strand2, "-");
    }

    #[test]
    fn test_header_is_not_validated() {
        let data = format!("whatever\n{}\n", row("F1", ("chr1", "chr2"), ("A", "B"), "ACGT"));
        let fusions = read_report_from_reader(Cursor::new(data), "test").unwrap();
        assert_eq!(fusions.len(), 1);
    }

    #[test]
    fn test_header_only_and_empty_input() {
        assert!(read_report_from_reader(Cursor::new(format!("{}\n", HEADER)), "test").unwrap().is_empty());
        assert!(read_report_from_reader(Cursor::new(""), "test").unwrap().is_empty());
    }

    #[test]
    fn test_crlf_line_endings() {
        let data = format!(
            "{}\r\n{}\r\n{}\r\n",
            HEADER,
            row("F1", ("chr1", "chr2"), ("A", "B"), "ACGT"),
            row("F2", ("chr1", "chr2"), ("A", "B"), "GGCC"),
        );
        let fusions = read_report_from_reader(Cursor::new(data), "test").unwrap();
        assert_eq!(fusions.len(), 2);
        assert_eq!(fusions[1].filter, "PASS");
    }

    #[test]
    fn test_blank_line_is_parse_error() {
        let data = format!(
            "{}\n{}\n\n{}\n",
            HEADER,
            row("F1", ("chr1", "chr2"), ("A", "B"), "ACGT"),
            row("F2", ("chr1", "chr2"), ("A", "B"), "GGCC"),
        );
        let err = read_report_from_reader(Cursor::new(data), "test").unwrap_err();
        assert!(matches!(err, FusionError::Parse { line: 3, expected: 16, found: 1 }));
    }

    #[test]
    fn test_tab_only_line_is_not_skipped() {
        let empty_row = "\t".repeat(15);
        let data = format!("{}\r\n{}\r\n", HEADER, empty_row);
        let err = read_report_from_reader(Cursor::new(data), "test").unwrap_err();
        assert!(matches!(
            err,
            FusionError::InvalidField { line: 2, field: "UniqueCuttingPositionCount", .. }
        ));
    }

    #[test]
    fn test_malformed_row_reports_line_number() {
        let good = row("F1", ("chr1", "chr2"), ("A", "B"), "ACGT");
        let short: Vec<&str> = good.split('\t').take(14).collect();
        let data = format!("{}\n{}\n{}\n", HEADER, good, short.join("\t"));
        let err = read_report_from_reader(Cursor::new(data), "test").unwrap_err();
        assert!(matches!(err, FusionError::Parse { line: 3, expected: 16, found: 14 }));
    }

    #[test]
    fn test_missing_file() {
        let err = read_report("/nonexistent/report.txt").unwrap_err();
        assert!(matches!(err, FusionError::ReportFormat { .. }));
        assert!(err.to_string().contains("/nonexistent/report.txt"));
    }
}
